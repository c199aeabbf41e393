//! Lightweight global metrics for EmberCache.
//!
//! Thread-safe atomic counters for the subsystems:
//! - snapshot reads (hits/misses, lazy decodes)
//! - warm-up (runs, keys, dedup reuse)
//! - loads (total, degraded-to-empty)
//! - clears

use std::sync::atomic::{AtomicU64, Ordering};

// ----- Reads -----
static SNAPSHOT_HITS: AtomicU64 = AtomicU64::new(0);
static SNAPSHOT_MISSES: AtomicU64 = AtomicU64::new(0);
static LAZY_DECODES: AtomicU64 = AtomicU64::new(0);
static LAZY_DECODE_FAILURES: AtomicU64 = AtomicU64::new(0);

// ----- Warm-up -----
static WARMUPS_TOTAL: AtomicU64 = AtomicU64::new(0);
static WARMUP_KEYS_TOTAL: AtomicU64 = AtomicU64::new(0);
static WARMUP_VALUES_DEDUPED: AtomicU64 = AtomicU64::new(0);

// ----- Loads -----
static LOADS_TOTAL: AtomicU64 = AtomicU64::new(0);
static LOADS_DEGRADED: AtomicU64 = AtomicU64::new(0);

// ----- Clears -----
static CLEARS_TOTAL: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub snapshot_hits: u64,
    pub snapshot_misses: u64,
    pub lazy_decodes: u64,
    pub lazy_decode_failures: u64,

    pub warmups_total: u64,
    pub warmup_keys_total: u64,
    pub warmup_values_deduped: u64,

    pub loads_total: u64,
    pub loads_degraded: u64,

    pub clears_total: u64,
}

impl MetricsSnapshot {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.snapshot_hits + self.snapshot_misses;
        if total == 0 {
            0.0
        } else {
            self.snapshot_hits as f64 / total as f64
        }
    }
}

// ----- Recorders (reads) -----
pub fn record_snapshot_hit() {
    SNAPSHOT_HITS.fetch_add(1, Ordering::Relaxed);
}
pub fn record_snapshot_miss() {
    SNAPSHOT_MISSES.fetch_add(1, Ordering::Relaxed);
}
pub fn record_lazy_decode() {
    LAZY_DECODES.fetch_add(1, Ordering::Relaxed);
}
pub fn record_lazy_decode_failure() {
    LAZY_DECODE_FAILURES.fetch_add(1, Ordering::Relaxed);
}

// ----- Recorders (warm-up) -----
pub fn record_warmup(keys: u64) {
    WARMUPS_TOTAL.fetch_add(1, Ordering::Relaxed);
    WARMUP_KEYS_TOTAL.fetch_add(keys, Ordering::Relaxed);
}
pub fn record_value_deduped() {
    WARMUP_VALUES_DEDUPED.fetch_add(1, Ordering::Relaxed);
}

// ----- Recorders (loads / clears) -----
pub fn record_load() {
    LOADS_TOTAL.fetch_add(1, Ordering::Relaxed);
}
pub fn record_load_degraded() {
    LOADS_DEGRADED.fetch_add(1, Ordering::Relaxed);
}
pub fn record_clear() {
    CLEARS_TOTAL.fetch_add(1, Ordering::Relaxed);
}

/// Read all counters at once.
pub fn metrics_snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        snapshot_hits: SNAPSHOT_HITS.load(Ordering::Relaxed),
        snapshot_misses: SNAPSHOT_MISSES.load(Ordering::Relaxed),
        lazy_decodes: LAZY_DECODES.load(Ordering::Relaxed),
        lazy_decode_failures: LAZY_DECODE_FAILURES.load(Ordering::Relaxed),
        warmups_total: WARMUPS_TOTAL.load(Ordering::Relaxed),
        warmup_keys_total: WARMUP_KEYS_TOTAL.load(Ordering::Relaxed),
        warmup_values_deduped: WARMUP_VALUES_DEDUPED.load(Ordering::Relaxed),
        loads_total: LOADS_TOTAL.load(Ordering::Relaxed),
        loads_degraded: LOADS_DEGRADED.load(Ordering::Relaxed),
        clears_total: CLEARS_TOTAL.load(Ordering::Relaxed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Counters are process-global, so assert deltas, not absolute values.
    #[test]
    fn counters_accumulate() {
        let before = metrics_snapshot();
        record_snapshot_hit();
        record_snapshot_hit();
        record_snapshot_miss();
        record_warmup(10);
        record_value_deduped();
        let after = metrics_snapshot();
        assert!(after.snapshot_hits >= before.snapshot_hits + 2);
        assert!(after.snapshot_misses >= before.snapshot_misses + 1);
        assert!(after.warmups_total >= before.warmups_total + 1);
        assert!(after.warmup_keys_total >= before.warmup_keys_total + 10);
        assert!(after.warmup_values_deduped >= before.warmup_values_deduped + 1);
    }

    #[test]
    fn hit_ratio_handles_zero() {
        let m = MetricsSnapshot::default();
        assert_eq!(m.hit_ratio(), 0.0);
        let m = MetricsSnapshot {
            snapshot_hits: 3,
            snapshot_misses: 1,
            ..Default::default()
        };
        assert!((m.hit_ratio() - 0.75).abs() < 1e-9);
    }
}
