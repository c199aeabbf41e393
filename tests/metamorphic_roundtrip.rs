use anyhow::Result;
use oorandom::Rand64;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use EmberCache::{NullStore, SnapshotCache, Value};

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("ember-{}-{}-{}", prefix, pid, t))
}

// Random values over every supported kind, including marker-lookalike
// strings. Floats come from rand_float so equality comparison is safe.
fn gen_value(rng: &mut Rand64, depth: u32) -> Value {
    let scalar_only = depth >= 4;
    match rng.rand_range(0..if scalar_only { 5 } else { 7 }) {
        0 => Value::Null,
        1 => Value::Bool(rng.rand_range(0..2) == 0),
        2 => Value::Int(rng.rand_u64() as i64),
        3 => Value::Float(rng.rand_float() * 1e9 - 5e8),
        4 => Value::Str(gen_string(rng)),
        5 => {
            let n = rng.rand_range(0..4) as usize;
            Value::Array((0..n).map(|_| Arc::new(gen_value(rng, depth + 1))).collect())
        }
        _ => {
            let n = rng.rand_range(0..4) as usize;
            Value::Map(
                (0..n)
                    .map(|i| (format!("f{}", i), Arc::new(gen_value(rng, depth + 1))))
                    .collect(),
            )
        }
    }
}

fn gen_string(rng: &mut Rand64) -> String {
    // Occasionally emit the exact shapes the encoder must disambiguate.
    match rng.rand_range(0..8) {
        0 => "N".to_string(),
        1 => "T".to_string(),
        2 => "I12345678".to_string(),
        _ => {
            const POOL: &[u8] = b"NTFIDabc:.s0123456789";
            let len = rng.rand_range(0..12) as usize;
            (0..len)
                .map(|_| POOL[rng.rand_range(0..POOL.len() as u64) as usize] as char)
                .collect()
        }
    }
}

#[test]
fn random_mappings_roundtrip() -> Result<()> {
    for seed in [7u128, 42, 20260807] {
        let root = unique_root(&format!("metamorphic-{}", seed));
        fs::create_dir_all(&root)?;
        let path = root.join("cache.snap");

        let mut rng = Rand64::new(seed);
        let entries: Vec<_> = (0..64)
            .map(|i| (format!("key.{}", i), gen_value(&mut rng, 0)))
            .collect();

        let cache = SnapshotCache::open(&path, Box::new(NullStore));
        cache.warm_up(&entries)?;

        // A fresh instance must reproduce the whole mapping exactly.
        let reopened = SnapshotCache::open(&path, Box::new(NullStore));
        assert_eq!(reopened.key_count(), entries.len());
        for (key, value) in &entries {
            let got = reopened.get(key);
            assert_eq!(got.as_ref(), Some(value), "seed {} key {:?}", seed, key);
        }

        // Dedup invariant: never more unique values than keys.
        assert!(reopened.value_count() <= reopened.key_count());
    }
    Ok(())
}

#[test]
fn repeated_rewarm_stays_consistent() -> Result<()> {
    let root = unique_root("metamorphic-rewarm");
    fs::create_dir_all(&root)?;
    let path = root.join("cache.snap");

    let mut rng = Rand64::new(99);
    let cache = SnapshotCache::open(&path, Box::new(NullStore));

    for round in 0..5 {
        let entries: Vec<_> = (0..16)
            .map(|i| (format!("r{}.k{}", round, i), gen_value(&mut rng, 0)))
            .collect();
        cache.warm_up(&entries)?;

        assert_eq!(cache.key_count(), entries.len(), "round {}", round);
        for (key, value) in &entries {
            assert_eq!(cache.get(key).as_ref(), Some(value), "round {}", round);
        }
        // Keys from earlier rounds are gone: each warm-up is a full rebuild.
        if round > 0 {
            assert!(!cache.contains(&format!("r{}.k0", round - 1)));
        }
    }
    Ok(())
}
