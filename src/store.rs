//! store — the in-memory mirror of a loaded snapshot.
//!
//! SnapshotState is an explicit value object: built by the loader in one
//! piece, adopted by SnapshotStore with a wholesale Arc swap, never patched
//! field-by-field. Readers grab the current Arc and keep reading one fully
//! formed generation even while a reload swaps in the next.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::codec::EncodedValue;

/// One loaded snapshot generation: key -> value id, plus the dense value
/// table those ids index into.
#[derive(Debug, Default, Clone)]
pub struct SnapshotState {
    pub keys: HashMap<String, u32>,
    pub values: Vec<EncodedValue>,
}

impl SnapshotState {
    pub fn empty() -> Self {
        SnapshotState::default()
    }

    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn lookup(&self, key: &str) -> Option<&EncodedValue> {
        let id = *self.keys.get(key)?;
        self.values.get(id as usize)
    }
}

/// Holder of the current generation. Lock poisoning degrades: reads fall back
/// to the empty state and writes are skipped, so a lost swap only loses the
/// speed benefit, never correctness.
pub struct SnapshotStore {
    state: RwLock<Arc<SnapshotState>>,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotStore {
    pub fn new() -> Self {
        SnapshotStore {
            state: RwLock::new(Arc::new(SnapshotState::empty())),
        }
    }

    /// Current generation, shared. Cheap (one Arc clone).
    pub fn current(&self) -> Arc<SnapshotState> {
        match self.state.read() {
            Ok(g) => g.clone(),
            Err(_) => Arc::new(SnapshotState::empty()),
        }
    }

    /// Adopt a freshly loaded state, replacing the previous generation.
    pub fn replace(&self, state: SnapshotState) {
        if let Ok(mut g) = self.state.write() {
            *g = Arc::new(state);
        }
    }

    /// Back to empty, same swap discipline.
    pub fn reset(&self) {
        self.replace(SnapshotState::empty());
    }

    pub fn lookup(&self, key: &str) -> Option<EncodedValue> {
        self.current().lookup(key).cloned()
    }
}
