//! cache — warm-up / read / clear orchestration over one snapshot path.
//!
//! SnapshotCache ties the pieces together: the writer builds and persists,
//! the loader repopulates the in-memory store, reads hit the store first and
//! delegate misses to the external fallback store. Collaborators are traits
//! with provided impls: FallbackStore (MemoryStore, NullStore) and
//! KeyValidator (DefaultKeyValidator).

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::warn;

use crate::codec::{decode_value, EncodedValue};
use crate::config::CacheConfig;
use crate::errors::CacheError;
use crate::metrics::{
    record_clear, record_lazy_decode, record_lazy_decode_failure, record_snapshot_hit,
    record_snapshot_miss,
};
use crate::snapshot::{build_snapshot, load_snapshot};
use crate::store::SnapshotStore;
use crate::value::Value;

// ----------------- collaborator interfaces -----------------

/// The general-purpose store this cache accelerates. Lookups missing from the
/// snapshot land here; `clear` is delegated during the cache's own clear.
pub trait FallbackStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn clear(&self) -> bool;
}

/// Syntactic key check applied to every warmed entry.
pub trait KeyValidator: Send + Sync {
    fn validate(&self, key: &str) -> Result<(), CacheError>;
}

/// Characters a key must not contain.
pub const RESERVED_KEY_CHARS: &str = "{}()/\\@:";

/// Default key rules: non-empty and free of reserved characters.
pub struct DefaultKeyValidator;

impl KeyValidator for DefaultKeyValidator {
    fn validate(&self, key: &str) -> Result<(), CacheError> {
        if key.is_empty() {
            return Err(CacheError::invalid_key(key, "empty keys are not allowed"));
        }
        if key.chars().any(|c| RESERVED_KEY_CHARS.contains(c)) {
            return Err(CacheError::invalid_key(
                key,
                format!("contains a reserved character ({})", RESERVED_KEY_CHARS),
            ));
        }
        Ok(())
    }
}

/// Mutexed in-memory fallback, enough for tests and the CLI.
#[derive(Default)]
pub struct MemoryStore {
    map: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn put(&self, key: &str, value: Value) {
        if let Ok(mut g) = self.map.lock() {
            g.insert(key.to_string(), value);
        }
    }

    pub fn len(&self) -> usize {
        self.map.lock().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FallbackStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.map.lock().ok()?.get(key).cloned()
    }

    fn clear(&self) -> bool {
        match self.map.lock() {
            Ok(mut g) => {
                g.clear();
                true
            }
            Err(_) => false,
        }
    }
}

/// Always-miss fallback for snapshot-only use.
pub struct NullStore;

impl FallbackStore for NullStore {
    fn get(&self, _key: &str) -> Option<Value> {
        None
    }

    fn clear(&self) -> bool {
        true
    }
}

// ----------------- the cache itself -----------------

pub struct SnapshotCache {
    path: PathBuf,
    cfg: CacheConfig,
    store: SnapshotStore,
    fallback: Box<dyn FallbackStore>,
    validator: Box<dyn KeyValidator>,
}

impl SnapshotCache {
    /// Open with env-derived config and the default key rules; loads any
    /// existing snapshot at `path` immediately.
    pub fn open(path: impl Into<PathBuf>, fallback: Box<dyn FallbackStore>) -> Self {
        Self::with_config(path, fallback, CacheConfig::from_env())
    }

    pub fn with_config(
        path: impl Into<PathBuf>,
        fallback: Box<dyn FallbackStore>,
        cfg: CacheConfig,
    ) -> Self {
        Self::new(path, fallback, Box::new(DefaultKeyValidator), cfg)
    }

    pub fn new(
        path: impl Into<PathBuf>,
        fallback: Box<dyn FallbackStore>,
        validator: Box<dyn KeyValidator>,
        cfg: CacheConfig,
    ) -> Self {
        let cache = SnapshotCache {
            path: path.into(),
            cfg,
            store: SnapshotStore::new(),
            fallback,
            validator,
        };
        cache.reload();
        cache
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &CacheConfig {
        &self.cfg
    }

    /// Encode and persist the complete mapping, then adopt it. Every warm-up
    /// rebuilds the full set; on any error nothing changes on disk or in
    /// memory.
    pub fn warm_up(&self, entries: &[(String, Value)]) -> Result<(), CacheError> {
        build_snapshot(&self.path, entries, self.validator.as_ref(), &self.cfg)?;
        self.reload();
        Ok(())
    }

    /// Re-read the persisted snapshot into a fresh generation.
    pub fn reload(&self) {
        self.store.replace(load_snapshot(&self.path));
    }

    /// Snapshot read with fallback delegation. Lazy values decode on each
    /// access; a stored payload that fails to decode is absorbed like a
    /// corrupt snapshot would be: warn and delegate.
    pub fn get(&self, key: &str) -> Option<Value> {
        match self.store.lookup(key) {
            Some(enc) => {
                record_snapshot_hit();
                if enc.is_lazy() {
                    record_lazy_decode();
                }
                match decode_value(&enc, self.cfg.max_depth) {
                    Ok(v) => Some(v),
                    Err(e) => {
                        record_lazy_decode_failure();
                        warn!(
                            "stored value for {:?} failed to decode ({}), delegating to the fallback store",
                            key, e
                        );
                        self.fallback.get(key)
                    }
                }
            }
            None => {
                record_snapshot_miss();
                self.fallback.get(key)
            }
        }
    }

    /// The raw stored form, without decoding. Snapshot-only (no fallback).
    pub fn lookup_encoded(&self, key: &str) -> Option<EncodedValue> {
        self.store.lookup(key)
    }

    /// Snapshot-only membership.
    pub fn contains(&self, key: &str) -> bool {
        self.store.current().keys.contains_key(key)
    }

    pub fn key_count(&self) -> usize {
        self.store.current().key_count()
    }

    pub fn value_count(&self) -> usize {
        self.store.current().value_count()
    }

    /// Reset memory first, then remove the file, then delegate. Removal
    /// succeeds when the file is absent afterwards, whether it was deleted
    /// now or never existed. True only if removal AND the delegated clear
    /// both succeeded.
    pub fn clear(&self) -> bool {
        self.store.reset();
        let removed = match fs::remove_file(&self.path) {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => true,
            Err(e) => {
                warn!("could not remove snapshot {}: {}", self.path.display(), e);
                !self.path.exists()
            }
        };
        let delegated = self.fallback.clear();
        record_clear();
        removed && delegated
    }
}
