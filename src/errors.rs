//! Error taxonomy for warm-up.
//!
//! All four variants abort `warm_up` as a whole; the tmp+rename discipline in
//! the writer guarantees the target file is never left half-written. The
//! loader never raises: absence and corruption degrade to an empty state.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    /// Key failed syntactic validation (empty, reserved characters, too long).
    #[error("invalid cache key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    /// Value under `key` cannot be encoded into a snapshot entry.
    #[error("cache key {key:?} has a non-serializable value: {reason}")]
    NonSerializableValue { key: String, reason: String },

    /// Target path failed the preflight check (wrong kind, missing or
    /// unwritable parent directory).
    #[error("cache target unavailable at {}: {reason}", path.display())]
    TargetUnavailable { path: PathBuf, reason: String },

    /// Writing or atomically renaming the snapshot failed.
    #[error("failed to persist snapshot at {}: {source}", path.display())]
    PersistFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl CacheError {
    pub fn invalid_key(key: &str, reason: impl Into<String>) -> Self {
        CacheError::InvalidKey {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub fn non_serializable(key: &str, reason: impl Into<String>) -> Self {
        CacheError::NonSerializableValue {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub fn target_unavailable(path: &std::path::Path, reason: impl Into<String>) -> Self {
        CacheError::TargetUnavailable {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    pub fn persist_failed(path: &std::path::Path, source: io::Error) -> Self {
        CacheError::PersistFailed {
            path: path.to_path_buf(),
            source,
        }
    }
}
