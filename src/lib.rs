#![allow(non_snake_case)]

// Base modules
pub mod config;
pub mod errors;
pub mod metrics;
pub mod value;

// Encoding (folder with mod.rs)
pub mod codec; // src/codec/{mod,literal,tree}.rs

// Persistence + in-memory mirror
pub mod snapshot; // src/snapshot/{mod,writer,loader}.rs
pub mod store;

// Orchestration (warm-up / get / clear) and collaborator traits
pub mod cache;

// Convenience re-exports
pub use cache::{
    DefaultKeyValidator, FallbackStore, KeyValidator, MemoryStore, NullStore, SnapshotCache,
};
pub use codec::EncodedValue;
pub use config::{CacheBuilder, CacheConfig};
pub use errors::CacheError;
pub use snapshot::{build_snapshot, load_snapshot};
pub use store::{SnapshotState, SnapshotStore};
pub use value::Value;
