// src/snapshot — persisted snapshot format (v1)
//
// File layout (LE):
// MAGIC8 = "EMBRSNAP"
// u32 version      = 1
// u32 key_count
// u32 value_count
// u32 crc32        (crc32fast over the two table regions below)
// value table: value_count x [flags u8][len u32][payload]   (id = position, dense)
// key table:   key_count   x [klen u16][key utf8][value_id u32]  (input order)
//
// Policy:
// - Atomic write: uniquely named tmp in the target directory + rename, then
//   best-effort fsync of the parent directory.
// - The value table is deduplicated by content hash at build time; equal
//   canonical entries ([flags][payload]) never appear twice.
// - The loader validates magic/version/crc/shape and degrades to an empty
//   state on any mismatch instead of failing.

use std::path::Path;

pub mod loader;
pub mod writer;

pub use loader::load_snapshot;
pub use writer::build_snapshot;

pub const SNAP_MAGIC: &[u8; 8] = b"EMBRSNAP";
pub const SNAP_VERSION: u32 = 1;

/// Fixed header: magic + version + key_count + value_count + crc32.
pub const SNAP_HEADER_LEN: usize = 8 + 4 + 4 + 4 + 4;

#[cfg(unix)]
pub(crate) fn fsync_dir(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            let dir = std::fs::File::open(parent)?;
            dir.sync_all()?;
        }
    }
    Ok(())
}

#[cfg(not(unix))]
pub(crate) fn fsync_dir(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
