//! snapshot/writer — build and atomically persist one snapshot.
//!
//! Flow: preflight the target path, validate + encode every entry in input
//! order, dedup encoded values by content hash, serialize the two tables,
//! persist via unique tmp + rename. Any error aborts the whole build with the
//! previous snapshot (if any) untouched on disk.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use byteorder::{ByteOrder, LittleEndian};
use log::debug;
use sha2::{Digest, Sha256};

use super::{fsync_dir, SNAP_HEADER_LEN, SNAP_MAGIC, SNAP_VERSION};
use crate::cache::KeyValidator;
use crate::codec::{encode_value, EncodedValue};
use crate::config::CacheConfig;
use crate::errors::CacheError;
use crate::metrics::{record_value_deduped, record_warmup};
use crate::value::Value;

/// Encode `entries` (in input order) into a snapshot at `target`.
pub fn build_snapshot(
    target: &Path,
    entries: &[(String, Value)],
    validator: &dyn KeyValidator,
    cfg: &CacheConfig,
) -> Result<(), CacheError> {
    preflight(target, cfg)?;

    let mut value_table: Vec<EncodedValue> = Vec::new();
    let mut dedup: HashMap<[u8; 32], u32> = HashMap::new();
    let mut key_table: Vec<(String, u32)> = Vec::new();
    let mut key_pos: HashMap<String, usize> = HashMap::new();

    for (key, value) in entries {
        validator.validate(key)?;
        if key.len() > u16::MAX as usize {
            return Err(CacheError::invalid_key(key, "key too long (> u16::MAX)"));
        }

        let enc = encode_value(key, value, cfg.max_depth)?;
        if enc.payload().len() > u32::MAX as usize {
            return Err(CacheError::non_serializable(
                key,
                "encoded payload exceeds the u32 length limit",
            ));
        }

        let digest = content_digest(&enc);
        let id = match dedup.get(&digest) {
            Some(&id) => {
                record_value_deduped();
                id
            }
            None => {
                let id = value_table.len() as u32;
                value_table.push(enc);
                dedup.insert(digest, id);
                id
            }
        };

        // Duplicate input key: last value wins, the key keeps its first
        // position (map-assignment semantics).
        match key_pos.get(key.as_str()) {
            Some(&pos) => key_table[pos].1 = id,
            None => {
                key_pos.insert(key.clone(), key_table.len());
                key_table.push((key.clone(), id));
            }
        }
    }

    let bytes = serialize(&key_table, &value_table);
    persist_atomic(target, &bytes, cfg.file_mode)?;
    record_warmup(key_table.len() as u64);
    debug!(
        "snapshot built at {}: {} keys, {} unique values, {} B",
        target.display(),
        key_table.len(),
        value_table.len(),
        bytes.len()
    );
    Ok(())
}

/// SHA-256 over the canonical form [flags][payload]. Hashing the flags byte
/// keeps a literal and a lazy payload with equal bytes from sharing an id.
fn content_digest(enc: &EncodedValue) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([enc.flags()]);
    hasher.update(enc.payload());
    hasher.finalize().into()
}

/// Check the target before doing any encoding work.
fn preflight(target: &Path, cfg: &CacheConfig) -> Result<(), CacheError> {
    if target.exists() {
        let meta = fs::metadata(target)
            .map_err(|e| CacheError::target_unavailable(target, format!("stat failed: {}", e)))?;
        if !meta.is_file() {
            return Err(CacheError::target_unavailable(
                target,
                "cache path exists and is not a regular file",
            ));
        }
        // Writability probe; the file content is untouched.
        OpenOptions::new()
            .write(true)
            .open(target)
            .map_err(|e| CacheError::target_unavailable(target, format!("not writable: {}", e)))?;
    } else {
        let parent = parent_dir(target);
        if !parent.is_dir() {
            if !cfg.create_dirs {
                return Err(CacheError::target_unavailable(
                    target,
                    format!("parent directory {} does not exist", parent.display()),
                ));
            }
            fs::create_dir_all(&parent).map_err(|e| {
                CacheError::target_unavailable(
                    target,
                    format!("cannot create parent directory {}: {}", parent.display(), e),
                )
            })?;
        }
        let meta = fs::metadata(&parent)
            .map_err(|e| CacheError::target_unavailable(target, format!("stat failed: {}", e)))?;
        if meta.permissions().readonly() {
            return Err(CacheError::target_unavailable(
                target,
                format!("parent directory {} is not writable", parent.display()),
            ));
        }
    }
    Ok(())
}

fn parent_dir(target: &Path) -> PathBuf {
    match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn serialize(key_table: &[(String, u32)], value_table: &[EncodedValue]) -> Vec<u8> {
    let mut body = Vec::new();
    for enc in value_table {
        body.push(enc.flags());
        push_u32(&mut body, enc.payload().len() as u32);
        body.extend_from_slice(enc.payload());
    }
    for (key, id) in key_table {
        push_u16(&mut body, key.len() as u16);
        body.extend_from_slice(key.as_bytes());
        push_u32(&mut body, *id);
    }

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&body);
    let crc = hasher.finalize();

    let mut out = Vec::with_capacity(SNAP_HEADER_LEN + body.len());
    out.extend_from_slice(SNAP_MAGIC);
    push_u32(&mut out, SNAP_VERSION);
    push_u32(&mut out, key_table.len() as u32);
    push_u32(&mut out, value_table.len() as u32);
    push_u32(&mut out, crc);
    out.extend_from_slice(&body);
    out
}

fn push_u16(out: &mut Vec<u8>, v: u16) {
    let mut b = [0u8; 2];
    LittleEndian::write_u16(&mut b, v);
    out.extend_from_slice(&b);
}

fn push_u32(out: &mut Vec<u8>, v: u32) {
    let mut b = [0u8; 4];
    LittleEndian::write_u32(&mut b, v);
    out.extend_from_slice(&b);
}

/// Write everything to a uniquely named tmp next to the target, fix up the
/// file mode, fsync, rename over the target. Rename failure surfaces as
/// PersistFailed, never swallowed.
fn persist_atomic(target: &Path, bytes: &[u8], file_mode: u32) -> Result<(), CacheError> {
    let tmp = unique_tmp(target);
    if let Err(e) = write_tmp(&tmp, bytes, file_mode) {
        let _ = fs::remove_file(&tmp);
        return Err(CacheError::persist_failed(target, e));
    }
    if let Err(e) = fs::rename(&tmp, target) {
        let _ = fs::remove_file(&tmp);
        return Err(CacheError::persist_failed(target, e));
    }
    let _ = fsync_dir(target);
    Ok(())
}

fn write_tmp(tmp: &Path, bytes: &[u8], file_mode: u32) -> std::io::Result<()> {
    let mut f = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(tmp)?;
    f.write_all(bytes)?;
    set_file_mode(&f, file_mode); // best-effort
    f.sync_all()?;
    Ok(())
}

#[cfg(unix)]
fn set_file_mode(f: &File, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    let _ = f.set_permissions(fs::Permissions::from_mode(mode));
}

#[cfg(not(unix))]
fn set_file_mode(_f: &File, _mode: u32) {}

fn unique_tmp(target: &Path) -> PathBuf {
    let pid = std::process::id();
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let name = target
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snapshot".to_string());
    target.with_file_name(format!("{}.{}.{:x}.tmp", name, pid, nanos))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tmp_names_are_unique_and_colocated() {
        let target = Path::new("/some/dir/cache.snap");
        let a = unique_tmp(target);
        let b = unique_tmp(target);
        assert_ne!(a, b);
        assert_eq!(a.parent(), target.parent());
        assert!(a.to_string_lossy().ends_with(".tmp"));
    }

    #[test]
    fn serialized_header_shape() {
        let values = vec![EncodedValue::Literal(vec![b'N'])];
        let keys = vec![("k".to_string(), 0u32)];
        let bytes = serialize(&keys, &values);
        assert_eq!(&bytes[0..8], SNAP_MAGIC);
        assert_eq!(LittleEndian::read_u32(&bytes[8..12]), SNAP_VERSION);
        assert_eq!(LittleEndian::read_u32(&bytes[12..16]), 1); // key_count
        assert_eq!(LittleEndian::read_u32(&bytes[16..20]), 1); // value_count
        assert_eq!(bytes.len(), SNAP_HEADER_LEN + (1 + 4 + 1) + (2 + 1 + 4));
    }
}
