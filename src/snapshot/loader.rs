//! snapshot/loader — read a persisted snapshot back into memory.
//!
//! Never fails: a missing file is the normal cold start, and any parse or
//! shape problem (bad magic, version, CRC, truncated tables, unknown flags,
//! dangling value ids) degrades to the empty state with a warn. A corrupted
//! or stale snapshot must never crash the consuming application; it only
//! loses the speed benefit until the next warm-up.

use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use log::{debug, warn};

use super::{SNAP_HEADER_LEN, SNAP_MAGIC, SNAP_VERSION};
use crate::codec::EncodedValue;
use crate::metrics::{record_load, record_load_degraded};
use crate::store::SnapshotState;

pub fn load_snapshot(path: &Path) -> SnapshotState {
    if !path.exists() {
        debug!("no snapshot at {}, starting empty", path.display());
        return SnapshotState::empty();
    }
    match read_snapshot(path) {
        Ok(state) => {
            record_load();
            debug!(
                "snapshot loaded from {}: {} keys, {} unique values",
                path.display(),
                state.key_count(),
                state.value_count()
            );
            state
        }
        Err(e) => {
            record_load_degraded();
            warn!(
                "snapshot at {} unusable, starting empty: {:#}",
                path.display(),
                e
            );
            SnapshotState::empty()
        }
    }
}

fn read_snapshot(path: &Path) -> Result<SnapshotState> {
    let bytes = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
    if bytes.len() < SNAP_HEADER_LEN {
        return Err(anyhow!("file too short ({} B)", bytes.len()));
    }
    let (header, body) = bytes.split_at(SNAP_HEADER_LEN);

    if &header[0..8] != SNAP_MAGIC {
        return Err(anyhow!("bad snapshot magic"));
    }
    let version = LittleEndian::read_u32(&header[8..12]);
    if version != SNAP_VERSION {
        return Err(anyhow!(
            "unsupported snapshot version {} (expected {})",
            version,
            SNAP_VERSION
        ));
    }
    let key_count = LittleEndian::read_u32(&header[12..16]) as usize;
    let value_count = LittleEndian::read_u32(&header[16..20]) as usize;
    let stored_crc = LittleEndian::read_u32(&header[20..24]);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(body);
    let calc = hasher.finalize();
    if calc != stored_crc {
        return Err(anyhow!(
            "snapshot CRC mismatch (stored={}, calc={})",
            stored_crc,
            calc
        ));
    }

    let mut cur = Cursor::new(body);

    let mut values = Vec::with_capacity(value_count.min(body.len()));
    for i in 0..value_count {
        let flags = cur.read_u8().context("value flags")?;
        let len = cur.read_u32::<LittleEndian>().context("value length")? as usize;
        let remaining = body.len().saturating_sub(cur.position() as usize);
        if len > remaining {
            return Err(anyhow!("value {} overruns the table ({} B declared)", i, len));
        }
        let mut payload = vec![0u8; len];
        cur.read_exact(&mut payload).context("value payload")?;
        let enc = EncodedValue::from_parts(flags, payload)
            .ok_or_else(|| anyhow!("value {} has unknown flags 0x{:02x}", i, flags))?;
        values.push(enc);
    }

    let mut keys = HashMap::with_capacity(key_count.min(body.len()));
    for i in 0..key_count {
        let klen = cur.read_u16::<LittleEndian>().context("key length")? as usize;
        let mut kbuf = vec![0u8; klen];
        cur.read_exact(&mut kbuf).context("key bytes")?;
        let key = String::from_utf8(kbuf).map_err(|_| anyhow!("key {} is not utf-8", i))?;
        let id = cur.read_u32::<LittleEndian>().context("value id")?;
        if id as usize >= values.len() {
            return Err(anyhow!("key {:?} references missing value id {}", key, id));
        }
        keys.insert(key, id);
    }

    if cur.position() != body.len() as u64 {
        return Err(anyhow!(
            "trailing bytes after tables ({} of {})",
            cur.position(),
            body.len()
        ));
    }

    Ok(SnapshotState { keys, values })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn unique_root(prefix: &str) -> PathBuf {
        let pid = std::process::id();
        let t = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("ember-{}-{}-{}", prefix, pid, t))
    }

    #[test]
    fn missing_file_is_empty() {
        let state = load_snapshot(Path::new("/definitely/not/there.snap"));
        assert!(state.is_empty());
        assert_eq!(state.value_count(), 0);
    }

    #[test]
    fn garbage_file_is_empty() {
        let root = unique_root("loader-garbage");
        fs::create_dir_all(&root).unwrap();
        let path = root.join("cache.snap");
        fs::write(&path, b"this is not a snapshot at all").unwrap();
        assert!(load_snapshot(&path).is_empty());
    }

    #[test]
    fn wrong_magic_is_empty() {
        let root = unique_root("loader-magic");
        fs::create_dir_all(&root).unwrap();
        let path = root.join("cache.snap");
        let mut bytes = vec![0u8; SNAP_HEADER_LEN];
        bytes[0..8].copy_from_slice(b"WRONG!!!");
        fs::write(&path, &bytes).unwrap();
        assert!(load_snapshot(&path).is_empty());
    }
}
