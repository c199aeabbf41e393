use anyhow::{anyhow, Result};
use std::path::PathBuf;

use EmberCache::{NullStore, SnapshotCache};

pub fn exec(path: PathBuf) -> Result<()> {
    let cache = SnapshotCache::open(&path, Box::new(NullStore));
    if cache.clear() {
        println!("CLEARED {}", path.display());
        Ok(())
    } else {
        Err(anyhow!("clear failed for {}", path.display()))
    }
}
