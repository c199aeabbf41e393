use anyhow::Result;
use std::path::PathBuf;

use EmberCache::value::to_json;
use EmberCache::{NullStore, SnapshotCache};

pub fn exec(path: PathBuf, key: String, json: bool) -> Result<()> {
    let cache = SnapshotCache::open(&path, Box::new(NullStore));
    match cache.get(&key) {
        Some(v) => {
            let rendered = to_json(&v);
            if json {
                println!("{}", serde_json::to_string(&rendered)?);
            } else {
                println!("FOUND '{}': {}", key, rendered);
            }
        }
        None => println!("NOT FOUND '{}'", key),
    }
    Ok(())
}
