use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;

use EmberCache::value::from_json;
use EmberCache::{NullStore, SnapshotCache};

pub fn exec(path: PathBuf, input: PathBuf) -> Result<()> {
    let raw = std::fs::read_to_string(&input)
        .with_context(|| format!("read input {}", input.display()))?;
    let parsed: serde_json::Value =
        serde_json::from_str(&raw).with_context(|| format!("parse JSON {}", input.display()))?;
    let obj = match parsed {
        serde_json::Value::Object(map) => map,
        _ => return Err(anyhow!("input must be one top-level JSON object (key -> value)")),
    };

    let entries: Vec<_> = obj
        .iter()
        .map(|(k, v)| (k.clone(), from_json(v)))
        .collect();

    let cache = SnapshotCache::open(&path, Box::new(NullStore));
    cache.warm_up(&entries)?;

    println!(
        "WARMED {}: {} keys, {} unique values",
        path.display(),
        cache.key_count(),
        cache.value_count()
    );
    Ok(())
}
