use anyhow::Result;
use std::path::PathBuf;

use EmberCache::load_snapshot;

pub fn exec(path: PathBuf, json: bool) -> Result<()> {
    let exists = path.exists();
    let file_bytes = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);

    let state = load_snapshot(&path);
    let lazy_values = state.values.iter().filter(|v| v.is_lazy()).count();

    if json {
        let out = serde_json::json!({
            "path": path.display().to_string(),
            "exists": exists,
            "file_bytes": file_bytes,
            "keys": state.key_count(),
            "unique_values": state.value_count(),
            "lazy_values": lazy_values,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("snapshot:      {}", path.display());
        println!("exists:        {}", exists);
        println!("file size:     {} B", file_bytes);
        println!("keys:          {}", state.key_count());
        println!("unique values: {}", state.value_count());
        println!("lazy values:   {}", lazy_values);
    }
    Ok(())
}
