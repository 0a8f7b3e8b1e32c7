use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::debug;

use super::store::KeyValueStore;

/// File-backed cache: each key is stored as `<cache_dir>/<key>.json`.
pub struct CacheManager {
    cache_dir: PathBuf,
}

impl CacheManager {
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir)
            .with_context(|| format!("Failed to create cache directory {}", cache_dir.display()))?;
        debug!(dir = %cache_dir.display(), "Cache directory ready");
        Ok(Self { cache_dir })
    }

    /// Keys become file names, so anything outside `[A-Za-z0-9_-]` is replaced.
    fn cache_path(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.cache_dir.join(format!("{}.json", name))
    }
}

impl KeyValueStore for CacheManager {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.cache_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read cache file: {}", key))?;
        Ok(Some(contents))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.cache_path(key);
        // Write-then-rename so a crash mid-write never leaves a truncated cache
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)
            .with_context(|| format!("Failed to write cache file: {}", key))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to replace cache file: {}", key))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.cache_path(key);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}
