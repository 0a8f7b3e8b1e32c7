//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the pantry API base URL, last signed-in user, catalog
//! override, and display preferences.
//!
//! Configuration is stored at `~/.config/backbar/config.json`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "backbar";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Default pantry API root
pub const DEFAULT_API_BASE_URL: &str = "https://api.backbar.app";

/// Debounce before mirroring the cabinet to the local cache.
const CACHE_DEBOUNCE_MS: u64 = 250;

/// Debounce before reconciling the cabinet with the remote pantry.
const REMOTE_DEBOUNCE_MS: u64 = 1000;

/// How long a destructive action can be undone.
const UNDO_WINDOW_SECS: u64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub last_user: Option<String>,
    pub sort_ascending: bool,
    pub catalog_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            last_user: None,
            sort_ascending: true,
            catalog_path: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Root cache directory; holds the persisted session and log files.
    pub fn cache_root() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Per-user cache directory; anonymous use shares a `local` directory.
    pub fn user_cache_dir(&self, user: Option<&str>) -> Result<PathBuf> {
        let root = Self::cache_root()?;
        Ok(root.join(user_dir_name(user)))
    }
}

fn user_dir_name(user: Option<&str>) -> String {
    let name: String = match user.map(str::trim).filter(|u| !u.is_empty()) {
        Some(u) => u
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect(),
        None => return "local".to_string(),
    };
    // "." and ".." must not escape the cache root
    if name.chars().all(|c| c == '.') {
        name.replace('.', "_")
    } else {
        name
    }
}

/// Timing knobs for the cabinet store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    pub cache_debounce: Duration,
    pub remote_debounce: Duration,
    pub undo_window: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            cache_debounce: Duration::from_millis(CACHE_DEBOUNCE_MS),
            remote_debounce: Duration::from_millis(REMOTE_DEBOUNCE_MS),
            undo_window: Duration::from_secs(UNDO_WINDOW_SECS),
        }
    }
}
