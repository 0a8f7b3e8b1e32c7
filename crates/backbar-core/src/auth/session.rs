use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionData {
    /// Account identifier (usually the email address)
    pub user: String,
    pub token: String,
    pub created_at: DateTime<Utc>,
}

impl SessionData {
    pub fn new(user: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            token: token.into(),
            created_at: Utc::now(),
        }
    }
}

/// Shared handle to the current user session.
/// Clone is cheap - all clones observe `set_user` / `clear_user`.
#[derive(Debug, Clone, Default)]
pub struct Session {
    data: Arc<RwLock<Option<SessionData>>>,
}

impl Session {
    /// A session with no signed-in user.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_user(data: SessionData) -> Self {
        let session = Self::default();
        session.set_user(data);
        session
    }

    pub fn set_user(&self, data: SessionData) {
        info!(user = %data.user, "Session started");
        if let Ok(mut guard) = self.data.write() {
            *guard = Some(data);
        }
    }

    pub fn clear_user(&self) {
        if let Ok(mut guard) = self.data.write() {
            if let Some(old) = guard.take() {
                info!(user = %old.user, "Session cleared");
            }
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.data.read().map(|d| d.is_some()).unwrap_or(false)
    }

    /// Get the bearer token if a user is signed in
    pub fn token(&self) -> Option<String> {
        self.data
            .read()
            .ok()
            .and_then(|d| d.as_ref().map(|s| s.token.clone()))
    }

    pub fn user(&self) -> Option<String> {
        self.data
            .read()
            .ok()
            .and_then(|d| d.as_ref().map(|s| s.user.clone()))
    }

    pub fn snapshot(&self) -> Option<SessionData> {
        self.data.read().ok().and_then(|d| d.clone())
    }

    /// Load a persisted session from `dir` into this handle.
    /// Returns whether a session was found.
    pub fn load(&self, dir: &Path) -> Result<bool> {
        let path = session_path(dir);
        if !path.exists() {
            debug!(?path, "No persisted session");
            return Ok(false);
        }
        let contents = std::fs::read_to_string(&path).context("Failed to read session file")?;
        let data: SessionData =
            serde_json::from_str(&contents).context("Failed to parse session file")?;
        self.set_user(data);
        Ok(true)
    }

    /// Save the current session to `dir`. Does nothing when signed out.
    pub fn save(&self, dir: &Path) -> Result<()> {
        if let Some(data) = self.snapshot() {
            std::fs::create_dir_all(dir)?;
            let contents = serde_json::to_string_pretty(&data)?;
            std::fs::write(session_path(dir), contents)?;
        }
        Ok(())
    }

    /// Clear the session and remove its file from `dir`.
    pub fn forget(&self, dir: &Path) -> Result<()> {
        self.clear_user();
        let path = session_path(dir);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

fn session_path(dir: &Path) -> PathBuf {
    dir.join(SESSION_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_clear_user() {
        let session = Session::anonymous();
        assert!(!session.is_authenticated());

        let shared = session.clone();
        session.set_user(SessionData::new("ada@example.com", "tok"));
        assert!(shared.is_authenticated());
        assert_eq!(shared.token().as_deref(), Some("tok"));
        assert_eq!(shared.user().as_deref(), Some("ada@example.com"));

        shared.clear_user();
        assert!(!session.is_authenticated());
        assert!(session.token().is_none());
    }

    #[test]
    fn test_save_load_forget() {
        let dir = tempfile::tempdir().expect("tempdir");
        let session = Session::with_user(SessionData::new("ada@example.com", "tok"));
        session.save(dir.path()).expect("save session");

        let restored = Session::anonymous();
        assert!(restored.load(dir.path()).expect("load session"));
        assert_eq!(restored.snapshot(), session.snapshot());

        restored.forget(dir.path()).expect("forget session");
        assert!(!restored.is_authenticated());
        assert!(!Session::anonymous().load(dir.path()).expect("load after forget"));
    }
}
