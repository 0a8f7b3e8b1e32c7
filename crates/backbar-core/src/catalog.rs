//! Catalog of known ingredient names for the "add ingredient" search.
//!
//! The catalog is read from a user-supplied JSON file when configured, and
//! falls back to the list bundled with the crate.

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::utils::cmp_ignore_case;

/// Bundled catalog, `[{"name": "..."}]`
const BUILTIN_CATALOG: &str = include_str!("../data/catalog.json");

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// Load the catalog from `path`, or the bundled list if the path is
    /// missing, unreadable, or not a valid catalog.
    pub fn load(path: Option<&Path>) -> Self {
        if let Some(path) = path {
            match std::fs::read_to_string(path) {
                Ok(data) => match serde_json::from_str::<Vec<CatalogEntry>>(&data) {
                    Ok(entries) => {
                        debug!(path = %path.display(), count = entries.len(), "Loaded catalog from disk");
                        return Self::from_entries(entries);
                    }
                    Err(e) => debug!(path = %path.display(), error = %e, "Invalid catalog file"),
                },
                Err(e) => debug!(path = %path.display(), error = %e, "Catalog file not readable"),
            }
        }
        Self::builtin()
    }

    pub fn builtin() -> Self {
        let entries = serde_json::from_str(BUILTIN_CATALOG).unwrap_or_else(|e| {
            debug!(error = %e, "Bundled catalog failed to parse");
            Vec::new()
        });
        Self::from_entries(entries)
    }

    pub fn from_entries(mut entries: Vec<CatalogEntry>) -> Self {
        entries.retain(|e| !e.name.trim().is_empty());
        entries.sort_by(|a, b| cmp_ignore_case(&a.name, &b.name));
        entries.dedup_by(|a, b| a.name.eq_ignore_ascii_case(&b.name));
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Case-insensitive search: names starting with the query come first,
    /// then names containing it elsewhere. An empty query lists the catalog.
    pub fn search(&self, query: &str, limit: usize) -> Vec<&str> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return self.entries.iter().take(limit).map(|e| e.name.as_str()).collect();
        }

        let (mut prefix, mut inner) = (Vec::new(), Vec::new());
        for entry in &self.entries {
            let lower = entry.name.to_lowercase();
            if lower.starts_with(&query) {
                prefix.push(entry.name.as_str());
            } else if lower.contains(&query) {
                inner.push(entry.name.as_str());
            }
        }
        prefix.extend(inner);
        prefix.truncate(limit);
        prefix
    }
}
