//! Application state management for backbar.
//!
//! This module contains the core `App` struct that holds the UI state and
//! drives the `CabinetStore`. The store does all persistence and syncing in
//! the background; the app only reacts to the events it reports.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use backbar_core::api::ApiClient;
use backbar_core::auth::{Session, SessionData};
use backbar_core::cabinet::{
    CabinetEvent, CabinetStore, IngredientFilter, LoadSource, ReconcileReport, UndoNotice,
};
use backbar_core::cache::CacheManager;
use backbar_core::catalog::Catalog;
use backbar_core::config::{Config, StoreOptions};
use backbar_core::models::{Category, IngredientEntry, TargetList, FULL_QUANTITY};
use backbar_core::utils::age_display;

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the cabinet event channel.
const CHANNEL_BUFFER_SIZE: usize = 32;

/// Maximum length for ingredient name input.
const MAX_NAME_LENGTH: usize = 60;

/// Number of items to scroll on page up/down.
pub const PAGE_SCROLL_SIZE: usize = 10;

/// Quantity change per `+`/`-` press.
pub const QUANTITY_STEP: f64 = 0.1;

/// Catalog suggestions shown in the add dialog.
pub const SUGGESTION_LIMIT: usize = 8;

/// How long quitting waits for the final cache write and sync.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

const API_URL_ENV: &str = "BACKBAR_API_URL";
const TOKEN_ENV: &str = "BACKBAR_TOKEN";
const USER_ENV: &str = "BACKBAR_USER";

/// User name recorded when a token is supplied without one.
const DEFAULT_USER: &str = "me";

// ============================================================================
// UI State Types
// ============================================================================

/// Main navigation tabs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Cabinet,
    Shopping,
}

impl Tab {
    pub fn title(&self) -> &'static str {
        match self {
            Tab::Cabinet => "Cabinet",
            Tab::Shopping => "Shopping",
        }
    }

    /// The list this tab shows and adds to.
    pub fn list(&self) -> TargetList {
        match self {
            Tab::Cabinet => TargetList::Cabinet,
            Tab::Shopping => TargetList::Shopping,
        }
    }

    pub fn next(&self) -> Self {
        match self {
            Tab::Cabinet => Tab::Shopping,
            Tab::Shopping => Tab::Cabinet,
        }
    }
}

/// Current UI focus area (list panel or detail panel)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    List,
    Detail,
}

/// Overall application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    Searching,
    Renaming,
    Adding,
    ShowingHelp,
    ConfirmingQuit,
    Quitting,
}

// ============================================================================
// Main Application Struct
// ============================================================================

pub struct App {
    // Core services
    pub config: Config,
    cache_root: PathBuf,
    pub session: Session,
    pub store: CabinetStore,
    pub catalog: Catalog,

    // UI State
    pub state: AppState,
    pub current_tab: Tab,
    pub focus: Focus,
    pub search_query: String,
    pub category_filter: Option<Category>,
    pub sort_ascending: bool,
    pub selection: usize,

    // Rename/add dialog state
    pub input: String,
    pub suggestion_selection: usize,
    rename_target: Option<String>,

    // Store events
    events_rx: mpsc::Receiver<CabinetEvent>,
    pub sync_in_progress: bool,

    // Status message
    pub status_message: Option<String>,
}

impl App {
    /// Create the application from config, environment and the persisted session.
    pub async fn new() -> Result<Self> {
        let mut config = match Config::load() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Config::default()
            }
        };
        if let Ok(url) = std::env::var(API_URL_ENV) {
            debug!(%url, "API URL overridden from environment");
            config.api_base_url = url;
        }

        let cache_root = Config::cache_root().unwrap_or_else(|_| PathBuf::from("./cache"));
        debug!(?cache_root, "Cache root configured");

        let session = match std::env::var(TOKEN_ENV) {
            Ok(token) => {
                let user = std::env::var(USER_ENV)
                    .ok()
                    .or_else(|| config.last_user.clone())
                    .unwrap_or_else(|| DEFAULT_USER.to_string());
                let session = Session::with_user(SessionData::new(user, token));
                if let Err(e) = session.save(&cache_root) {
                    warn!(error = %e, "Failed to persist session");
                }
                session
            }
            Err(_) => {
                let session = Session::anonymous();
                match session.load(&cache_root) {
                    Ok(found) => debug!(found, "Session loaded"),
                    Err(e) => warn!(error = %e, "Failed to load session, continuing signed out"),
                }
                session
            }
        };

        let user = session.user();
        if config.last_user != user {
            config.last_user = user.clone();
            if let Err(e) = config.save() {
                warn!(error = %e, "Failed to save config");
            }
        }

        let cache_dir = config
            .user_cache_dir(user.as_deref())
            .unwrap_or_else(|_| cache_root.join("local"));
        let cache = CacheManager::new(cache_dir).context("Failed to create cache directory")?;
        let api = ApiClient::new(&config.api_base_url, session.clone())?;
        let catalog = Catalog::load(config.catalog_path.as_deref());

        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let store = CabinetStore::with_events(
            Arc::new(api),
            Arc::new(cache),
            session.clone(),
            StoreOptions::default(),
            tx,
        );

        info!(user = ?user, "App initialized");
        Ok(Self::from_parts(config, cache_root, session, store, catalog, rx))
    }

    fn from_parts(
        config: Config,
        cache_root: PathBuf,
        session: Session,
        store: CabinetStore,
        catalog: Catalog,
        events_rx: mpsc::Receiver<CabinetEvent>,
    ) -> Self {
        let sort_ascending = config.sort_ascending;
        Self {
            config,
            cache_root,
            session,
            store,
            catalog,
            state: AppState::Normal,
            current_tab: Tab::Cabinet,
            focus: Focus::List,
            search_query: String::new(),
            category_filter: None,
            sort_ascending,
            selection: 0,
            input: String::new(),
            suggestion_selection: 0,
            rename_target: None,
            events_rx,
            sync_in_progress: false,
            status_message: None,
        }
    }

    /// Initial load; the outcome arrives as a `Loaded` event.
    pub async fn load(&mut self) {
        self.store.load().await;
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn filter(&self) -> IngredientFilter {
        IngredientFilter {
            query: self.search_query.clone(),
            category: self.category_filter,
            list: Some(self.current_tab.list()),
            ascending: self.sort_ascending,
        }
    }

    pub fn visible(&self) -> Vec<IngredientEntry> {
        self.store.visible(&self.filter())
    }

    pub fn selected(&self) -> Option<IngredientEntry> {
        self.visible().into_iter().nth(self.selection)
    }

    pub fn undo_notice(&self) -> Option<UndoNotice> {
        self.store.undo_notice()
    }

    /// Short sync state for the status bar.
    pub fn sync_summary(&self) -> String {
        if !self.session.is_authenticated() {
            return "Local only".to_string();
        }
        if self.sync_in_progress {
            return "Syncing...".to_string();
        }
        let status = self.store.sync_status();
        match (status.last_error, status.last_synced_at) {
            (Some(_), _) => "Sync failed".to_string(),
            (None, Some(at)) => format!("Synced {}", age_display(at)),
            (None, None) => "Not synced yet".to_string(),
        }
    }

    /// Catalog names matching the dialog input, followed by the input itself
    /// when it is not already one of them.
    pub fn add_candidates(&self) -> Vec<String> {
        let typed = self.input.trim();
        let mut candidates: Vec<String> = self
            .catalog
            .search(typed, SUGGESTION_LIMIT)
            .into_iter()
            .map(str::to_string)
            .collect();
        if !typed.is_empty() && !candidates.iter().any(|c| c.eq_ignore_ascii_case(typed)) {
            candidates.push(typed.to_string());
        }
        candidates
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    pub fn switch_tab(&mut self, tab: Tab) {
        if self.current_tab != tab {
            self.current_tab = tab;
            self.selection = 0;
            self.focus = Focus::List;
        }
    }

    pub fn select_next(&mut self, step: usize) {
        let len = self.visible().len();
        if len > 0 {
            self.selection = (self.selection + step).min(len - 1);
        }
    }

    pub fn select_prev(&mut self, step: usize) {
        self.selection = self.selection.saturating_sub(step);
    }

    pub fn select_last(&mut self) {
        self.selection = self.visible().len().saturating_sub(1);
    }

    fn clamp_selection(&mut self) {
        let len = self.visible().len();
        if self.selection >= len {
            self.selection = len.saturating_sub(1);
        }
    }

    pub fn toggle_sort(&mut self) {
        self.sort_ascending = !self.sort_ascending;
        self.config.sort_ascending = self.sort_ascending;
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save sort preference");
        }
    }

    pub fn cycle_category(&mut self) {
        self.category_filter = Category::cycle(self.category_filter);
        self.selection = 0;
    }

    // =========================================================================
    // Actions
    // =========================================================================

    pub fn toggle_wanted(&mut self) {
        let Some(entry) = self.selected() else { return };
        if self.store.toggle_wanted(&entry.id) {
            let message = if entry.wanted {
                format!("{} taken off the shopping list", entry.name)
            } else {
                format!("{} added to the shopping list", entry.name)
            };
            self.status_message = Some(message);
            self.clamp_selection();
        }
    }

    pub fn delete_selected(&mut self) {
        let Some(entry) = self.selected() else { return };
        if self.store.delete_ingredient(&entry.id) {
            self.status_message = None;
            self.clamp_selection();
        }
    }

    /// Take the selected entry off the list shown by the current tab.
    pub fn remove_from_list(&mut self) {
        let Some(entry) = self.selected() else { return };
        let removed = match self.current_tab {
            Tab::Cabinet => self.store.remove_from_cabinet(&entry.id),
            Tab::Shopping => self.store.remove_from_shopping(&entry.id),
        };
        if removed {
            self.status_message = None;
            self.clamp_selection();
        }
    }

    pub fn adjust_selected(&mut self, delta: f64) {
        let Some(entry) = self.selected() else { return };
        if let Some(quantity) = self.store.adjust_quantity(&entry.id, entry.quantity + delta) {
            let level = (quantity * 100.0).round() as u32;
            self.status_message = Some(format!("{} at {}%", entry.name, level));
        }
    }

    pub fn purchase_selected(&mut self) {
        let Some(entry) = self.selected() else { return };
        if self.store.mark_purchased(&entry.id) {
            self.status_message = None;
            self.clamp_selection();
        }
    }

    pub fn purchase_all(&mut self) {
        let count = self.store.mark_all_purchased();
        self.status_message = Some(match count {
            0 => "Shopping list is empty".to_string(),
            1 => "1 item moved to the cabinet".to_string(),
            n => format!("{} items moved to the cabinet", n),
        });
        self.clamp_selection();
    }

    pub fn undo(&mut self) {
        self.status_message = Some(if self.store.undo() {
            "Undone".to_string()
        } else {
            "Nothing to undo".to_string()
        });
        self.clamp_selection();
    }

    /// Write the cache and reconcile now, in the background.
    pub fn sync_now(&mut self) {
        if !self.session.is_authenticated() {
            self.status_message = Some("Signed out - changes are kept locally".to_string());
            return;
        }
        let store = self.store.clone();
        tokio::spawn(async move {
            store.flush().await;
        });
        self.sync_in_progress = true;
    }

    /// Drop the pantry token. Entries stay in the local cache and later
    /// changes are no longer synced.
    pub fn sign_out(&mut self) {
        if !self.session.is_authenticated() {
            self.status_message = Some("Already signed out".to_string());
            return;
        }
        match self.session.forget(&self.cache_root) {
            Ok(()) => {
                info!("Signed out");
                self.status_message = Some("Signed out - changes are kept locally".to_string());
            }
            Err(e) => {
                warn!(error = %e, "Failed to remove persisted session");
                self.status_message = Some("Signed out for this run only".to_string());
            }
        }
    }

    pub fn start_rename(&mut self) {
        let Some(entry) = self.selected() else { return };
        self.input = entry.name;
        self.rename_target = Some(entry.id);
        self.state = AppState::Renaming;
    }

    pub fn commit_rename(&mut self) {
        self.state = AppState::Normal;
        let Some(id) = self.rename_target.take() else { return };
        let name = std::mem::take(&mut self.input);
        if self.store.rename(&id, &name) {
            self.status_message = None;
        } else {
            self.status_message = Some("Name unchanged".to_string());
        }
    }

    pub fn start_add(&mut self) {
        self.input.clear();
        self.suggestion_selection = 0;
        self.state = AppState::Adding;
    }

    pub fn commit_add(&mut self) {
        let candidates = self.add_candidates();
        self.state = AppState::Normal;
        self.input.clear();
        let Some(name) = candidates.get(self.suggestion_selection) else { return };

        let list = self.current_tab.list();
        if let Some(id) = self.store.add_from_catalog(name, list, FULL_QUANTITY) {
            let entry = self.store.get(&id);
            let shown = entry.as_ref().map_or(name.as_str(), |e| e.name.as_str());
            self.status_message = Some(format!("Added {} to {}", shown, self.current_tab.title()));
            if let Some(pos) = self.visible().iter().position(|e| e.id == id) {
                self.selection = pos;
            }
        }
    }

    pub fn cancel_input(&mut self) {
        self.state = AppState::Normal;
        self.input.clear();
        self.rename_target = None;
    }

    // =========================================================================
    // Background events
    // =========================================================================

    /// Drain store events without blocking.
    pub fn check_background_tasks(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.process_event(event);
        }
    }

    fn process_event(&mut self, event: CabinetEvent) {
        match event {
            CabinetEvent::Loaded(source) => {
                self.status_message = Some(
                    match source {
                        LoadSource::Remote => "Loaded from your pantry",
                        LoadSource::Cache => "Loaded from local cache",
                        LoadSource::Empty => "Cabinet is empty - press [a] to add",
                    }
                    .to_string(),
                );
                self.clamp_selection();
            }
            CabinetEvent::SyncStarted => self.sync_in_progress = true,
            CabinetEvent::SyncFinished(report) => {
                self.sync_in_progress = false;
                if let Some(message) = report_message(&report) {
                    self.status_message = Some(message);
                }
                self.clamp_selection();
            }
            CabinetEvent::SyncFailed(error) => {
                self.sync_in_progress = false;
                self.status_message = Some(format!("Sync failed: {}", error));
            }
        }
    }

    /// Flush pending work, bounded by a timeout, then stop background jobs.
    pub async fn shutdown(&mut self) {
        if tokio::time::timeout(FLUSH_TIMEOUT, self.store.flush())
            .await
            .is_err()
        {
            warn!("Final sync timed out");
        }
        self.store.shutdown();
    }
}

fn report_message(report: &ReconcileReport) -> Option<String> {
    if !report.is_clean() {
        return Some(format!("{} pantry changes failed, will retry", report.failed));
    }
    if report.changes() == 0 {
        return None;
    }
    Some(format!(
        "Synced: {} added, {} updated, {} removed",
        report.created, report.updated, report.deleted
    ))
}

// ============================================================================
// Input validation helpers (exported for use in input.rs)
// ============================================================================

/// Check if a name character should be accepted
pub fn can_add_name_char(current_len: usize, c: char) -> bool {
    current_len < MAX_NAME_LENGTH && !c.is_control()
}

// ============================================================================
// Tests
// ============================================================================
