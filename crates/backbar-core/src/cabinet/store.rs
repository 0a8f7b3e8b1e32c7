//! The ingredient cabinet store.
//!
//! `CabinetStore` owns the signed-in user's ingredient entries. Mutations are
//! applied to memory immediately; each one then schedules two independent
//! debounced jobs: a full overwrite of the local cache and, when signed in, a
//! reconciliation pass against the remote pantry. Remote failures are logged
//! and never roll back local state.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use rand::Rng;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::api::{ApiError, PantryApi};
use crate::auth::Session;
use crate::cache::KeyValueStore;
use crate::config::StoreOptions;
use crate::models::ingredient::REMOTE_ID_PREFIX;
use crate::models::{
    clamp_quantity, Category, IngredientEntry, PantryItem, TargetList, FULL_QUANTITY,
};
use crate::normalize::{image_url, match_key, normalize_name};

use super::filter::IngredientFilter;
use super::reconcile::{self, PlannedCreate, PlannedDelete, PlannedUpdate, ReconcileReport};
use super::scheduler::{Debouncer, Shutdown};
use super::undo::{UndoCommand, UndoNotice, UndoSlot};

// ============================================================================
// Constants
// ============================================================================

/// Local cache key holding the JSON array of entries
pub const INGREDIENTS_KEY: &str = "cabinet_ingredients";

/// Maximum concurrent pantry requests during one reconciliation pass.
const MAX_CONCURRENT_REQUESTS: usize = 4;

/// Upper bound of the random impact score given to new entries.
const MAX_IMPACT_SCORE: u32 = 100;

// ============================================================================
// Public types
// ============================================================================

/// Where the initial load found its entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Remote,
    Cache,
    Empty,
}

/// Notifications for the front-end, sent on the optional event channel.
#[derive(Debug, Clone, PartialEq)]
pub enum CabinetEvent {
    Loaded(LoadSource),
    SyncStarted,
    SyncFinished(ReconcileReport),
    SyncFailed(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncStatus {
    pub last_synced_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_report: Option<ReconcileReport>,
    pub in_flight: bool,
}

// ============================================================================
// State
// ============================================================================

struct CabinetState {
    entries: Vec<IngredientEntry>,
    /// Local id -> remote pantry row id, for owned entries synced at least once
    remote_ids: HashMap<String, i64>,
    undo: UndoSlot,
    sync: SyncStatus,
}

impl CabinetState {
    fn position(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.id == id)
    }

    fn entry_mut(&mut self, id: &str) -> Option<&mut IngredientEntry> {
        self.entries.iter_mut().find(|e| e.id == id)
    }

    /// Timestamp-derived id, bumped until unique.
    fn next_local_id(&self) -> String {
        let mut millis = Utc::now().timestamp_millis();
        loop {
            let candidate = millis.to_string();
            if self.position(&candidate).is_none() {
                return candidate;
            }
            millis += 1;
        }
    }

    fn apply_undo(&mut self, command: UndoCommand) -> bool {
        match command {
            UndoCommand::Reinsert { index, entry } => {
                if self.position(&entry.id).is_some() {
                    return false;
                }
                let index = index.min(self.entries.len());
                self.entries.insert(index, entry);
                true
            }
            UndoCommand::SetWanted { id, wanted } => {
                self.entry_mut(&id).map(|e| e.wanted = wanted).is_some()
            }
            UndoCommand::SetOwned { id, owned } => {
                self.entry_mut(&id).map(|e| e.owned = owned).is_some()
            }
            UndoCommand::RestoreName { id, name } => {
                self.entry_mut(&id).map(|e| e.name = name).is_some()
            }
            UndoCommand::RestorePurchase {
                id,
                wanted,
                owned,
                quantity,
            } => self
                .entry_mut(&id)
                .map(|e| {
                    e.wanted = wanted;
                    e.owned = owned;
                    e.quantity = quantity;
                })
                .is_some(),
        }
    }
}

fn entry_from_row(row: &PantryItem) -> IngredientEntry {
    let normalized = normalize_name(&row.ingredient_name);
    IngredientEntry {
        id: IngredientEntry::remote_local_id(row.id),
        name: normalized.display_name,
        category: Category::Other,
        owned: true,
        wanted: false,
        quantity: clamp_quantity(row.quantity),
        image_url: Some(image_url(&normalized.canonical_name)),
        impact_score: None,
    }
}

/// Mappings implied by `db_<id>` entries still in the cabinet.
fn mappings_from_ids(entries: &[IngredientEntry]) -> HashMap<String, i64> {
    entries
        .iter()
        .filter(|e| e.owned && e.is_remote_sourced())
        .filter_map(|e| {
            let server_id = e.id.strip_prefix(REMOTE_ID_PREFIX)?.parse::<i64>().ok()?;
            Some((e.id.clone(), server_id))
        })
        .collect()
}

enum RemoteOp {
    Update(PlannedUpdate),
    Create(PlannedCreate),
    Delete(PlannedDelete),
}

enum OpOutcome {
    Updated,
    Created { local_id: String, remote_id: i64 },
    Deleted { local_id: Option<String>, remote_id: i64 },
    Failed,
}

async fn execute_op(api: &dyn PantryApi, op: RemoteOp) -> OpOutcome {
    match op {
        RemoteOp::Update(u) => match api.update_pantry_item(u.remote_id, u.quantity).await {
            Ok(()) => OpOutcome::Updated,
            Err(e) => {
                warn!(id = %u.local_id, remote_id = u.remote_id, error = %e, "Pantry update failed");
                OpOutcome::Failed
            }
        },
        RemoteOp::Create(c) => match api.create_pantry_item(&c.name, c.quantity).await {
            Ok(item) => OpOutcome::Created {
                local_id: c.local_id,
                remote_id: item.id,
            },
            Err(e) => {
                warn!(id = %c.local_id, name = %c.name, error = %e, "Pantry create failed");
                OpOutcome::Failed
            }
        },
        RemoteOp::Delete(d) => match api.delete_pantry_item(d.remote_id).await {
            // Already gone counts as deleted
            Ok(()) | Err(ApiError::NotFound(_)) => OpOutcome::Deleted {
                local_id: d.local_id,
                remote_id: d.remote_id,
            },
            Err(e) => {
                warn!(remote_id = d.remote_id, error = %e, "Pantry delete failed");
                OpOutcome::Failed
            }
        },
    }
}

// ============================================================================
// Store
// ============================================================================

struct Inner {
    state: Mutex<CabinetState>,
    api: Arc<dyn PantryApi>,
    cache: Arc<dyn KeyValueStore>,
    session: Session,
    shutdown: Arc<Shutdown>,
    cache_job: Debouncer,
    remote_job: Debouncer,
    /// Serializes reconciliation passes and immediate creates
    sync_lock: tokio::sync::Mutex<()>,
    events: Option<mpsc::Sender<CabinetEvent>>,
}

/// Local-first store of the user's ingredient cabinet and shopping list.
/// Clone is cheap - all clones share the same state.
#[derive(Clone)]
pub struct CabinetStore {
    inner: Arc<Inner>,
}

impl CabinetStore {
    pub fn new(
        api: Arc<dyn PantryApi>,
        cache: Arc<dyn KeyValueStore>,
        session: Session,
        options: StoreOptions,
    ) -> Self {
        Self::build(api, cache, session, options, None)
    }

    /// Like `new`, additionally reporting loads and sync passes on `events`.
    pub fn with_events(
        api: Arc<dyn PantryApi>,
        cache: Arc<dyn KeyValueStore>,
        session: Session,
        options: StoreOptions,
        events: mpsc::Sender<CabinetEvent>,
    ) -> Self {
        Self::build(api, cache, session, options, Some(events))
    }

    fn build(
        api: Arc<dyn PantryApi>,
        cache: Arc<dyn KeyValueStore>,
        session: Session,
        options: StoreOptions,
        events: Option<mpsc::Sender<CabinetEvent>>,
    ) -> Self {
        let shutdown = Shutdown::new();
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(CabinetState {
                    entries: Vec::new(),
                    remote_ids: HashMap::new(),
                    undo: UndoSlot::new(options.undo_window),
                    sync: SyncStatus::default(),
                }),
                api,
                cache,
                session,
                cache_job: Debouncer::new("cache", options.cache_debounce, Arc::clone(&shutdown)),
                remote_job: Debouncer::new("remote", options.remote_debounce, Arc::clone(&shutdown)),
                shutdown,
                sync_lock: tokio::sync::Mutex::new(()),
                events,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CabinetState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn emit(&self, event: CabinetEvent) {
        if let Some(ref tx) = self.inner.events {
            if let Err(e) = tx.send(event).await {
                error!(error = %e, "Failed to send cabinet event - channel closed");
            }
        }
    }

    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(task);
            }
            Err(_) => debug!("No runtime, background pantry call skipped"),
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    pub fn entries(&self) -> Vec<IngredientEntry> {
        self.lock().entries.clone()
    }

    pub fn get(&self, id: &str) -> Option<IngredientEntry> {
        self.lock().entries.iter().find(|e| e.id == id).cloned()
    }

    /// Entries matching `filter`, sorted for display.
    pub fn visible(&self, filter: &IngredientFilter) -> Vec<IngredientEntry> {
        let state = self.lock();
        filter.apply(&state.entries).into_iter().cloned().collect()
    }

    /// Remote pantry row currently backing a local entry.
    pub fn remote_id(&self, local_id: &str) -> Option<i64> {
        self.lock().remote_ids.get(local_id).copied()
    }

    pub fn undo_notice(&self) -> Option<UndoNotice> {
        let mut state = self.lock();
        state.undo.expire();
        state.undo.notice()
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.lock().sync.clone()
    }

    // =========================================================================
    // Loading and persistence
    // =========================================================================

    fn read_cache(&self) -> Vec<IngredientEntry> {
        match self.inner.cache.get(INGREDIENTS_KEY) {
            Ok(Some(json)) => match serde_json::from_str::<Vec<IngredientEntry>>(&json) {
                Ok(mut entries) => {
                    for entry in &mut entries {
                        entry.quantity = clamp_quantity(entry.quantity);
                    }
                    entries
                }
                Err(e) => {
                    warn!(error = %e, "Cabinet cache is unreadable, ignoring it");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "Failed to read cabinet cache");
                Vec::new()
            }
        }
    }

    /// Initial load. A non-empty remote pantry is authoritative for owned
    /// entries; otherwise the local cache is used.
    pub async fn load(&self) -> LoadSource {
        let cached = self.read_cache();

        if self.inner.session.is_authenticated() {
            match self.inner.api.list_pantry().await {
                Ok(rows) if !rows.is_empty() => {
                    self.apply_remote_load(&rows, cached);
                    self.persist_now();
                    info!(count = rows.len(), "Loaded cabinet from remote pantry");
                    self.emit(CabinetEvent::Loaded(LoadSource::Remote)).await;
                    return LoadSource::Remote;
                }
                Ok(_) => debug!("Remote pantry is empty, using local cache"),
                Err(e) => warn!(error = %e, "Failed to fetch pantry, using local cache"),
            }
        }

        if cached.is_empty() {
            debug!("No cached cabinet");
            self.emit(CabinetEvent::Loaded(LoadSource::Empty)).await;
            return LoadSource::Empty;
        }

        info!(count = cached.len(), "Loaded cabinet from local cache");
        {
            let mut state = self.lock();
            state.remote_ids = mappings_from_ids(&cached);
            state.entries = cached;
            state.undo.clear();
        }
        self.schedule_sync();
        self.emit(CabinetEvent::Loaded(LoadSource::Cache)).await;
        LoadSource::Cache
    }

    fn apply_remote_load(&self, rows: &[PantryItem], cached: Vec<IngredientEntry>) {
        let mut entries: Vec<IngredientEntry> = rows.iter().map(entry_from_row).collect();

        // Shopping-only entries never reach the pantry, so carry them over
        for shopping in cached.into_iter().filter(|e| e.wanted && !e.owned) {
            let key = match_key(&shopping.name);
            match entries
                .iter_mut()
                .find(|e| e.id == shopping.id || match_key(&e.name) == key)
            {
                Some(existing) => existing.wanted = true,
                None => entries.push(shopping),
            }
        }

        let mut state = self.lock();
        state.remote_ids = rows
            .iter()
            .map(|r| (IngredientEntry::remote_local_id(r.id), r.id))
            .collect();
        state.entries = entries;
        state.undo.clear();
    }

    /// Overwrite the local cache with the current entries.
    pub fn persist_now(&self) -> bool {
        let json = {
            let state = self.lock();
            serde_json::to_string(&state.entries)
        };
        let result = json
            .map_err(anyhow::Error::from)
            .and_then(|json| self.inner.cache.set(INGREDIENTS_KEY, &json));
        match result {
            Ok(()) => {
                debug!("Cabinet cache written");
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to write cabinet cache");
                false
            }
        }
    }

    fn schedule_sync(&self) {
        let store = self.clone();
        self.inner.cache_job.schedule(move |_| async move {
            store.persist_now();
        });

        if self.inner.session.is_authenticated() {
            let store = self.clone();
            self.inner.remote_job.schedule(move |generation| async move {
                store.run_scheduled_reconcile(generation).await;
            });
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Apply `f` to the state; a `Some` result schedules persistence and sync.
    fn mutate<R>(&self, f: impl FnOnce(&mut CabinetState) -> Option<R>) -> Option<R> {
        let result = {
            let mut state = self.lock();
            f(&mut state)
        };
        if result.is_some() {
            self.schedule_sync();
        }
        result
    }

    pub fn toggle_wanted(&self, id: &str) -> bool {
        self.mutate(|state| {
            let entry = state.entry_mut(id)?;
            entry.wanted = !entry.wanted;
            Some(())
        })
        .is_some()
    }

    /// Remove an entry entirely. Undo puts it back at the same index.
    pub fn delete_ingredient(&self, id: &str) -> bool {
        self.mutate(|state| {
            let index = state.position(id)?;
            let entry = state.entries.remove(index);
            let label = format!("Deleted {}", entry.name);
            state.undo.record(UndoCommand::Reinsert { index, entry }, label);
            Some(())
        })
        .is_some()
    }

    pub fn add_to_shopping(&self, id: &str) -> bool {
        self.mutate(|state| {
            state.entry_mut(id)?.wanted = true;
            Some(())
        })
        .is_some()
    }

    pub fn remove_from_shopping(&self, id: &str) -> bool {
        self.mutate(|state| {
            let entry = state.entry_mut(id)?;
            entry.wanted = false;
            let label = format!("Removed {} from shopping list", entry.name);
            state.undo.record(
                UndoCommand::SetWanted {
                    id: id.to_string(),
                    wanted: true,
                },
                label,
            );
            Some(())
        })
        .is_some()
    }

    /// Take an entry out of the cabinet without deleting it.
    pub fn remove_from_cabinet(&self, id: &str) -> bool {
        self.mutate(|state| {
            let entry = state.entry_mut(id)?;
            entry.owned = false;
            let label = format!("Removed {} from cabinet", entry.name);
            state.undo.record(
                UndoCommand::SetOwned {
                    id: id.to_string(),
                    owned: true,
                },
                label,
            );
            Some(())
        })
        .is_some()
    }

    /// Set the remaining quantity, clamped to [0, 1] and rounded to two
    /// decimals. Owned, synced entries are pushed to the pantry right away.
    pub fn adjust_quantity(&self, id: &str, next: f64) -> Option<f64> {
        let quantity = clamp_quantity(next);
        let (owned, remote_id) = self.mutate(|state| {
            let remote_id = state.remote_ids.get(id).copied();
            let entry = state.entry_mut(id)?;
            entry.quantity = quantity;
            Some((entry.owned, remote_id))
        })?;

        if owned && self.inner.session.is_authenticated() {
            if let Some(remote_id) = remote_id {
                let api = Arc::clone(&self.inner.api);
                let local_id = id.to_string();
                self.spawn(async move {
                    if let Err(e) = api.update_pantry_item(remote_id, quantity).await {
                        warn!(id = %local_id, remote_id, error = %e, "Quantity update failed");
                    }
                });
            }
        }
        Some(quantity)
    }

    /// Rename an entry. Names equal to the current one (after trimming and
    /// normalization) are ignored. Undo restores the old name only.
    pub fn rename(&self, id: &str, new_name: &str) -> bool {
        let trimmed = new_name.trim();
        if trimmed.is_empty() {
            return false;
        }
        let normalized = normalize_name(trimmed);

        self.mutate(|state| {
            let (old_name, label) = {
                let entry = state.entry_mut(id)?;
                if entry.name == trimmed || entry.name == normalized.display_name {
                    return None;
                }
                let old_name = std::mem::replace(&mut entry.name, normalized.display_name);
                entry.image_url = Some(image_url(&normalized.canonical_name));
                let label = format!("Renamed {} to {}", old_name, entry.name);
                (old_name, label)
            };
            state.undo.record(
                UndoCommand::RestoreName {
                    id: id.to_string(),
                    name: old_name,
                },
                label,
            );
            Some(())
        })
        .is_some()
    }

    /// Move one entry from the shopping list into the cabinet as a full bottle.
    pub fn mark_purchased(&self, id: &str) -> bool {
        self.mutate(|state| {
            let (command, label) = {
                let entry = state.entry_mut(id)?;
                let command = UndoCommand::RestorePurchase {
                    id: id.to_string(),
                    wanted: entry.wanted,
                    owned: entry.owned,
                    quantity: entry.quantity,
                };
                entry.wanted = false;
                entry.owned = true;
                entry.quantity = FULL_QUANTITY;
                (command, format!("Purchased {}", entry.name))
            };
            state.undo.record(command, label);
            Some(())
        })
        .is_some()
    }

    /// Mark every wanted entry purchased. Returns how many changed.
    pub fn mark_all_purchased(&self) -> usize {
        self.mutate(|state| {
            let mut count = 0;
            for entry in state.entries.iter_mut().filter(|e| e.wanted) {
                entry.wanted = false;
                entry.owned = true;
                entry.quantity = FULL_QUANTITY;
                count += 1;
            }
            (count > 0).then_some(count)
        })
        .unwrap_or(0)
    }

    /// Add an ingredient by name to the cabinet or the shopping list.
    ///
    /// If the name is already on that list its id is returned unchanged; if it
    /// exists on the other list, that entry is flagged instead of duplicated.
    /// New cabinet entries are created in the remote pantry right away.
    pub fn add_from_catalog(&self, name: &str, target: TargetList, quantity: f64) -> Option<String> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return None;
        }
        let normalized = normalize_name(trimmed);
        let key = normalized.display_name.to_lowercase();
        let quantity = clamp_quantity(quantity);
        let owned = target == TargetList::Cabinet;

        let existing = {
            let state = self.lock();
            state
                .entries
                .iter()
                .find(|e| match_key(&e.name) == key)
                .map(|e| (e.id.clone(), if owned { e.owned } else { e.wanted }))
        };

        let id = match existing {
            Some((id, true)) => return Some(id),
            Some((id, false)) => self.mutate(|state| {
                let entry = state.entry_mut(&id)?;
                if owned {
                    entry.owned = true;
                    entry.quantity = quantity;
                } else {
                    entry.wanted = true;
                }
                Some(id.clone())
            })?,
            None => {
                let impact_score = rand::thread_rng().gen_range(1..=MAX_IMPACT_SCORE);
                self.mutate(|state| {
                    let id = state.next_local_id();
                    state.entries.push(IngredientEntry {
                        id: id.clone(),
                        name: normalized.display_name.clone(),
                        category: Category::Other,
                        owned,
                        wanted: !owned,
                        quantity,
                        image_url: Some(image_url(&normalized.canonical_name)),
                        impact_score: Some(impact_score),
                    });
                    Some(id)
                })?
            }
        };

        if owned && self.inner.session.is_authenticated() {
            let store = self.clone();
            let local_id = id.clone();
            self.spawn(async move {
                store.push_new_entry(local_id).await;
            });
        }
        Some(id)
    }

    /// Apply the pending undo command, if still within its window.
    pub fn undo(&self) -> bool {
        self.mutate(|state| {
            let command = state.undo.take()?;
            state.apply_undo(command).then_some(())
        })
        .is_some()
    }

    // =========================================================================
    // Remote sync
    // =========================================================================

    async fn push_new_entry(&self, local_id: String) {
        let _guard = self.inner.sync_lock.lock().await;
        let pending = {
            let state = self.lock();
            state
                .entries
                .iter()
                .find(|e| e.id == local_id && e.owned && !state.remote_ids.contains_key(&e.id))
                .map(|e| (e.name.clone(), e.quantity))
        };
        let Some((name, quantity)) = pending else {
            return;
        };

        match self.inner.api.create_pantry_item(&name, quantity).await {
            Ok(item) => {
                debug!(id = %local_id, remote_id = item.id, "New cabinet entry created remotely");
                self.lock().remote_ids.insert(local_id, item.id);
            }
            Err(e) => warn!(id = %local_id, error = %e, "Failed to create pantry item"),
        }
    }

    async fn run_scheduled_reconcile(&self, generation: u64) {
        let _guard = self.inner.sync_lock.lock().await;
        if !self.inner.remote_job.is_current(generation) {
            debug!(generation, "Reconcile superseded while waiting");
            return;
        }
        // Failures are logged and recorded in the sync status
        let _ = self.reconcile_locked().await;
    }

    /// Run a reconciliation pass now, waiting for any pass in flight.
    pub async fn reconcile_now(&self) -> Result<ReconcileReport, ApiError> {
        let _guard = self.inner.sync_lock.lock().await;
        self.reconcile_locked().await
    }

    async fn reconcile_locked(&self) -> Result<ReconcileReport, ApiError> {
        if !self.inner.session.is_authenticated() {
            return Err(ApiError::Unauthenticated);
        }

        self.lock().sync.in_flight = true;
        self.emit(CabinetEvent::SyncStarted).await;

        let remote = match self.inner.api.list_pantry().await {
            Ok(rows) => rows,
            Err(e) => {
                if e.is_auth_error() {
                    warn!(error = %e, "Reconcile skipped, pantry rejected the session token");
                } else {
                    warn!(error = %e, "Reconcile skipped, pantry unavailable");
                }
                {
                    let mut state = self.lock();
                    state.sync.in_flight = false;
                    state.sync.last_error = Some(e.to_string());
                }
                self.emit(CabinetEvent::SyncFailed(e.to_string())).await;
                return Err(e);
            }
        };

        let plan = {
            let mut state = self.lock();
            let plan = reconcile::plan(&state.entries, &remote, &state.remote_ids);
            for (local_id, remote_id) in &plan.links {
                state.remote_ids.insert(local_id.clone(), *remote_id);
            }
            for local_id in &plan.forget {
                state.remote_ids.remove(local_id);
            }
            plan
        };
        if !plan.is_noop() {
            debug!(
                updates = plan.updates.len(),
                creates = plan.creates.len(),
                deletes = plan.deletes.len(),
                "Reconcile plan ready"
            );
        }

        let ops: Vec<RemoteOp> = plan
            .updates
            .into_iter()
            .map(RemoteOp::Update)
            .chain(plan.creates.into_iter().map(RemoteOp::Create))
            .chain(plan.deletes.into_iter().map(RemoteOp::Delete))
            .collect();

        let api = Arc::clone(&self.inner.api);
        let outcomes: Vec<OpOutcome> = stream::iter(ops)
            .map(|op| {
                let api = Arc::clone(&api);
                async move { execute_op(api.as_ref(), op).await }
            })
            .buffer_unordered(MAX_CONCURRENT_REQUESTS)
            .collect()
            .await;

        let report = {
            let mut state = self.lock();
            let mut report = ReconcileReport::default();
            for outcome in outcomes {
                match outcome {
                    OpOutcome::Updated => report.updated += 1,
                    OpOutcome::Created { local_id, remote_id } => {
                        // Kept even if the entry changed meanwhile; the next pass cleans up
                        state.remote_ids.insert(local_id, remote_id);
                        report.created += 1;
                    }
                    OpOutcome::Deleted { local_id, remote_id } => {
                        if let Some(local_id) = local_id {
                            if state.remote_ids.get(&local_id) == Some(&remote_id) {
                                state.remote_ids.remove(&local_id);
                            }
                        }
                        report.deleted += 1;
                    }
                    OpOutcome::Failed => report.failed += 1,
                }
            }

            state.sync.in_flight = false;
            state.sync.last_report = Some(report);
            if report.is_clean() {
                state.sync.last_synced_at = Some(Utc::now());
                state.sync.last_error = None;
            } else {
                state.sync.last_error = Some(format!("{} pantry changes failed", report.failed));
            }
            report
        };

        if report.changes() > 0 || !report.is_clean() {
            info!(
                created = report.created,
                updated = report.updated,
                deleted = report.deleted,
                failed = report.failed,
                "Pantry reconciled"
            );
        } else {
            debug!("Pantry already in sync");
        }
        self.emit(CabinetEvent::SyncFinished(report)).await;
        Ok(report)
    }

    /// Run pending work immediately: write the cache and, when signed in,
    /// reconcile. Pending debounced jobs are cancelled.
    pub async fn flush(&self) -> Option<ReconcileReport> {
        self.inner.cache_job.cancel();
        self.inner.remote_job.cancel();
        self.persist_now();
        if self.inner.session.is_authenticated() {
            self.reconcile_now().await.ok()
        } else {
            None
        }
    }

    /// Cancel pending debounced jobs; later mutations no longer schedule any.
    pub fn shutdown(&self) {
        info!("Cabinet store shutting down");
        self.inner.shutdown.trigger();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::auth::SessionData;
    use crate::cache::MemoryStore;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        List,
        Create(String, f64),
        Update(i64, f64),
        Delete(i64),
    }

    struct FakePantry {
        rows: Mutex<Vec<PantryItem>>,
        calls: Mutex<Vec<Call>>,
        next_id: AtomicI64,
        offline: AtomicBool,
    }

    impl FakePantry {
        fn new(rows: Vec<PantryItem>) -> Arc<Self> {
            Arc::new(Self {
                rows: Mutex::new(rows),
                calls: Mutex::new(Vec::new()),
                next_id: AtomicI64::new(100),
                offline: AtomicBool::new(false),
            })
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().expect("calls lock").clone()
        }

        fn clear_calls(&self) {
            self.calls.lock().expect("calls lock").clear();
        }

        fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
            self.calls().iter().filter(|c| pred(c)).count()
        }

        fn record(&self, call: Call) -> Result<(), ApiError> {
            self.calls.lock().expect("calls lock").push(call);
            if self.offline.load(Ordering::SeqCst) {
                Err(ApiError::ServerError("offline".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl PantryApi for FakePantry {
        async fn list_pantry(&self) -> Result<Vec<PantryItem>, ApiError> {
            self.record(Call::List)?;
            Ok(self.rows.lock().expect("rows lock").clone())
        }

        async fn create_pantry_item(&self, name: &str, quantity: f64) -> Result<PantryItem, ApiError> {
            self.record(Call::Create(name.to_string(), quantity))?;
            let item = PantryItem {
                id: self.next_id.fetch_add(1, Ordering::SeqCst),
                ingredient_name: name.to_string(),
                quantity,
            };
            self.rows.lock().expect("rows lock").push(item.clone());
            Ok(item)
        }

        async fn update_pantry_item(&self, id: i64, quantity: f64) -> Result<(), ApiError> {
            self.record(Call::Update(id, quantity))?;
            let mut rows = self.rows.lock().expect("rows lock");
            match rows.iter_mut().find(|r| r.id == id) {
                Some(row) => {
                    row.quantity = quantity;
                    Ok(())
                }
                None => Err(ApiError::NotFound(id.to_string())),
            }
        }

        async fn delete_pantry_item(&self, id: i64) -> Result<(), ApiError> {
            self.record(Call::Delete(id))?;
            self.rows.lock().expect("rows lock").retain(|r| r.id != id);
            Ok(())
        }
    }

    /// Delays listing and creation, and records whether two listings overlapped.
    struct SlowPantry {
        inner: Arc<FakePantry>,
        delay: Duration,
        listing: AtomicBool,
        overlapped: AtomicBool,
    }

    impl SlowPantry {
        fn new(inner: &Arc<FakePantry>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                inner: Arc::clone(inner),
                delay,
                listing: AtomicBool::new(false),
                overlapped: AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl PantryApi for SlowPantry {
        async fn list_pantry(&self) -> Result<Vec<PantryItem>, ApiError> {
            if self.listing.swap(true, Ordering::SeqCst) {
                self.overlapped.store(true, Ordering::SeqCst);
            }
            tokio::time::sleep(self.delay).await;
            let rows = self.inner.list_pantry().await;
            self.listing.store(false, Ordering::SeqCst);
            rows
        }

        async fn create_pantry_item(&self, name: &str, quantity: f64) -> Result<PantryItem, ApiError> {
            tokio::time::sleep(self.delay).await;
            self.inner.create_pantry_item(name, quantity).await
        }

        async fn update_pantry_item(&self, id: i64, quantity: f64) -> Result<(), ApiError> {
            self.inner.update_pantry_item(id, quantity).await
        }

        async fn delete_pantry_item(&self, id: i64) -> Result<(), ApiError> {
            self.inner.delete_pantry_item(id).await
        }
    }

    /// Cache-loaded store over a `SlowPantry`, signed in after loading.
    async fn slow_loaded(
        entries: &[IngredientEntry],
        delay: Duration,
    ) -> (CabinetStore, Arc<FakePantry>, Arc<SlowPantry>) {
        let api = FakePantry::new(vec![]);
        let slow = SlowPantry::new(&api, delay);
        let session = Session::anonymous();
        let store = CabinetStore::new(
            Arc::clone(&slow) as Arc<dyn PantryApi>,
            seed_cache(entries),
            session.clone(),
            StoreOptions::default(),
        );
        assert_eq!(store.load().await, LoadSource::Cache);
        sign_in(&session);
        (store, api, slow)
    }

    fn row(id: i64, name: &str, quantity: f64) -> PantryItem {
        PantryItem {
            id,
            ingredient_name: name.to_string(),
            quantity,
        }
    }

    fn entry(id: &str, name: &str, owned: bool, wanted: bool, quantity: f64) -> IngredientEntry {
        IngredientEntry {
            id: id.to_string(),
            name: name.to_string(),
            category: Category::Other,
            owned,
            wanted,
            quantity,
            image_url: None,
            impact_score: None,
        }
    }

    fn seed_cache(entries: &[IngredientEntry]) -> Arc<MemoryStore> {
        let cache = Arc::new(MemoryStore::new());
        let json = serde_json::to_string(entries).expect("serialize seed");
        cache.set(INGREDIENTS_KEY, &json).expect("seed cache");
        cache
    }

    fn cached_entries(cache: &MemoryStore) -> Vec<IngredientEntry> {
        let json = cache.get(INGREDIENTS_KEY).expect("read cache").expect("cache written");
        serde_json::from_str(&json).expect("cache parses")
    }

    fn sign_in(session: &Session) {
        session.set_user(SessionData::new("ada@example.com", "token"));
    }

    fn store(api: &Arc<FakePantry>, cache: &Arc<MemoryStore>, session: &Session) -> CabinetStore {
        CabinetStore::new(
            Arc::clone(api) as Arc<dyn PantryApi>,
            Arc::clone(cache) as Arc<dyn KeyValueStore>,
            session.clone(),
            StoreOptions::default(),
        )
    }

    /// Store loaded from cache while signed out, then signed in.
    async fn offline_loaded(
        entries: &[IngredientEntry],
        remote: Vec<PantryItem>,
    ) -> (CabinetStore, Arc<FakePantry>, Arc<MemoryStore>) {
        let api = FakePantry::new(remote);
        let cache = seed_cache(entries);
        let session = Session::anonymous();
        let store = store(&api, &cache, &session);
        assert_eq!(store.load().await, LoadSource::Cache);
        sign_in(&session);
        (store, api, cache)
    }

    #[tokio::test(start_paused = true)]
    async fn test_adjust_quantity_clamps_and_rounds() {
        let (store, _, _) = offline_loaded(&[entry("1", "Lime", true, false, 1.0)], vec![]).await;

        for (input, expected) in [(-0.5, 0.0), (0.333, 0.33), (0.5, 0.5), (0.999, 1.0), (7.0, 1.0)] {
            assert_eq!(store.adjust_quantity("1", input), Some(expected));
            assert_eq!(store.get("1").expect("entry").quantity, expected);
            assert_eq!(expected, (input.clamp(0.0, 1.0) * 100.0_f64).round() / 100.0);
        }
        assert_eq!(store.adjust_quantity("missing", 0.5), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_then_undo_restores_index() {
        let entries = [
            entry("1", "Gin", true, false, 1.0),
            entry("2", "Lime", true, true, 0.4),
            entry("3", "Mint", false, true, 1.0),
        ];
        let (store, _, _) = offline_loaded(&entries, vec![]).await;
        let before = store.entries();

        assert!(store.delete_ingredient("2"));
        assert!(store.get("2").is_none());
        assert_eq!(
            store.undo_notice().map(|n| n.label),
            Some("Deleted Lime".to_string())
        );

        assert!(store.undo());
        assert_eq!(store.entries(), before);
        assert!(!store.undo());
    }

    #[tokio::test(start_paused = true)]
    async fn test_undo_window_expires() {
        let (store, _, _) = offline_loaded(&[entry("1", "Gin", true, false, 1.0)], vec![]).await;
        assert!(store.remove_from_cabinet("1"));
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(store.undo_notice().is_none());
        assert!(!store.undo());
        assert!(!store.get("1").expect("entry").owned);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rename_to_same_name_is_noop() {
        let (store, _, _) = offline_loaded(&[entry("1", "Lime", true, false, 1.0)], vec![]).await;
        let before = store.entries();

        assert!(!store.rename("1", "  Lime "));
        assert!(!store.rename("1", "lime"));
        assert!(!store.rename("1", "   "));
        assert!(store.undo_notice().is_none());
        assert_eq!(store.entries(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rename_and_undo_reverts_name_only() {
        let (store, _, _) = offline_loaded(&[entry("1", "Lime", true, false, 1.0)], vec![]).await;

        assert!(store.rename("1", "fresh lime juice"));
        let renamed = store.get("1").expect("entry");
        assert_eq!(renamed.name, "Lime Juice");
        let image = renamed.image_url.clone();
        assert!(image.as_deref().is_some_and(|u| u.contains("lime%20juice")));

        assert!(store.undo());
        let reverted = store.get("1").expect("entry");
        assert_eq!(reverted.name, "Lime");
        assert_eq!(reverted.image_url, image);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mark_purchased_and_undo() {
        let (store, _, _) =
            offline_loaded(&[entry("1", "Orgeat", false, true, 0.2)], vec![]).await;

        assert!(store.mark_purchased("1"));
        let bought = store.get("1").expect("entry");
        assert!(!bought.wanted);
        assert!(bought.owned);
        assert_eq!(bought.quantity, 1.0);

        assert!(store.undo());
        let restored = store.get("1").expect("entry");
        assert!(restored.wanted);
        assert!(!restored.owned);
        assert_eq!(restored.quantity, 0.2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mark_all_purchased() {
        let entries = [
            entry("1", "Orgeat", false, true, 0.2),
            entry("2", "Rum", false, true, 1.0),
            entry("3", "Gin", true, false, 0.5),
        ];
        let (store, _, _) = offline_loaded(&entries, vec![]).await;
        assert_eq!(store.mark_all_purchased(), 2);
        assert!(store.entries().iter().all(|e| e.owned && !e.wanted));
        assert_eq!(store.get("3").expect("entry").quantity, 0.5);
        assert_eq!(store.mark_all_purchased(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shopping_flags_and_undo() {
        let (store, _, _) = offline_loaded(&[entry("1", "Gin", true, false, 1.0)], vec![]).await;

        assert!(store.add_to_shopping("1"));
        assert!(store.undo_notice().is_none());
        assert!(store.remove_from_shopping("1"));
        assert!(!store.get("1").expect("entry").wanted);
        assert!(store.undo());
        assert!(store.get("1").expect("entry").wanted);

        assert!(store.toggle_wanted("1"));
        assert!(!store.get("1").expect("entry").wanted);
        assert!(!store.toggle_wanted("missing"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_legacy_cache_defaults_quantity() {
        let cache = Arc::new(MemoryStore::new());
        cache
            .set(
                INGREDIENTS_KEY,
                r#"[{"id":"1","name":"Lime","category":"Juice","owned":true},
                    {"id":"2","name":"Mint","owned":false,"wanted":true,"quantity":0.25}]"#,
            )
            .expect("seed cache");
        let api = FakePantry::new(vec![]);
        let store = store(&api, &cache, &Session::anonymous());

        assert_eq!(store.load().await, LoadSource::Cache);
        assert_eq!(store.get("1").expect("entry").quantity, 1.0);
        assert_eq!(store.get("2").expect("entry").quantity, 0.25);
        assert!(api.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_load_is_authoritative() {
        let api = FakePantry::new(vec![row(7, "lime", 0.5), row(8, "Gin", 1.3)]);
        let cache = seed_cache(&[
            entry("1", "Vodka", true, false, 1.0),
            entry("2", "Orgeat", false, true, 1.0),
            entry("3", "Gin", false, true, 1.0),
        ]);
        let session = Session::anonymous();
        sign_in(&session);
        let store = store(&api, &cache, &session);

        assert_eq!(store.load().await, LoadSource::Remote);
        let entries = store.entries();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Lime", "Gin", "Orgeat"]);

        let lime = store.get("db_7").expect("remote entry");
        assert!(lime.owned);
        assert_eq!(lime.quantity, 0.5);
        assert_eq!(lime.category, Category::Other);
        assert_eq!(store.get("db_8").expect("remote entry").quantity, 1.0);
        assert!(store.get("db_8").expect("remote entry").wanted);
        assert_eq!(store.remote_id("db_7"), Some(7));

        // Mirrored to the cache immediately
        assert_eq!(cached_entries(&cache), entries);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_failure_falls_back_to_cache() {
        let api = FakePantry::new(vec![row(7, "Lime", 0.5)]);
        api.offline.store(true, Ordering::SeqCst);
        let cache = seed_cache(&[entry("db_3", "Rum", true, false, 0.8)]);
        let session = Session::anonymous();
        sign_in(&session);
        let store = store(&api, &cache, &session);

        assert_eq!(store.load().await, LoadSource::Cache);
        assert_eq!(store.entries().len(), 1);
        assert_eq!(store.remote_id("db_3"), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_everywhere() {
        let api = FakePantry::new(vec![]);
        let session = Session::anonymous();
        sign_in(&session);
        let store = store(&api, &Arc::new(MemoryStore::new()), &session);
        assert_eq!(store.load().await, LoadSource::Empty);
        assert!(store.entries().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconcile_updates_drifted_quantity() {
        let (store, api, _) = offline_loaded(
            &[entry("1", "Lime", true, false, 0.5)],
            vec![row(10, "Lime", 0.9)],
        )
        .await;

        let report = store.reconcile_now().await.expect("reconcile");
        assert_eq!(report.updated, 1);
        assert_eq!(report.created, 0);
        assert_eq!(api.count(|c| matches!(c, Call::Update(10, q) if *q == 0.5)), 1);
        assert_eq!(api.count(|c| matches!(c, Call::Create(..))), 0);
        assert_eq!(store.remote_id("1"), Some(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconcile_creates_and_records_mapping() {
        let (store, api, _) =
            offline_loaded(&[entry("1", "Gin", true, false, 0.75)], vec![]).await;

        let report = store.reconcile_now().await.expect("reconcile");
        assert_eq!(report.created, 1);
        assert_eq!(api.calls(), vec![Call::List, Call::Create("Gin".to_string(), 0.75)]);
        assert_eq!(store.remote_id("1"), Some(100));

        // Second pass finds the row by name and does nothing
        api.clear_calls();
        let report = store.reconcile_now().await.expect("reconcile");
        assert_eq!(report.changes(), 0);
        assert_eq!(api.calls(), vec![Call::List]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconcile_deletes_removed_entries() {
        let (store, api, _) = offline_loaded(
            &[
                entry("db_10", "Lime", true, false, 1.0),
                entry("db_11", "Gin", true, false, 1.0),
            ],
            vec![row(10, "Lime", 1.0), row(11, "Gin", 1.0)],
        )
        .await;

        assert!(store.remove_from_cabinet("db_10"));
        assert!(store.delete_ingredient("db_11"));
        let report = store.reconcile_now().await.expect("reconcile");

        assert_eq!(report.deleted, 2);
        assert_eq!(api.count(|c| matches!(c, Call::Delete(10))), 1);
        assert_eq!(api.count(|c| matches!(c, Call::Delete(11))), 1);
        assert_eq!(store.remote_id("db_10"), None);
        assert_eq!(store.remote_id("db_11"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rename_reconciles_as_delete_and_create() {
        let (store, api, _) = offline_loaded(
            &[entry("db_10", "Lime", true, false, 1.0)],
            vec![row(10, "Lime", 1.0)],
        )
        .await;

        assert!(store.rename("db_10", "Key Lime"));
        let report = store.reconcile_now().await.expect("reconcile");

        assert_eq!((report.created, report.deleted), (1, 1));
        assert_eq!(api.count(|c| matches!(c, Call::Delete(10))), 1);
        assert_eq!(api.count(|c| matches!(c, Call::Create(n, _) if n == "Key Lime")), 1);
        assert_eq!(store.remote_id("db_10"), Some(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconcile_failure_keeps_local_state() {
        let (store, api, _) =
            offline_loaded(&[entry("1", "Gin", true, false, 0.75)], vec![]).await;
        api.offline.store(true, Ordering::SeqCst);
        let before = store.entries();

        assert!(store.reconcile_now().await.is_err());
        assert_eq!(store.entries(), before);
        let status = store.sync_status();
        assert!(status.last_error.is_some());
        assert!(!status.in_flight);
        assert!(status.last_synced_at.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconcile_requires_session() {
        let api = FakePantry::new(vec![]);
        let store = store(&api, &Arc::new(MemoryStore::new()), &Session::anonymous());
        assert!(matches!(store.reconcile_now().await, Err(ApiError::Unauthenticated)));
        assert!(api.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounced_cache_write_keeps_latest_state() {
        let (store, _, cache) =
            offline_loaded(&[entry("1", "Lime", true, false, 1.0)], vec![]).await;
        tokio::time::sleep(Duration::from_millis(300)).await;

        store.adjust_quantity("1", 0.8);
        store.adjust_quantity("1", 0.6);
        store.adjust_quantity("1", 0.4);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(cached_entries(&cache)[0].quantity, 1.0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(cached_entries(&cache)[0].quantity, 0.4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounced_reconcile_runs_once_per_burst() {
        let api = FakePantry::new(vec![row(1, "Lime", 1.0)]);
        let session = Session::anonymous();
        sign_in(&session);
        let store = store(&api, &Arc::new(MemoryStore::new()), &session);
        assert_eq!(store.load().await, LoadSource::Remote);
        api.clear_calls();

        for _ in 0..4 {
            store.toggle_wanted("db_1");
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        assert!(api.calls().is_empty());

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(api.calls(), vec![Call::List]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_adjust_quantity_pushes_synced_entry() {
        let api = FakePantry::new(vec![row(1, "Lime", 1.0)]);
        let session = Session::anonymous();
        sign_in(&session);
        let store = store(&api, &Arc::new(MemoryStore::new()), &session);
        store.load().await;
        api.clear_calls();

        store.adjust_quantity("db_1", 0.3);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(api.calls(), vec![Call::Update(1, 0.3)]);

        // The debounced pass then sees matching quantities
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(api.count(|c| matches!(c, Call::Update(..))), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_quantity_push_keeps_local_value() {
        let api = FakePantry::new(vec![row(1, "Lime", 1.0)]);
        let cache = Arc::new(MemoryStore::new());
        let session = Session::anonymous();
        sign_in(&session);
        let store = store(&api, &cache, &session);
        assert_eq!(store.load().await, LoadSource::Remote);
        api.clear_calls();
        api.offline.store(true, Ordering::SeqCst);

        assert_eq!(store.adjust_quantity("db_1", 0.3), Some(0.3));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(api.calls(), vec![Call::Update(1, 0.3)]);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(store.get("db_1").expect("entry").quantity, 0.3);
        assert_eq!(cached_entries(&cache)[0].quantity, 0.3);
        assert_eq!(store.remote_id("db_1"), Some(1));
        assert!(store.sync_status().last_error.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_passes_never_overlap_and_clean_up_orphaned_create() {
        let delay = Duration::from_millis(500);
        let (store, api, slow) = slow_loaded(&[entry("1", "Gin", true, false, 1.0)], delay).await;

        // List 0-500 ms, then create 500-1000 ms
        let first = {
            let store = store.clone();
            tokio::spawn(async move { store.reconcile_now().await })
        };
        tokio::time::sleep(Duration::from_millis(700)).await;
        assert!(store.delete_ingredient("1"));
        let second = {
            let store = store.clone();
            tokio::spawn(async move { store.reconcile_now().await })
        };

        let first = first.await.expect("first pass").expect("first report");
        assert_eq!(first.created, 1);
        let second = second.await.expect("second pass").expect("second report");
        assert_eq!(second.deleted, 1);

        // The debounced pass from the delete finds nothing left to do
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(
            api.calls(),
            vec![
                Call::List,
                Call::Create("Gin".to_string(), 1.0),
                Call::List,
                Call::Delete(100),
                Call::List,
            ]
        );
        assert!(api.rows.lock().expect("rows lock").is_empty());
        assert_eq!(store.remote_id("1"), None);
        assert!(!slow.overlapped.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_pass_superseded_while_waiting_for_lock() {
        let delay = Duration::from_secs(2);
        let (store, api, slow) = slow_loaded(&[entry("1", "Gin", true, false, 1.0)], delay).await;

        // Holds the sync lock from 0 to 4 s
        let running = {
            let store = store.clone();
            tokio::spawn(async move { store.reconcile_now().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        // Its pass wakes at about 1 s and waits on the lock
        store.adjust_quantity("1", 0.5);
        tokio::time::sleep(Duration::from_millis(1490)).await;
        // Supersedes it; wakes at 2.5 s
        store.adjust_quantity("1", 0.4);

        running.await.expect("pass").expect("report");
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(
            api.calls(),
            vec![
                Call::List,
                Call::Create("Gin".to_string(), 0.4),
                Call::List,
            ]
        );
        assert_eq!(store.remote_id("1"), Some(100));
        assert!(!slow.overlapped.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_from_catalog_creates_remotely_once() {
        let api = FakePantry::new(vec![]);
        let session = Session::anonymous();
        sign_in(&session);
        let store = store(&api, &Arc::new(MemoryStore::new()), &session);

        let id = store
            .add_from_catalog("campari", TargetList::Cabinet, 1.0)
            .expect("added");
        let added = store.get(&id).expect("entry");
        assert_eq!(added.name, "Campari");
        assert!(added.owned && !added.wanted);
        assert!(added.impact_score.is_some_and(|s| (1..=100).contains(&s)));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(store.remote_id(&id), Some(100));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(api.count(|c| matches!(c, Call::Create(..))), 1);

        // Same name again returns the existing entry
        assert_eq!(store.add_from_catalog("Campari ", TargetList::Cabinet, 1.0), Some(id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_to_shopping_list_stays_local() {
        let api = FakePantry::new(vec![]);
        let session = Session::anonymous();
        sign_in(&session);
        let store = store(&api, &Arc::new(MemoryStore::new()), &session);

        let id = store
            .add_from_catalog("Orgeat", TargetList::Shopping, 1.0)
            .expect("added");
        let added = store.get(&id).expect("entry");
        assert!(added.wanted && !added.owned);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(api.count(|c| matches!(c, Call::Create(..))), 0);

        // Adding the same ingredient to the cabinet flags the existing entry
        assert_eq!(store.add_from_catalog("orgeat", TargetList::Cabinet, 0.5), Some(id.clone()));
        assert_eq!(store.entries().len(), 1);
        assert!(store.get(&id).expect("entry").owned);
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_owned_name_to_shopping_flags_existing_entry() {
        let (store, api, _) =
            offline_loaded(&[entry("1", "Campari", true, false, 0.5)], vec![]).await;

        assert_eq!(
            store.add_from_catalog(" campari", TargetList::Shopping, 1.0),
            Some("1".to_string())
        );
        assert_eq!(store.entries().len(), 1);
        let flagged = store.get("1").expect("entry");
        assert!(flagged.owned && flagged.wanted);
        assert_eq!(flagged.quantity, 0.5);

        // Already on the shopping list now
        assert_eq!(
            store.add_from_catalog("Campari", TargetList::Shopping, 1.0),
            Some("1".to_string())
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(api.count(|c| matches!(c, Call::Create(..))), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_visible_filters_and_sorts() {
        let entries = [
            entry("1", "Mint", true, false, 1.0),
            entry("2", "Limoncello", true, false, 1.0),
            entry("3", "Lime", true, false, 1.0),
        ];
        let (store, _, _) = offline_loaded(&entries, vec![]).await;
        let filter = IngredientFilter {
            query: "lim".to_string(),
            ..IngredientFilter::default()
        };
        let names: Vec<String> = store.visible(&filter).into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["Lime", "Limoncello"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_pending_writes() {
        let (store, _, cache) =
            offline_loaded(&[entry("1", "Lime", true, false, 1.0)], vec![]).await;
        tokio::time::sleep(Duration::from_millis(300)).await;

        store.adjust_quantity("1", 0.2);
        store.shutdown();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(cached_entries(&cache)[0].quantity, 1.0);

        // Flushing still writes explicitly
        store.flush().await;
        assert_eq!(cached_entries(&cache)[0].quantity, 0.2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_are_reported() {
        let (tx, mut rx) = mpsc::channel(8);
        let api = FakePantry::new(vec![row(1, "Lime", 1.0)]);
        let session = Session::anonymous();
        sign_in(&session);
        let store = CabinetStore::with_events(
            Arc::clone(&api) as Arc<dyn PantryApi>,
            Arc::new(MemoryStore::new()),
            session,
            StoreOptions::default(),
            tx,
        );

        store.load().await;
        store.reconcile_now().await.expect("reconcile");

        assert_eq!(rx.recv().await, Some(CabinetEvent::Loaded(LoadSource::Remote)));
        assert_eq!(rx.recv().await, Some(CabinetEvent::SyncStarted));
        assert_eq!(
            rx.recv().await,
            Some(CabinetEvent::SyncFinished(ReconcileReport::default()))
        );
    }
}
