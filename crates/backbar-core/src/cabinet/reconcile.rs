//! Planning of a reconciliation pass between local cabinet entries and the
//! remote pantry.
//!
//! Local entries are matched to remote rows by normalized, lowercased display
//! name, not by id. A locally renamed bottle therefore shows up remotely as
//! the old row deleted and a new row created.

use std::collections::{HashMap, HashSet};

use crate::models::{IngredientEntry, PantryItem};
use crate::normalize::match_key;

/// Quantities closer than this are considered in sync.
pub const QUANTITY_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedUpdate {
    pub local_id: String,
    pub remote_id: i64,
    pub quantity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedCreate {
    pub local_id: String,
    pub name: String,
    pub quantity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedDelete {
    pub remote_id: i64,
    /// Mapping to drop once the delete succeeds
    pub local_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcilePlan {
    /// Local entries matched to an existing remote row
    pub links: Vec<(String, i64)>,
    pub updates: Vec<PlannedUpdate>,
    pub creates: Vec<PlannedCreate>,
    pub deletes: Vec<PlannedDelete>,
    /// Stale mappings dropped without a remote call
    pub forget: Vec<String>,
}

impl ReconcilePlan {
    pub fn is_noop(&self) -> bool {
        self.updates.is_empty() && self.creates.is_empty() && self.deletes.is_empty()
    }
}

/// Outcome of an executed pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub failed: usize,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }

    pub fn changes(&self) -> usize {
        self.created + self.updated + self.deleted
    }
}

/// Diff local entries against remote rows.
///
/// `remote_ids` maps local ids to the remote rows they were last synced with.
pub fn plan(
    entries: &[IngredientEntry],
    remote: &[PantryItem],
    remote_ids: &HashMap<String, i64>,
) -> ReconcilePlan {
    let mut by_name: HashMap<String, &PantryItem> = HashMap::new();
    for row in remote {
        by_name.entry(match_key(&row.ingredient_name)).or_insert(row);
    }

    let mut plan = ReconcilePlan::default();
    // Remote rows some owned local entry currently corresponds to
    let mut claimed: HashSet<i64> = HashSet::new();
    // Previously mapped rows that an owned entry moved away from (renames)
    let mut abandoned: Vec<(String, i64)> = Vec::new();

    for entry in entries.iter().filter(|e| e.owned) {
        let previous = remote_ids.get(&entry.id).copied();
        match by_name.get(&match_key(&entry.name)) {
            Some(row) => {
                claimed.insert(row.id);
                plan.links.push((entry.id.clone(), row.id));
                if (row.quantity - entry.quantity).abs() > QUANTITY_TOLERANCE {
                    plan.updates.push(PlannedUpdate {
                        local_id: entry.id.clone(),
                        remote_id: row.id,
                        quantity: entry.quantity,
                    });
                }
                if let Some(prev) = previous.filter(|p| *p != row.id) {
                    abandoned.push((entry.id.clone(), prev));
                }
            }
            None => {
                plan.creates.push(PlannedCreate {
                    local_id: entry.id.clone(),
                    name: entry.name.clone(),
                    quantity: entry.quantity,
                });
                if let Some(prev) = previous {
                    abandoned.push((entry.id.clone(), prev));
                }
            }
        }
    }

    let owned: HashSet<&str> = entries
        .iter()
        .filter(|e| e.owned)
        .map(|e| e.id.as_str())
        .collect();

    let mut scheduled: HashSet<i64> = HashSet::new();

    // Mapping is replaced by the link/create; only the row goes away
    for (_, remote_id) in abandoned {
        if !claimed.contains(&remote_id) && scheduled.insert(remote_id) {
            plan.deletes.push(PlannedDelete {
                remote_id,
                local_id: None,
            });
        }
    }

    let mut stale: Vec<(&String, &i64)> = remote_ids
        .iter()
        .filter(|(local_id, _)| !owned.contains(local_id.as_str()))
        .collect();
    stale.sort();
    for (local_id, remote_id) in stale {
        if claimed.contains(remote_id) || !scheduled.insert(*remote_id) {
            // Row still backs another entry or is already being deleted
            plan.forget.push(local_id.clone());
        } else {
            plan.deletes.push(PlannedDelete {
                remote_id: *remote_id,
                local_id: Some(local_id.clone()),
            });
        }
    }

    plan
}
