//! Single-slot undo for destructive cabinet actions.
//!
//! Each undoable action records the inverse command that restores the prior
//! state. Only the most recent action can be undone, and only within the
//! undo window.

use std::time::Duration;

use tokio::time::Instant;

use crate::models::IngredientEntry;

/// Inverse of an undoable action.
#[derive(Debug, Clone, PartialEq)]
pub enum UndoCommand {
    /// Put a deleted entry back at its original index
    Reinsert { index: usize, entry: IngredientEntry },
    SetWanted { id: String, wanted: bool },
    SetOwned { id: String, owned: bool },
    /// Revert a rename; image and category stay as they are
    RestoreName { id: String, name: String },
    RestorePurchase {
        id: String,
        wanted: bool,
        owned: bool,
        quantity: f64,
    },
}

#[derive(Debug, Clone)]
struct PendingUndo {
    command: UndoCommand,
    label: String,
    expires_at: Instant,
}

/// What the UI shows while an action can still be undone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoNotice {
    pub label: String,
    pub remaining: Duration,
}

#[derive(Debug)]
pub struct UndoSlot {
    window: Duration,
    pending: Option<PendingUndo>,
}

impl UndoSlot {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    /// Record a new undoable action, replacing any earlier one.
    pub fn record(&mut self, command: UndoCommand, label: impl Into<String>) {
        self.pending = Some(PendingUndo {
            command,
            label: label.into(),
            expires_at: Instant::now() + self.window,
        });
    }

    /// Take the pending command if it has not expired. The slot is empty afterwards.
    pub fn take(&mut self) -> Option<UndoCommand> {
        let pending = self.pending.take()?;
        if Instant::now() < pending.expires_at {
            Some(pending.command)
        } else {
            None
        }
    }

    pub fn notice(&self) -> Option<UndoNotice> {
        let pending = self.pending.as_ref()?;
        let remaining = pending.expires_at.checked_duration_since(Instant::now())?;
        if remaining.is_zero() {
            return None;
        }
        Some(UndoNotice {
            label: pending.label.clone(),
            remaining,
        })
    }

    /// Drop the pending command once its window has passed.
    pub fn expire(&mut self) {
        if self
            .pending
            .as_ref()
            .is_some_and(|p| Instant::now() >= p.expires_at)
        {
            self.pending = None;
        }
    }

    pub fn clear(&mut self) {
        self.pending = None;
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_none()
    }
}
