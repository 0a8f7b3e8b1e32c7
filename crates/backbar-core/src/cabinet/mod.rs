//! The ingredient cabinet: local-first state with undo, debounced cache
//! persistence and name-based reconciliation against the remote pantry.

pub mod filter;
pub mod reconcile;
pub mod scheduler;
pub mod store;
pub mod undo;

pub use filter::IngredientFilter;
pub use reconcile::{ReconcilePlan, ReconcileReport};
pub use store::{CabinetEvent, CabinetStore, LoadSource, SyncStatus, INGREDIENTS_KEY};
pub use undo::UndoNotice;
