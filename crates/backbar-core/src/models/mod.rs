//! Data models for the ingredient cabinet.
//!
//! - `IngredientEntry`, `Category`: the client-side cabinet/shopping entries
//! - `PantryItem` and request bodies: rows of the remote pantry API

pub mod ingredient;
pub mod pantry;

pub use ingredient::{clamp_quantity, Category, IngredientEntry, TargetList, FULL_QUANTITY};
pub use pantry::{NewPantryItem, PantryItem, PantryQuantityUpdate};
