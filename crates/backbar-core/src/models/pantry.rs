use serde::{Deserialize, Serialize};

use super::ingredient::FULL_QUANTITY;

fn full_quantity() -> f64 {
    FULL_QUANTITY
}

/// A row of the remote pantry (`/users/me/pantry`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PantryItem {
    pub id: i64,
    pub ingredient_name: String,
    #[serde(default = "full_quantity")]
    pub quantity: f64,
}

/// Body of `POST /users/me/pantry`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewPantryItem {
    pub ingredient_name: String,
    pub quantity: f64,
}

/// Body of `PUT /users/me/pantry/{id}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PantryQuantityUpdate {
    pub quantity: f64,
}
