//! REST API client module for the remote pantry.
//!
//! `PantryApi` is the seam the cabinet store reconciles against;
//! `ApiClient` implements it over HTTP with bearer-token authentication
//! taken from the shared `Session`.

pub mod client;
pub mod error;

use async_trait::async_trait;

use crate::models::PantryItem;

pub use client::ApiClient;
pub use error::ApiError;

/// Remote pantry operations (`/users/me/pantry`).
#[async_trait]
pub trait PantryApi: Send + Sync {
    async fn list_pantry(&self) -> Result<Vec<PantryItem>, ApiError>;
    async fn create_pantry_item(&self, name: &str, quantity: f64) -> Result<PantryItem, ApiError>;
    async fn update_pantry_item(&self, id: i64, quantity: f64) -> Result<(), ApiError>;
    async fn delete_pantry_item(&self, id: i64) -> Result<(), ApiError>;
}
