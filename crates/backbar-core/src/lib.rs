//! Core library for backbar.
//!
//! Backbar keeps a home bar's ingredient cabinet and shopping list in sync
//! with the remote pantry service while working fully offline. This crate
//! holds everything except the terminal front-end:
//!
//! - `api`: REST client for the pantry endpoints
//! - `auth`: explicit session context and session persistence
//! - `cache`: local key-value storage used as an offline cache
//! - `cabinet`: the `CabinetStore` with undo, debounced persistence and
//!   remote reconciliation
//! - `catalog`: known ingredient names for the "add" search
//! - `config`: application configuration
//! - `models`: ingredient and pantry data types
//! - `normalize`: ingredient name normalization and image URLs

pub mod api;
pub mod auth;
pub mod cabinet;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod models;
pub mod normalize;
pub mod utils;
