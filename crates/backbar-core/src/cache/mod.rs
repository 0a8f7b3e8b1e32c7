//! Local caching module for offline data access.
//!
//! The cabinet mirrors its entries into a string-keyed store of JSON blobs.
//! `CacheManager` keeps one JSON file per key in the per-user cache
//! directory; `MemoryStore` keeps them in memory.

pub mod manager;
pub mod store;

pub use manager::CacheManager;
pub use store::{KeyValueStore, MemoryStore};
