//! Quota Cache - a namespaced, expiring key-value cache
//!
//! Layers TTL expiration and bucket namespacing over a capacity-limited
//! backing store, evicting the entries nearest to expiration when the store
//! runs out of space.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;

pub use api::AppState;
pub use cache::Cache;
pub use config::Config;
pub use error::CacheError;
