//! Cache Module
//!
//! Namespaced expiring cache over a quota-limited backing store, with
//! soonest-expiration-first eviction.

mod adapter;
mod backend;
mod eviction;
pub mod expiration;
mod namespace;
mod options;
mod stats;
mod store;
mod warnings;


// Re-export public types
pub use adapter::{Selection, StorageAdapter, StoreRegistry, PROBE_KEY};
pub use backend::{BackingStore, FileStore, MemoryStore, StoreError, StoreKind};
pub use eviction::EvictionCandidate;
pub use expiration::{Clock, ManualClock, SystemClock};
pub use namespace::{NamespaceCodec, OwnedKey, CACHE_PREFIX, EXPIRATION_SUFFIX};
pub use options::{InitOptions, InitReport};
pub use stats::CacheStats;
pub use store::{Cache, DURABLE_FILE_NAME};
pub use warnings::{WarningHandler, Warnings};

// == Public Constants ==
/// Default backing store quota in bytes (5 MiB).
pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;
