//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;
use std::path::PathBuf;

use crate::cache::{StoreKind, DEFAULT_QUOTA_BYTES};

/// Cache and server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Backing store kind requested at startup
    pub storage_kind: StoreKind,
    /// Byte quota of each backing store
    pub store_quota_bytes: usize,
    /// Directory of the durable file store; None keeps it in memory
    pub data_dir: Option<PathBuf>,
    /// Initial bucket
    pub bucket: String,
    /// Whether eviction and dropped-write warnings are emitted
    pub enable_warnings: bool,
    /// HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `STORAGE_KIND` - `durable`, `session` or `synced` (default: durable)
    /// - `STORE_QUOTA_BYTES` - Backing store quota (default: 5 MiB)
    /// - `DATA_DIR` - Durable store directory (default: unset, in memory)
    /// - `CACHE_BUCKET` - Initial bucket (default: empty)
    /// - `ENABLE_WARNINGS` - `true`/`1` to enable warnings (default: false)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            storage_kind: env::var("STORAGE_KIND")
                .map(|v| StoreKind::from_name(&v))
                .unwrap_or(defaults.storage_kind),
            store_quota_bytes: env::var("STORE_QUOTA_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.store_quota_bytes),
            data_dir: env::var("DATA_DIR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            bucket: env::var("CACHE_BUCKET").unwrap_or(defaults.bucket),
            enable_warnings: env::var("ENABLE_WARNINGS")
                .ok()
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.enable_warnings),
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.server_port),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_kind: StoreKind::Durable,
            store_quota_bytes: DEFAULT_QUOTA_BYTES,
            data_dir: None,
            bucket: String::new(),
            enable_warnings: false,
            server_port: 3000,
        }
    }
}
