//! Cache Module
//!
//! The public cache: namespaced, expiring entries over a quota-limited
//! backing store, with eviction by soonest expiration when the store is full.

use std::collections::HashSet;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::cache::adapter::{StorageAdapter, StoreRegistry};
use crate::cache::backend::{FileStore, MemoryStore, StoreKind};
use crate::cache::eviction::{self, remove_entry};
use crate::cache::expiration::{self, Clock, SystemClock};
use crate::cache::namespace::{NamespaceCodec, OwnedKey};
use crate::cache::options::{InitOptions, InitReport};
use crate::cache::stats::CacheStats;
use crate::cache::warnings::{WarningHandler, Warnings};
use crate::config::Config;
use crate::error::{CacheError, Result};

/// File name of the durable store inside `DATA_DIR`.
pub const DURABLE_FILE_NAME: &str = "durable.json";

// == Cache ==
/// Namespaced expiring cache.
///
/// Storage failures never escape: writes that cannot happen are dropped and
/// reads that cannot happen are misses.
#[derive(Debug)]
pub struct Cache {
    adapter: StorageAdapter,
    codec: NamespaceCodec,
    clock: Arc<dyn Clock>,
    warnings: Warnings,
    stats: CacheStats,
}

impl Cache {
    // == Constructor ==
    /// Creates a cache over `registry` using the wall clock.
    pub fn new(registry: StoreRegistry) -> Self {
        Self::with_clock(registry, Arc::new(SystemClock))
    }

    /// Creates a cache with an explicit time source.
    pub fn with_clock(registry: StoreRegistry, clock: Arc<dyn Clock>) -> Self {
        Self {
            adapter: StorageAdapter::new(registry),
            codec: NamespaceCodec::default(),
            clock,
            warnings: Warnings::new(),
            stats: CacheStats::new(),
        }
    }

    /// Builds the registry and initial selection from configuration.
    ///
    /// With a data directory the durable store is file-backed; otherwise it
    /// lives in memory like the session store.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut registry = StoreRegistry::new();
        match &config.data_dir {
            Some(dir) => {
                let store = FileStore::open(dir.join(DURABLE_FILE_NAME), config.store_quota_bytes)?;
                info!(path = %store.path().display(), "Opened durable file store");
                registry.register(StoreKind::Durable, Box::new(store));
            }
            None => registry.register(
                StoreKind::Durable,
                Box::new(MemoryStore::with_quota(config.store_quota_bytes)),
            ),
        }
        registry.register(
            StoreKind::Session,
            Box::new(MemoryStore::with_quota(config.store_quota_bytes)),
        );

        let mut cache = Self::new(registry);
        let selection = cache.adapter.select(config.storage_kind);
        info!(
            supported = selection.supported,
            using = %selection.using_kind,
            "Backing store selected"
        );
        cache.set_bucket(&config.bucket);
        cache.enable_warnings(config.enable_warnings);
        Ok(cache)
    }

    // == Init ==
    /// Applies init options. A requested store kind forces a fresh probe.
    pub fn init(&mut self, options: InitOptions) -> InitReport {
        match options.storage_kind {
            Some(name) => {
                let selection = self.adapter.select(StoreKind::from_name(&name));
                InitReport {
                    supported: Some(selection.supported),
                    using_kind: Some(selection.using_kind),
                }
            }
            None => InitReport::default(),
        }
    }

    /// Applies init options given as a JSON object.
    ///
    /// Unrecognized keys fail with [`CacheError::UnknownOption`].
    pub fn init_from_json(&mut self, options: Value) -> Result<InitReport> {
        let options = InitOptions::from_json(options)?;
        Ok(self.init(options))
    }

    // == Set ==
    /// Stores `value` under `key`, expiring after `ttl_minutes` if positive.
    ///
    /// Returns whether the value was stored. Failures are logged and absorbed.
    pub fn set<T: Serialize + ?Sized>(
        &mut self,
        key: &str,
        value: &T,
        ttl_minutes: Option<f64>,
    ) -> bool {
        match self.try_set(key, value, ttl_minutes) {
            Ok(()) => true,
            Err(err) => {
                debug!(key, error = %err, "Write dropped");
                self.stats.record_dropped_write();
                false
            }
        }
    }

    /// Like [`set`](Self::set) but reports why a write was dropped.
    pub fn try_set<T: Serialize + ?Sized>(
        &mut self,
        key: &str,
        value: &T,
        ttl_minutes: Option<f64>,
    ) -> Result<()> {
        if !self.adapter.is_supported() {
            return Err(CacheError::StoreUnavailable);
        }
        if NamespaceCodec::is_reserved(key) {
            return Err(CacheError::InvalidKey(key.to_string()));
        }

        let serialized =
            serde_json::to_string(value).map_err(|e| CacheError::Serialization(e.to_string()))?;

        eviction::write_with_eviction(
            &mut self.adapter,
            &self.codec,
            key,
            &serialized,
            &self.warnings,
            &mut self.stats,
        )?;

        let expiration_key = self.codec.expiration_key(key);
        match expiration::expires_at(self.clock.now_minutes(), ttl_minutes) {
            Some(at) => {
                let written = eviction::write_raw_with_eviction(
                    &mut self.adapter,
                    &self.codec,
                    &expiration_key,
                    key,
                    &expiration::encode(at),
                    &self.warnings,
                    &mut self.stats,
                );
                if let Err(err) = written {
                    // Without its expiration record the entry would never expire
                    self.warnings.emit(&format!(
                        "Could not store expiration for key '{}': {}",
                        key, err
                    ));
                    remove_entry(&mut self.adapter, &self.codec, key);
                    return Err(err);
                }
            }
            None => self.adapter.remove(&expiration_key)?,
        }

        Ok(())
    }

    // == Get ==
    /// Returns the value under `key` unless it is absent or expired.
    ///
    /// Expired entries are deleted on the way. Values that are not valid JSON
    /// come back as the raw stored string.
    pub fn get(&mut self, key: &str) -> Option<Value> {
        if !self.adapter.is_supported() || NamespaceCodec::is_reserved(key) {
            return None;
        }

        if self.remove_if_expired(key) {
            self.stats.record_miss();
            return None;
        }

        let Some(raw) = self.adapter.get(&self.codec.value_key(key)) else {
            self.stats.record_miss();
            return None;
        };
        self.stats.record_hit();

        match serde_json::from_str::<Value>(&raw) {
            Ok(value) => Some(value),
            Err(_) => Some(Value::String(raw)),
        }
    }

    /// Returns the value under `key` decoded as `T`.
    pub fn get_as<T: DeserializeOwned>(&mut self, key: &str) -> Option<T> {
        self.get(key)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    // == Remove ==
    /// Deletes `key` and its expiration record. Absent keys are fine.
    pub fn remove(&mut self, key: &str) {
        if !self.adapter.is_supported() {
            return;
        }
        remove_entry(&mut self.adapter, &self.codec, key);
    }

    // == Flush ==
    /// Deletes every record in the active bucket. Returns the number of
    /// entries removed.
    pub fn flush(&mut self) -> usize {
        if !self.adapter.is_supported() {
            return 0;
        }

        let owned: Vec<(String, OwnedKey)> = self
            .adapter
            .keys()
            .into_iter()
            .filter_map(|raw_key| self.codec.classify(&raw_key).map(|owned| (raw_key, owned)))
            .collect();
        let removed = owned
            .iter()
            .filter(|(_, owned)| matches!(owned, OwnedKey::Value(_)))
            .count();
        let raw_keys: Vec<String> = owned.into_iter().map(|(raw_key, _)| raw_key).collect();
        if let Err(err) = self.adapter.remove_many(&raw_keys) {
            debug!(count = raw_keys.len(), error = %err, "Failed to flush records");
        }

        info!(bucket = self.codec.bucket(), removed, "Flushed bucket");
        removed
    }

    // == Flush Expired ==
    /// Deletes expired entries of the active bucket and orphaned expiration
    /// records. Returns the number of expired entries removed.
    pub fn flush_expired(&mut self) -> usize {
        if !self.adapter.is_supported() {
            return 0;
        }

        let mut values = Vec::new();
        let mut expirations = Vec::new();
        for raw_key in self.adapter.keys() {
            match self.codec.classify(&raw_key) {
                Some(OwnedKey::Value(key)) => values.push(key),
                Some(OwnedKey::Expiration(key)) => expirations.push(key),
                None => {}
            }
        }

        let now = self.clock.now_minutes();
        let mut doomed = Vec::new();
        let mut removed = 0;
        for key in &values {
            let expiration_key = self.codec.expiration_key(key);
            let record = self.adapter.get(&expiration_key);
            if expiration::is_expired(record.as_deref(), now) {
                doomed.push(self.codec.value_key(key));
                doomed.push(expiration_key);
                self.stats.record_expiration();
                removed += 1;
            }
        }

        let live: HashSet<&String> = values.iter().collect();
        doomed.extend(
            expirations
                .iter()
                .filter(|key| !live.contains(key))
                .map(|key| self.codec.expiration_key(key)),
        );
        if let Err(err) = self.adapter.remove_many(&doomed) {
            debug!(count = doomed.len(), error = %err, "Failed to remove expired records");
        }

        if removed > 0 {
            info!(bucket = self.codec.bucket(), removed, "Flushed expired entries");
        }
        removed
    }

    fn remove_if_expired(&mut self, key: &str) -> bool {
        let record = self.adapter.get(&self.codec.expiration_key(key));
        if !expiration::is_expired(record.as_deref(), self.clock.now_minutes()) {
            return false;
        }

        remove_entry(&mut self.adapter, &self.codec, key);
        self.stats.record_expiration();
        true
    }

    // == Supported ==
    /// Whether the selected backing store is usable.
    pub fn supported(&mut self) -> bool {
        self.adapter.is_supported()
    }

    // == Buckets ==
    /// Switches the active bucket for all following operations.
    pub fn set_bucket(&mut self, name: &str) {
        self.codec = NamespaceCodec::new(name);
    }

    /// Returns to the default (empty) bucket.
    pub fn reset_bucket(&mut self) {
        self.codec = NamespaceCodec::default();
    }

    pub fn bucket(&self) -> &str {
        self.codec.bucket()
    }

    // == Warnings ==
    pub fn enable_warnings(&mut self, enabled: bool) {
        self.warnings.set_enabled(enabled);
    }

    /// Routes warnings to `handler` in addition to the log.
    pub fn set_warning_handler(&mut self, handler: WarningHandler) {
        self.warnings.set_handler(handler);
    }

    // == Stats ==
    /// Returns current statistics, with the active bucket's entry count.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.len());
        stats
    }

    /// Number of entries in the active bucket, expired or not.
    pub fn len(&self) -> usize {
        self.adapter
            .keys()
            .iter()
            .filter(|raw_key| self.codec.logical_key(raw_key).is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw access to the backing store shared with other owners.
    pub fn adapter(&self) -> &StorageAdapter {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut StorageAdapter {
        &mut self.adapter
    }
}
