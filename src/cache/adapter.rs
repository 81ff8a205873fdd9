//! Storage Adapter Module
//!
//! Selects one backing store out of a registry, probes it once, and exposes a
//! uniform raw-key interface over whichever store is in effect.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info};

use crate::cache::backend::{BackingStore, MemoryStore, StoreKind};
use crate::error::{CacheError, Result};

// == Constants ==
/// Raw key written and deleted by the capability probe.
pub const PROBE_KEY: &str = "__quota_cache_probe__";

// == Store Registry ==
/// The backing stores available to an adapter, one per kind.
#[derive(Default)]
pub struct StoreRegistry {
    stores: HashMap<StoreKind, Box<dyn BackingStore>>,
}

impl StoreRegistry {
    /// Creates an empty registry. Nothing is usable until a store is added.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with in-memory durable and session stores of `quota` bytes each.
    pub fn in_memory(quota: usize) -> Self {
        Self::new()
            .with_store(StoreKind::Durable, MemoryStore::with_quota(quota))
            .with_store(StoreKind::Session, MemoryStore::with_quota(quota))
    }

    pub fn with_store(mut self, kind: StoreKind, store: impl BackingStore + 'static) -> Self {
        self.register(kind, Box::new(store));
        self
    }

    /// Adds or replaces the store for `kind`.
    pub fn register(&mut self, kind: StoreKind, store: Box<dyn BackingStore>) {
        self.stores.insert(kind, store);
    }

    pub fn contains(&self, kind: StoreKind) -> bool {
        self.stores.contains_key(&kind)
    }

    fn get(&self, kind: StoreKind) -> Option<&dyn BackingStore> {
        self.stores.get(&kind).map(|store| &**store)
    }

    fn get_mut(&mut self, kind: StoreKind) -> Option<&mut Box<dyn BackingStore>> {
        self.stores.get_mut(&kind)
    }
}

impl std::fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<&str> = self.stores.keys().map(|k| k.as_str()).collect();
        kinds.sort_unstable();
        f.debug_struct("StoreRegistry").field("kinds", &kinds).finish()
    }
}

// == Selection ==
/// Outcome of selecting a store kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    /// Whether the selected store passed its probe
    pub supported: bool,
    /// The kind actually in effect after fallback
    pub using_kind: StoreKind,
}

// == Storage Adapter ==
/// Capability-checked handle to the selected backing store.
///
/// The probe runs lazily on first use and its result is memoized until
/// [`select`](Self::select) is called again.
#[derive(Debug)]
pub struct StorageAdapter {
    registry: StoreRegistry,
    requested: StoreKind,
    using: StoreKind,
    active: Option<StoreKind>,
    supported: Option<bool>,
}

impl StorageAdapter {
    // == Constructor ==
    /// Creates an adapter that will use the durable store once probed.
    pub fn new(registry: StoreRegistry) -> Self {
        Self {
            registry,
            requested: StoreKind::Durable,
            using: StoreKind::Durable,
            active: None,
            supported: None,
        }
    }

    // == Select ==
    /// Requests a store kind, discarding any memoized probe, and probes it.
    ///
    /// Kinds without a registered store fall back to `Durable`.
    pub fn select(&mut self, kind: StoreKind) -> Selection {
        self.requested = kind;
        self.supported = None;
        self.active = None;

        let supported = self.is_supported();
        Selection {
            supported,
            using_kind: self.using,
        }
    }

    /// Kind in effect after fallback.
    pub fn using_kind(&self) -> StoreKind {
        self.using
    }

    pub fn requested_kind(&self) -> StoreKind {
        self.requested
    }

    // == Is Supported ==
    /// Whether the selected store is usable, probing it on first call.
    pub fn is_supported(&mut self) -> bool {
        if let Some(supported) = self.supported {
            return supported;
        }

        let supported = self.probe();
        self.supported = Some(supported);
        supported
    }

    /// Memoized probe result without probing. None until the first probe.
    pub fn probed(&self) -> Option<bool> {
        self.supported
    }

    fn probe(&mut self) -> bool {
        let kind = if self.registry.contains(self.requested) {
            self.requested
        } else {
            if self.requested != StoreKind::Durable {
                info!(
                    requested = %self.requested,
                    "Requested store kind unavailable, falling back to durable"
                );
            }
            StoreKind::Durable
        };
        self.using = kind;

        let usable = match self.registry.get_mut(kind) {
            None => false,
            Some(store) => match store.set(PROBE_KEY, PROBE_KEY) {
                Ok(()) => store.remove(PROBE_KEY).is_ok(),
                // A full store still counts as usable
                Err(err) => store.is_capacity_error(&err) && !store.is_empty(),
            },
        };

        self.active = usable.then_some(kind);
        debug!(kind = %kind, usable, "Probed backing store");
        usable
    }

    // == Raw Access ==
    fn store(&self) -> Option<&dyn BackingStore> {
        self.active.and_then(|kind| self.registry.get(kind))
    }

    fn store_mut(&mut self) -> Result<&mut Box<dyn BackingStore>> {
        match self.active {
            Some(kind) => self
                .registry
                .get_mut(kind)
                .ok_or(CacheError::StoreUnavailable),
            None => Err(CacheError::StoreUnavailable),
        }
    }

    /// Reads a raw key from the active store.
    pub fn get(&self, raw_key: &str) -> Option<String> {
        self.store()?.get(raw_key)
    }

    /// Writes a raw key, removing any previous value first so its space is
    /// released before the new value is measured against the quota.
    pub fn set(&mut self, raw_key: &str, value: &str) -> Result<()> {
        let store = self.store_mut()?;
        store.remove(raw_key)?;
        store.set(raw_key, value)?;
        Ok(())
    }

    pub fn remove(&mut self, raw_key: &str) -> Result<()> {
        self.store_mut()?.remove(raw_key)?;
        Ok(())
    }

    /// Removes several raw keys in one store operation.
    pub fn remove_many(&mut self, raw_keys: &[String]) -> Result<()> {
        if raw_keys.is_empty() {
            return Ok(());
        }
        self.store_mut()?.remove_many(raw_keys)?;
        Ok(())
    }

    /// Number of raw keys in the active store (all owners).
    pub fn len(&self) -> usize {
        self.store().map(|store| store.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn key_at(&self, index: usize) -> Option<String> {
        self.store()?.key_at(index)
    }

    /// Snapshot of every raw key, taken before any caller starts deleting.
    pub fn keys(&self) -> Vec<String> {
        self.store().map(|store| store.keys()).unwrap_or_default()
    }

    /// Whether `err` is the active store's out-of-space condition.
    pub fn is_capacity_error(&self, err: &CacheError) -> bool {
        match (err, self.store()) {
            (CacheError::Store(inner), Some(store)) => store.is_capacity_error(inner),
            _ => false,
        }
    }
}
