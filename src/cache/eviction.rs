//! Eviction Module
//!
//! Makes room for a write that the backing store rejected for lack of space,
//! by evicting the active bucket's entries nearest to expiration first.

use tracing::{debug, info, warn};

use crate::cache::adapter::StorageAdapter;
use crate::cache::expiration::{self, MAX_EXPIRATION};
use crate::cache::namespace::NamespaceCodec;
use crate::cache::stats::CacheStats;
use crate::cache::warnings::Warnings;
use crate::error::{CacheError, Result};

// == Eviction Candidate ==
/// An owned entry considered for eviction.
#[derive(Debug, Clone, PartialEq)]
pub struct EvictionCandidate {
    /// Logical key
    pub key: String,
    /// Length of the stored value in bytes
    pub size: usize,
    /// Expiration instant, or [`MAX_EXPIRATION`] for entries that never expire
    pub expires_at: f64,
}

/// Lists every value entry of the active bucket with its eviction priority.
///
/// Expiration records are never candidates on their own.
pub fn collect_candidates(adapter: &StorageAdapter, codec: &NamespaceCodec) -> Vec<EvictionCandidate> {
    adapter
        .keys()
        .iter()
        .filter_map(|raw_key| codec.logical_key(raw_key))
        .map(|key| {
            let size = adapter
                .get(&codec.value_key(&key))
                .map(|value| value.len())
                .unwrap_or(0);
            let expires_at = adapter
                .get(&codec.expiration_key(&key))
                .as_deref()
                .and_then(expiration::decode)
                .unwrap_or(MAX_EXPIRATION);

            EvictionCandidate {
                key,
                size,
                expires_at,
            }
        })
        .collect()
}

/// Orders candidates furthest-expiring first, so popping from the tail yields
/// the entry nearest to expiration. Ties keep their enumeration order.
pub fn rank(candidates: &mut [EvictionCandidate]) {
    candidates.sort_by(|a, b| b.expires_at.total_cmp(&a.expires_at));
}

/// Deletes an entry's value and expiration records.
pub fn remove_entry(adapter: &mut StorageAdapter, codec: &NamespaceCodec, key: &str) {
    remove_entries(adapter, codec, &[key.to_string()]);
}

/// Deletes the value and expiration records of every key in one store batch.
pub fn remove_entries(adapter: &mut StorageAdapter, codec: &NamespaceCodec, keys: &[String]) {
    let raw_keys: Vec<String> = keys
        .iter()
        .flat_map(|key| [codec.value_key(key), codec.expiration_key(key)])
        .collect();
    if let Err(err) = adapter.remove_many(&raw_keys) {
        debug!(count = raw_keys.len(), error = %err, "Failed to remove records");
    }
}

// == Write With Eviction ==
/// Writes a serialized value, evicting entries if the store is out of space.
///
/// Returns the number of entries evicted.
pub fn write_with_eviction(
    adapter: &mut StorageAdapter,
    codec: &NamespaceCodec,
    key: &str,
    value: &str,
    warnings: &Warnings,
    stats: &mut CacheStats,
) -> Result<usize> {
    let raw_key = codec.value_key(key);
    write_raw_with_eviction(adapter, codec, &raw_key, key, value, warnings, stats)
}

/// Writes `value` under `raw_key` on behalf of the entry `key`.
///
/// On a capacity failure, entries nearest to expiration are evicted until at
/// least `value.len()` bytes have been released or none remain, then the write
/// is retried once. `key` itself is never a candidate. Evictions are not rolled
/// back if the retry fails.
pub fn write_raw_with_eviction(
    adapter: &mut StorageAdapter,
    codec: &NamespaceCodec,
    raw_key: &str,
    key: &str,
    value: &str,
    warnings: &Warnings,
    stats: &mut CacheStats,
) -> Result<usize> {
    match adapter.set(raw_key, value) {
        Ok(()) => return Ok(0),
        Err(err) if adapter.is_capacity_error(&err) => {
            debug!(key, error = %err, "Backing store full, evicting");
        }
        Err(err) => {
            warnings.emit(&format!("Could not add item with key '{}': {}", key, err));
            return Err(err);
        }
    }

    let mut candidates = collect_candidates(adapter, codec);
    candidates.retain(|candidate| candidate.key != key);
    rank(&mut candidates);

    let mut needed = value.len();
    let mut victims = Vec::new();
    while needed > 0 {
        let Some(candidate) = candidates.pop() else {
            break;
        };
        warnings.emit(&format!(
            "Cache is full, removing item with key '{}'",
            candidate.key
        ));
        needed = needed.saturating_sub(candidate.size);
        victims.push(candidate.key);
    }

    remove_entries(adapter, codec, &victims);
    for _ in &victims {
        stats.record_eviction();
    }
    let evicted = victims.len();
    info!(key, evicted, "Evicted entries to make room");

    match adapter.set(raw_key, value) {
        Ok(()) => Ok(evicted),
        Err(err) => {
            warnings.emit(&format!(
                "Could not add item with key '{}', perhaps it's too big? ({})",
                key, err
            ));
            warn!(key, size = value.len(), error = %err, "Write abandoned after eviction");
            if adapter.is_capacity_error(&err) {
                Err(CacheError::CapacityExceeded(key.to_string()))
            } else {
                Err(err)
            }
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::adapter::StoreRegistry;
    use crate::cache::backend::{MemoryStore, StoreKind};

    fn adapter_with_quota(quota: usize) -> StorageAdapter {
        let registry =
            StoreRegistry::new().with_store(StoreKind::Durable, MemoryStore::with_quota(quota));
        let mut adapter = StorageAdapter::new(registry);
        assert!(adapter.is_supported());
        adapter
    }

    fn put(
        adapter: &mut StorageAdapter,
        codec: &NamespaceCodec,
        key: &str,
        value: &str,
        expires_at: Option<f64>,
    ) {
        adapter.set(&codec.value_key(key), value).unwrap();
        if let Some(at) = expires_at {
            adapter
                .set(&codec.expiration_key(key), &expiration::encode(at))
                .unwrap();
        }
    }

    fn candidate(key: &str, expires_at: f64) -> EvictionCandidate {
        EvictionCandidate {
            key: key.to_string(),
            size: 1,
            expires_at,
        }
    }

    #[test]
    fn test_rank_puts_nearest_expiration_last() {
        let mut candidates = vec![
            candidate("never", MAX_EXPIRATION),
            candidate("soon", 10.0),
            candidate("later", 20.0),
        ];

        rank(&mut candidates);

        let order: Vec<&str> = candidates.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(order, vec!["never", "later", "soon"]);
    }

    #[test]
    fn test_rank_is_stable_for_ties() {
        let mut candidates = vec![candidate("a", 5.0), candidate("b", 5.0)];
        rank(&mut candidates);
        assert_eq!(candidates[0].key, "a");
        assert_eq!(candidates[1].key, "b");
    }

    #[test]
    fn test_collect_candidates_only_owned_values() {
        let mut adapter = adapter_with_quota(4096);
        let codec = NamespaceCodec::default();
        let other = NamespaceCodec::new("other");

        put(&mut adapter, &codec, "a", "\"aa\"", Some(100.0));
        put(&mut adapter, &codec, "b", "\"bbbb\"", None);
        put(&mut adapter, &other, "c", "\"c\"", Some(1.0));
        adapter.set("outside", "x").unwrap();

        let mut candidates = collect_candidates(&adapter, &codec);
        candidates.sort_by(|x, y| x.key.cmp(&y.key));

        assert_eq!(
            candidates,
            vec![
                EvictionCandidate {
                    key: "a".to_string(),
                    size: 4,
                    expires_at: 100.0
                },
                EvictionCandidate {
                    key: "b".to_string(),
                    size: 6,
                    expires_at: MAX_EXPIRATION
                },
            ]
        );
    }

    #[test]
    fn test_undecodable_expiration_ranks_as_never() {
        let mut adapter = adapter_with_quota(4096);
        let codec = NamespaceCodec::default();
        adapter.set(&codec.value_key("k"), "1").unwrap();
        adapter.set(&codec.expiration_key("k"), "garbage").unwrap();

        let candidates = collect_candidates(&adapter, &codec);
        assert_eq!(candidates[0].expires_at, MAX_EXPIRATION);
    }

    #[test]
    fn test_write_without_pressure_evicts_nothing() {
        let mut adapter = adapter_with_quota(4096);
        let codec = NamespaceCodec::default();
        let mut stats = CacheStats::new();

        let evicted =
            write_with_eviction(&mut adapter, &codec, "k", "\"v\"", &Warnings::new(), &mut stats)
                .unwrap();

        assert_eq!(evicted, 0);
        assert_eq!(stats.evictions, 0);
        assert_eq!(adapter.get(&codec.value_key("k")), Some("\"v\"".to_string()));
    }

    #[test]
    fn test_evicts_soonest_expiring_first() {
        // value record: 10 (key) + 100 (value); expiration record: 26 + 4
        // => 140 bytes per entry, 420 for three.
        let mut adapter = adapter_with_quota(450);
        let codec = NamespaceCodec::default();
        let value = "v".repeat(100);

        put(&mut adapter, &codec, "k3", &value, Some(1003.0));
        put(&mut adapter, &codec, "k1", &value, Some(1001.0));
        put(&mut adapter, &codec, "k2", &value, Some(1002.0));

        // Needs 200 bytes: two entries' worth
        let big = "b".repeat(200);
        let mut stats = CacheStats::new();
        let evicted =
            write_with_eviction(&mut adapter, &codec, "big", &big, &Warnings::new(), &mut stats)
                .unwrap();

        assert_eq!(evicted, 2);
        assert_eq!(stats.evictions, 2);
        assert_eq!(adapter.get(&codec.value_key("k1")), None);
        assert_eq!(adapter.get(&codec.expiration_key("k1")), None);
        assert_eq!(adapter.get(&codec.value_key("k2")), None);
        assert_eq!(adapter.get(&codec.value_key("k3")), Some(value));
        assert_eq!(adapter.get(&codec.value_key("big")), Some(big));
    }

    #[test]
    fn test_eviction_leaves_other_buckets_and_foreign_keys() {
        let mut adapter = adapter_with_quota(120);
        let codec = NamespaceCodec::default();
        let other = NamespaceCodec::new("other");

        adapter.set("outside", "keep").unwrap();
        put(&mut adapter, &other, "x", "keep", None);
        put(&mut adapter, &codec, "mine", &"m".repeat(40), Some(5.0));

        let mut stats = CacheStats::new();
        write_with_eviction(
            &mut adapter,
            &codec,
            "new",
            &"n".repeat(40),
            &Warnings::new(),
            &mut stats,
        )
        .unwrap();

        assert_eq!(adapter.get("outside"), Some("keep".to_string()));
        assert_eq!(adapter.get(&other.value_key("x")), Some("keep".to_string()));
        assert_eq!(adapter.get(&codec.value_key("mine")), None);
    }

    #[test]
    fn test_too_big_value_is_abandoned_after_eviction() {
        let mut adapter = adapter_with_quota(64);
        let codec = NamespaceCodec::default();
        put(&mut adapter, &codec, "small", "s", None);

        let mut stats = CacheStats::new();
        let result = write_with_eviction(
            &mut adapter,
            &codec,
            "huge",
            &"h".repeat(100),
            &Warnings::new(),
            &mut stats,
        );

        assert!(matches!(result, Err(CacheError::CapacityExceeded(_))));
        // Not transactional: the eviction stands
        assert_eq!(adapter.get(&codec.value_key("small")), None);
        assert_eq!(adapter.get(&codec.value_key("huge")), None);
        assert_eq!(stats.evictions, 1);
    }

    #[test]
    fn test_raw_write_never_evicts_its_own_entry() {
        let mut adapter = adapter_with_quota(70);
        let codec = NamespaceCodec::default();
        put(&mut adapter, &codec, "own", &"o".repeat(20), None);
        put(&mut adapter, &codec, "other", &"x".repeat(20), None);

        // Both rank as never expiring and "own" enumerates last, so it would
        // be popped first were it a candidate. 27 + 4 bytes fit once "other"
        // is gone.
        let mut stats = CacheStats::new();
        let evicted = write_raw_with_eviction(
            &mut adapter,
            &codec,
            &codec.expiration_key("own"),
            "own",
            "1005",
            &Warnings::new(),
            &mut stats,
        )
        .unwrap();

        assert_eq!(evicted, 1);
        assert_eq!(adapter.get(&codec.value_key("other")), None);
        assert_eq!(adapter.get(&codec.value_key("own")), Some("o".repeat(20)));
        assert_eq!(
            adapter.get(&codec.expiration_key("own")),
            Some("1005".to_string())
        );
    }
}
