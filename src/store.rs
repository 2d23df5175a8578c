//! Shared state store
//!
//! The two lookup maps every task in the process shares: the response cache
//! (resource identifier -> cached artifact path) and the blocklist (exact
//! resource identifiers the proxy refuses to forward). Cloning the store
//! clones handles to the same underlying maps.

use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Shared cache and blocklist maps with safe concurrent access
///
/// Every operation is individually atomic: a lookup that races an insert on
/// the same key observes either the old or the new value, never a torn one.
/// Racing inserts on the same key resolve to last-write-wins.
#[derive(Debug, Clone, Default)]
pub struct SharedStore {
    /// Resource identifier -> path of the cached artifact on durable storage
    cache: Arc<DashMap<String, PathBuf>>,
    /// Blocked resource identifiers, stored key == value (set semantics)
    blocked: Arc<DashMap<String, String>>,
}

impl SharedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the cached artifact for a resource identifier
    pub fn lookup(&self, key: &str) -> Option<PathBuf> {
        self.cache.get(key).map(|entry| entry.value().clone())
    }

    /// Insert a cache entry, replacing any existing entry for the key
    pub fn insert(&self, key: String, artifact: PathBuf) {
        self.cache.insert(key, artifact);
    }

    /// True iff the key exactly equals a prior blocklist entry.
    /// No wildcard, prefix or substring matching.
    pub fn is_blocked(&self, key: &str) -> bool {
        self.blocked.contains_key(key)
    }

    /// Add a key to the blocklist (idempotent)
    pub fn add_blocked(&self, key: String) {
        self.blocked.insert(key.clone(), key);
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn blocked_len(&self) -> usize {
        self.blocked.len()
    }

    /// All cache keys, for the operator console
    pub fn cache_keys(&self) -> Vec<String> {
        self.cache.iter().map(|e| e.key().clone()).collect()
    }

    /// All blocklist keys, for the operator console
    pub fn blocked_keys(&self) -> Vec<String> {
        self.blocked.iter().map(|e| e.key().clone()).collect()
    }

    /// Snapshot of the cache as string records for persistence.
    /// Artifact paths are stored lossily as UTF-8.
    pub fn cache_records(&self) -> Vec<(String, String)> {
        self.cache
            .iter()
            .map(|e| (e.key().clone(), e.value().to_string_lossy().into_owned()))
            .collect()
    }

    /// Snapshot of the blocklist as string records for persistence
    pub fn blocklist_records(&self) -> Vec<(String, String)> {
        self.blocked
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    /// Bulk-initialize the cache from persisted records (startup only)
    pub fn load_cache_records(&self, records: Vec<(String, String)>) {
        for (key, artifact) in records {
            self.cache.insert(key, PathBuf::from(artifact));
        }
    }

    /// Bulk-initialize the blocklist from persisted records (startup only)
    pub fn load_blocklist_records(&self, records: Vec<(String, String)>) {
        for (key, value) in records {
            self.blocked.insert(key, value);
        }
    }
}
