//! In-process namespaced cache with coarse-grained invalidation.
//!
//! A `NamespaceCache` is one logical cache namespace: a bounded,
//! concurrency-safe map from string keys to shared values. It supports
//! per-key invalidation and a full-namespace `clear()`, which is the
//! dominant policy for callers whose asynchronous writers finish at an
//! unknown time: clearing is idempotent and commutative, so concurrent or
//! repeated clears always converge on the same end state (an empty
//! namespace).
//!
//! Cached values are never authoritative; the caller's backing store is.
//!
//! # Example
//!
//! ```
//! use namespace_cache::NamespaceCache;
//!
//! let cache: NamespaceCache<Vec<u64>> = NamespaceCache::new(1024);
//! cache.insert("feed:42:0:20", vec![1, 2, 3]);
//!
//! assert_eq!(cache.get("feed:42:0:20").as_deref(), Some(&vec![1, 2, 3]));
//!
//! // A write elsewhere invalidates the whole namespace.
//! cache.clear();
//! assert!(cache.get("feed:42:0:20").is_none());
//! ```

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Snapshot of a namespace's counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    pub invalidations: u64,
    pub evictions: u64,
    pub entries: u64,
}

/// One cache namespace: bounded map from string keys to shared values.
pub struct NamespaceCache<V> {
    name: &'static str,
    entries: DashMap<String, Arc<V>>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    insertions: AtomicU64,
    invalidations: AtomicU64,
    evictions: AtomicU64,
}

impl<V: Send + Sync + 'static> NamespaceCache<V> {
    /// Create a namespace holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self::with_name("cache", capacity)
    }

    /// Create a named namespace; the name only shows up in logs.
    pub fn with_name(name: &'static str, capacity: usize) -> Self {
        assert!(capacity > 0, "cache capacity must be positive");
        Self {
            name,
            entries: DashMap::new(),
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            insertions: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Look up a key, recording a hit or miss.
    pub fn get(&self, key: &str) -> Option<Arc<V>> {
        match self.entries.get(key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(namespace = self.name, key, "cache hit");
                Some(Arc::clone(entry.value()))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(namespace = self.name, key, "cache miss");
                None
            }
        }
    }

    /// Insert or replace a value.
    ///
    /// When the namespace is at capacity and the key is new, an arbitrary
    /// existing entry is evicted first. Any bounded policy satisfies the
    /// contract here: entries only have to disappear on invalidation, not
    /// survive until it.
    pub fn insert(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            let victim = self.entries.iter().next().map(|e| e.key().clone());
            if let Some(victim) = victim {
                self.entries.remove(&victim);
                self.evictions.fetch_add(1, Ordering::Relaxed);
                debug!(namespace = self.name, key = %victim, "capacity eviction");
            }
        }
        self.entries.insert(key, Arc::new(value));
        self.insertions.fetch_add(1, Ordering::Relaxed);
    }

    /// Remove a single key. Returns whether it was present.
    pub fn invalidate(&self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.invalidations.fetch_add(1, Ordering::Relaxed);
            debug!(namespace = self.name, key, "invalidated entry");
        }
        removed
    }

    /// Drop every entry in the namespace.
    pub fn clear(&self) {
        let dropped = self.entries.len() as u64;
        self.entries.clear();
        self.invalidations.fetch_add(dropped, Ordering::Relaxed);
        debug!(namespace = self.name, dropped, "cleared namespace");
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            insertions: self.insertions.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: self.entries.len() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_records_hit_and_miss() {
        let cache: NamespaceCache<String> = NamespaceCache::new(16);
        assert!(cache.get("missing").is_none());

        cache.insert("k", "v".to_string());
        assert_eq!(cache.get("k").as_deref(), Some(&"v".to_string()));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.insertions, 1);
    }

    #[test]
    fn test_insert_replaces_existing() {
        let cache: NamespaceCache<u32> = NamespaceCache::new(16);
        cache.insert("k", 1);
        cache.insert("k", 2);
        assert_eq!(cache.get("k").as_deref(), Some(&2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_invalidate_single_key() {
        let cache: NamespaceCache<u32> = NamespaceCache::new(16);
        cache.insert("a", 1);
        cache.insert("b", 2);

        assert!(cache.invalidate("a"));
        assert!(!cache.invalidate("a"));
        assert!(cache.get("a").is_none());
        assert_eq!(cache.get("b").as_deref(), Some(&2));
    }

    #[test]
    fn test_clear_empties_namespace() {
        let cache: NamespaceCache<u32> = NamespaceCache::new(16);
        for i in 0..5 {
            cache.insert(format!("k{}", i), i);
        }
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats().invalidations, 5);

        // Clearing again is a no-op with the same end state.
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_capacity_is_bounded() {
        let cache: NamespaceCache<u32> = NamespaceCache::new(3);
        for i in 0..10 {
            cache.insert(format!("k{}", i), i);
        }
        assert!(cache.len() <= 3);
        assert!(cache.stats().evictions >= 7);
    }

    #[test]
    fn test_existing_key_does_not_evict_at_capacity() {
        let cache: NamespaceCache<u32> = NamespaceCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("a", 3);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_stats_serialization() {
        let cache: NamespaceCache<u32> = NamespaceCache::new(4);
        cache.insert("a", 1);
        cache.get("a");

        let json = serde_json::to_string(&cache.stats()).unwrap();
        let parsed: CacheStats = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.hits, 1);
        assert_eq!(parsed.entries, 1);
    }
}
