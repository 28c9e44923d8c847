//! Keyed in-memory caches with per-entry TTL
//!
//! Entries expire lazily when read; there is no background sweeper. When a
//! cache is full the entry with the oldest last access is evicted, which is
//! exactly the LRU policy `lru::LruCache` implements.

use lru::LruCache;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::trace;

use crate::config::CacheConfig;
use crate::models::Manifest;
use crate::utils::regex_filter::CompiledPattern;

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// Bounded LRU cache whose entries carry their own expiry
pub struct TtlCache<K, V> {
    name: &'static str,
    default_ttl: Duration,
    entries: Mutex<LruCache<K, CacheEntry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    pub fn new(name: &'static str, capacity: usize, default_ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            name,
            default_ttl,
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    // A poisoned lock only means another thread panicked mid-operation; every
    // operation leaves the map consistent, so keep serving.
    fn lock(&self) -> MutexGuard<'_, LruCache<K, CacheEntry<V>>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Get a live value, dropping it if it has expired
    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.lock();
        let expired = match entries.peek(key) {
            Some(entry) => entry.expires_at <= Instant::now(),
            None => return None,
        };

        if expired {
            entries.pop(key);
            trace!(cache = self.name, "expired entry evicted on read");
            return None;
        }

        entries.get(key).map(|entry| entry.value.clone())
    }

    /// Insert with the cache's default TTL
    pub fn insert(&self, key: K, value: V) {
        self.insert_with_ttl(key, value, self.default_ttl);
    }

    pub fn insert_with_ttl(&self, key: K, value: V, ttl: Duration) {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        if self.lock().push(key, entry).is_some() {
            trace!(cache = self.name, "entry replaced or evicted on insert");
        }
    }

    /// Return the cached value or compute, store and return a fresh one.
    ///
    /// The lock is not held while `init` runs, so two concurrent callers may
    /// both compute; the later insert wins. Values are keyed independently so
    /// this never corrupts another entry.
    pub fn get_or_insert_with<F>(&self, key: K, init: F) -> V
    where
        F: FnOnce() -> V,
    {
        if let Some(value) = self.get(&key) {
            return value;
        }
        let value = init();
        self.insert(key, value.clone());
        value
    }

    /// Number of stored entries, including ones that expired but were not read yet
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// One cache per concern, constructed at start-up and passed to the
/// components that need it.
pub struct CacheRegistry {
    pub regex: Arc<TtlCache<String, CompiledPattern>>,
    pub public_ip: Arc<TtlCache<String, String>>,
    pub manifests: Arc<TtlCache<String, Manifest>>,
}

impl CacheRegistry {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            regex: Arc::new(TtlCache::new(
                "regex",
                config.max_entries,
                config.regex_ttl,
            )),
            public_ip: Arc::new(TtlCache::new(
                "public_ip",
                config.max_entries,
                config.public_ip_ttl,
            )),
            manifests: Arc::new(TtlCache::new(
                "manifests",
                config.max_entries,
                config.manifest_ttl,
            )),
        }
    }
}

impl Default for CacheRegistry {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}
