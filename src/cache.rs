//! The shared cache handle.
//!
//! This module provides the `Cache` type that workers and the server share.
//! Every operation runs inside one coarse critical section, so lookups,
//! writes, sweeps and diagnostics are totally ordered.
//!
//! Eviction is a linear scan over the entries. That is fine for the tens to
//! low hundreds of entries this cache is sized for; larger capacities would
//! want an ordered structure instead.

use parking_lot::Mutex;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, enabled, info, Level};

use crate::config::CacheConfig;
use crate::stats::CacheStats;
use crate::storage::{SetOutcome, Store};

/// A thread-safe, bounded cache with LRU eviction and idle-time expiry.
///
/// Cloning a `Cache` creates a new handle to the same underlying data.
///
/// # Example
/// ```
/// use digest_cache::{Cache, CacheConfig};
///
/// let cache: Cache<String, String> = Cache::new(CacheConfig::new().capacity(2).build());
/// cache.set("a".to_string(), "1".to_string());
///
/// assert_eq!(cache.get(&"a".to_string()), Some("1".to_string()));
/// assert_eq!(cache.get(&"b".to_string()), None);
///
/// let stats = cache.stats();
/// assert_eq!((stats.hits, stats.faults), (1, 1));
/// ```
#[derive(Debug)]
pub struct Cache<K, V> {
    store: Arc<Mutex<Store<K, V>>>,
}

impl<K, V> Clone for Cache<K, V> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Debug,
    V: Clone + Debug,
{
    /// Create a new cache with the given configuration.
    pub fn new(config: CacheConfig) -> Self {
        debug!(
            capacity = config.capacity,
            ttl = ?config.ttl,
            "[CACHE] The cache is ready"
        );
        Self {
            store: Arc::new(Mutex::new(Store::new(&config))),
        }
    }

    /// Store `value` under `key`.
    ///
    /// A no-op when the capacity is zero. Writing an existing key replaces
    /// its value and counts an overwrite; writing a new key into a full
    /// cache first evicts the least recently accessed entry.
    pub fn set(&self, key: K, value: V) {
        self.set_at(key, value, Instant::now());
    }

    /// Look up `key`, refreshing its access time on a hit.
    ///
    /// Hits and faults are counted; the size never changes.
    pub fn get(&self, key: &K) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    /// Discard every entry idle for longer than the TTL.
    ///
    /// Does nothing when automatic expiry is disabled.
    pub fn update(&self) {
        self.update_at(Instant::now());
    }

    /// Replace the TTL. `Duration::ZERO` disables automatic expiry.
    pub fn set_timeout(&self, ttl: Duration) {
        self.store.lock().set_ttl(ttl);
        info!(timeout = ?ttl, "[CACHE] Updating the cache timeout");
    }

    /// Remove all entries, counting them as evictions.
    pub fn clear_content(&self) {
        let removed = self.store.lock().clear();
        debug!(removed, "[CACHE] The cache content has been cleared");
    }

    /// Number of entries currently stored.
    pub fn size(&self) -> usize {
        self.store.lock().len()
    }

    /// Whether `key` is stored. Unlike [`Cache::get`] this neither
    /// refreshes the entry nor touches the counters.
    pub fn contains(&self, key: &K) -> bool {
        self.store.lock().contains(key)
    }

    /// Copy of the current counters.
    pub fn stats(&self) -> CacheStats {
        self.store.lock().stats()
    }

    /// Reset all counters to zero.
    pub fn clear_statistics(&self) {
        self.store.lock().clear_stats();
        info!("[CACHE] Cache statistics have been cleared");
    }

    /// Log every entry followed by the total.
    pub fn print_content(&self) {
        let store = self.store.lock();
        info!("[CACHE]---- Cache content ---------------------------------------------------------");
        if !store.is_empty() {
            for (key, value) in store.iter() {
                info!("[CACHE] {{key: {:?}, data: {:?}}}", key, value);
            }
            info!("[CACHE]----------------------------------------------------------------------------");
        }
        info!("[CACHE] Total: {} entries.", store.len());
        info!("[CACHE]----------------------------------------------------------------------------");
    }

    /// Log the size and counters.
    pub fn print_statistics(&self) {
        let store = self.store.lock();
        info!("[CACHE]---- Cache statistics ------------------------------------------------------");
        info!(
            "[CACHE] Capacity: {} entries, timeout: {:?}",
            store.capacity(),
            store.ttl()
        );
        info!("[CACHE] Total: {} entries {}", store.len(), store.stats());
        info!("[CACHE]----------------------------------------------------------------------------");
    }

    pub(crate) fn set_at(&self, key: K, value: V, now: Instant) {
        let written = enabled!(Level::DEBUG)
            .then(|| format!("{:?} => {:?}", key, value))
            .unwrap_or_default();

        let mut store = self.store.lock();
        match store.set(key, value, now) {
            SetOutcome::Disabled => {}
            SetOutcome::Inserted => {
                debug!("[CACHE] Inserting new entry: {}", written);
            }
            SetOutcome::Evicted { key, value } => {
                debug!(
                    "[CACHE] Erasing the least used entry: {:?} => {:?}",
                    key, value
                );
                debug!("[CACHE] Inserting new entry: {}", written);
            }
            SetOutcome::Overwritten => {
                debug!("[CACHE] Overwriting entry: {}", written);
            }
        }
    }

    pub(crate) fn get_at(&self, key: &K, now: Instant) -> Option<V> {
        self.store.lock().get(key, now).cloned()
    }

    pub(crate) fn update_at(&self, now: Instant) {
        let expired = self.store.lock().sweep(now);
        for (key, value) in expired {
            debug!("[CACHE] Erasing the oldest entry: {:?} => {:?}", key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(capacity: usize, ttl_secs: u64) -> Cache<String, String> {
        Cache::new(
            CacheConfig::new()
                .capacity(capacity)
                .ttl(Duration::from_secs(ttl_secs))
                .build(),
        )
    }

    fn key(s: &str) -> String {
        s.to_string()
    }

    #[test]
    fn test_cache_basic_operations() {
        let cache = cache(10, 0);

        cache.set(key("k"), key("v"));
        assert_eq!(cache.get(&key("k")), Some(key("v")));
        assert_eq!(cache.size(), 1);
        assert!(cache.contains(&key("k")));
    }

    #[test]
    fn test_cache_is_clone() {
        let cache1 = cache(10, 0);
        cache1.set(key("key"), key("value"));

        let cache2 = cache1.clone();

        // Both point to the same underlying data
        assert_eq!(cache2.get(&key("key")), Some(key("value")));

        cache2.set(key("key2"), key("value2"));
        assert_eq!(cache1.get(&key("key2")), Some(key("value2")));
    }

    #[test]
    fn test_miss_does_not_change_size() {
        let cache = cache(10, 0);
        cache.set(key("a"), key("1"));

        assert_eq!(cache.get(&key("nope")), None);
        assert_eq!(cache.size(), 1);
        assert_eq!(cache.stats().faults, 1);
    }

    #[test]
    fn test_update_expires_idle_entries() {
        let cache = cache(10, 10);
        let base = Instant::now();

        cache.set_at(key("a"), key("1"), base);
        cache.set_at(key("b"), key("2"), base + Duration::from_secs(8));

        cache.update_at(base + Duration::from_secs(11));
        assert!(!cache.contains(&key("a")));
        assert!(cache.contains(&key("b")));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_set_timeout_applies_to_next_sweep() {
        let cache = cache(10, 0);
        let base = Instant::now();
        cache.set_at(key("a"), key("1"), base);

        cache.update_at(base + Duration::from_secs(60));
        assert_eq!(cache.size(), 1);

        cache.set_timeout(Duration::from_secs(30));
        cache.update_at(base + Duration::from_secs(60));
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn test_clear_content_then_size_is_zero() {
        let cache = cache(10, 0);
        cache.set(key("a"), key("1"));
        cache.set(key("b"), key("2"));

        cache.clear_content();
        assert_eq!(cache.size(), 0);
        assert_eq!(cache.stats().evictions, 2);

        cache.clear_statistics();
        assert_eq!(cache.stats(), CacheStats::default());
    }

    #[test]
    fn test_diagnostics_do_not_mutate() {
        let cache = cache(10, 0);
        cache.set(key("a"), key("1"));

        cache.print_content();
        cache.print_statistics();

        assert_eq!(cache.size(), 1);
        assert_eq!(cache.stats(), CacheStats::default());
    }

    #[test]
    fn test_cache_thread_safety() {
        use std::thread;

        let cache = cache(50, 0);
        let mut handles = vec![];

        for i in 0..10 {
            let cache = cache.clone();
            handles.push(thread::spawn(move || {
                for j in 0..100 {
                    let k = format!("key_{}", j);
                    cache.set(k.clone(), format!("value_{}_{}", i, j));
                    let _ = cache.get(&k);
                    assert!(cache.size() <= 50);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.size(), 50);
        let stats = cache.stats();
        assert_eq!(stats.hits + stats.faults, 1000);
    }
}
