//! Unsynchronized storage behind the cache lock.
//!
//! `Store` owns the map, the bounds and the counters. Every method takes the
//! current instant explicitly so the eviction and expiry rules can be tested
//! against a controlled clock. Locking and logging live in [`crate::cache`].

use indexmap::IndexMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use crate::config::CacheConfig;
use crate::entry::CacheEntry;
use crate::stats::CacheStats;

/// What a write did to the map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetOutcome<K, V> {
    /// Capacity is zero, nothing was stored.
    Disabled,
    /// A new key was inserted without evicting anything.
    Inserted,
    /// A new key was inserted after evicting the least recently used entry.
    Evicted { key: K, value: V },
    /// An existing key got a new value.
    Overwritten,
}

/// The cache map together with its bounds and statistics.
#[derive(Debug)]
pub struct Store<K, V> {
    /// Entries in insertion order; the order only breaks timestamp ties.
    entries: IndexMap<K, CacheEntry<V>>,

    capacity: usize,
    ttl: Option<Duration>,
    stats: CacheStats,
}

impl<K, V> Store<K, V>
where
    K: Eq + Hash,
{
    /// Create an empty store with the given configuration.
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: IndexMap::with_capacity(config.capacity),
            capacity: config.capacity,
            ttl: config.ttl,
            stats: CacheStats::default(),
        }
    }

    /// Store `value` under `key`.
    ///
    /// A new key in a full store first evicts the entry with the oldest
    /// access time. Ties go to the entry inserted first.
    pub fn set(&mut self, key: K, value: V, now: Instant) -> SetOutcome<K, V> {
        if self.capacity == 0 {
            return SetOutcome::Disabled;
        }

        if let Some(entry) = self.entries.get_mut(&key) {
            *entry = CacheEntry::new(value, now);
            self.stats.record_overwrite();
            return SetOutcome::Overwritten;
        }

        let evicted = if self.entries.len() >= self.capacity {
            self.evict_oldest()
        } else {
            None
        };

        self.entries.insert(key, CacheEntry::new(value, now));

        match evicted {
            Some((key, value)) => SetOutcome::Evicted { key, value },
            None => SetOutcome::Inserted,
        }
    }

    /// Look up `key`, refreshing its access time on a hit.
    pub fn get(&mut self, key: &K, now: Instant) -> Option<&V> {
        match self.entries.get_mut(key) {
            Some(entry) => {
                self.stats.record_hit();
                Some(entry.access(now))
            }
            None => {
                self.stats.record_fault();
                None
            }
        }
    }

    /// Remove every entry idle for longer than the TTL and return them.
    ///
    /// Does nothing when no TTL is configured.
    pub fn sweep(&mut self, now: Instant) -> Vec<(K, V)> {
        let Some(ttl) = self.ttl else {
            return Vec::new();
        };

        let mut expired = Vec::new();
        let mut kept = IndexMap::with_capacity(self.entries.len());
        for (key, entry) in self.entries.drain(..) {
            if entry.is_stale_at(now, ttl) {
                expired.push((key, entry.value));
            } else {
                kept.insert(key, entry);
            }
        }
        self.entries = kept;

        self.stats.record_evictions(expired.len() as u64);
        expired
    }

    /// Replace the TTL. `Duration::ZERO` disables automatic expiry.
    pub fn set_ttl(&mut self, ttl: Duration) {
        self.ttl = if ttl.is_zero() { None } else { Some(ttl) };
    }

    /// Remove all entries, counting each one as an eviction.
    pub fn clear(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        self.stats.record_evictions(removed as u64);
        removed
    }

    /// Iterate over the entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter().map(|(key, entry)| (key, entry.value()))
    }

    /// Whether `key` is present. Does not touch the entry or the counters.
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Reset all counters to zero.
    pub fn clear_stats(&mut self) {
        self.stats = CacheStats::default();
    }

    /// Linear scan for the least recently accessed entry.
    fn evict_oldest(&mut self) -> Option<(K, V)> {
        let (index, _) = self
            .entries
            .values()
            .enumerate()
            .min_by_key(|(_, entry)| entry.last_access())?;

        let (key, entry) = self.entries.shift_remove_index(index)?;
        self.stats.record_evictions(1);
        Some((key, entry.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(capacity: usize, ttl_secs: u64) -> Store<&'static str, u32> {
        let config = CacheConfig::new()
            .capacity(capacity)
            .ttl(Duration::from_secs(ttl_secs))
            .build();
        Store::new(&config)
    }

    fn at(base: Instant, secs: u64) -> Instant {
        base + Duration::from_secs(secs)
    }

    #[test]
    fn test_basic_set_get() {
        let mut store = store(3, 0);
        let now = Instant::now();

        assert_eq!(store.set("a", 1, now), SetOutcome::Inserted);
        assert_eq!(store.get(&"a", now), Some(&1));
        assert_eq!(store.get(&"missing", now), None);

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.faults, 1);
    }

    #[test]
    fn test_zero_capacity_is_pass_through() {
        let mut store = store(0, 0);
        let now = Instant::now();

        assert_eq!(store.set("a", 1, now), SetOutcome::Disabled);
        assert!(store.is_empty());
        assert_eq!(store.get(&"a", now), None);
        assert_eq!(store.stats().faults, 1);
    }

    #[test]
    fn test_overwrite_counts_and_keeps_size() {
        let mut store = store(2, 0);
        let now = Instant::now();

        store.set("a", 1, now);
        store.set("b", 2, now);
        assert_eq!(store.set("a", 10, now), SetOutcome::Overwritten);

        assert_eq!(store.len(), 2);
        assert_eq!(store.get(&"a", now), Some(&10));
        assert_eq!(store.stats().overwrites, 1);
        assert_eq!(store.stats().evictions, 0);
    }

    #[test]
    fn test_evicts_least_recently_accessed() {
        let mut store = store(3, 0);
        let base = Instant::now();

        store.set("a", 1, at(base, 0));
        store.set("b", 2, at(base, 1));
        store.set("c", 3, at(base, 2));

        // Reading "a" makes "b" the oldest.
        store.get(&"a", at(base, 3));

        let outcome = store.set("d", 4, at(base, 4));
        assert_eq!(outcome, SetOutcome::Evicted { key: "b", value: 2 });
        assert_eq!(store.len(), 3);
        assert!(store.contains(&"a"));
        assert!(store.contains(&"c"));
        assert!(store.contains(&"d"));
        assert_eq!(store.stats().evictions, 1);
    }

    #[test]
    fn test_eviction_tie_goes_to_first_inserted() {
        let mut store = store(2, 0);
        let now = Instant::now();

        store.set("a", 1, now);
        store.set("b", 2, now);
        assert_eq!(
            store.set("c", 3, now),
            SetOutcome::Evicted { key: "a", value: 1 }
        );
    }

    #[test]
    fn test_overwrite_refreshes_access_time() {
        let mut store = store(2, 0);
        let base = Instant::now();

        store.set("a", 1, at(base, 0));
        store.set("b", 2, at(base, 1));
        store.set("a", 3, at(base, 2));

        assert_eq!(
            store.set("c", 4, at(base, 3)),
            SetOutcome::Evicted { key: "b", value: 2 }
        );
    }

    #[test]
    fn test_sweep_removes_only_stale_entries() {
        let mut store = store(10, 10);
        let base = Instant::now();

        store.set("old", 1, at(base, 0));
        store.set("young", 2, at(base, 5));
        store.set("touched", 3, at(base, 0));
        store.get(&"touched", at(base, 6));

        let expired = store.sweep(at(base, 12));
        assert_eq!(expired, vec![("old", 1)]);
        assert_eq!(store.len(), 2);
        assert_eq!(store.stats().evictions, 1);

        // Survivors keep their order.
        let keys: Vec<_> = store.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["young", "touched"]);
    }

    #[test]
    fn test_sweep_without_ttl_keeps_everything() {
        let mut store = store(10, 0);
        let base = Instant::now();

        store.set("a", 1, base);
        assert!(store.sweep(at(base, 100_000)).is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_set_ttl_enables_and_disables_sweep() {
        let mut store = store(10, 0);
        let base = Instant::now();
        store.set("a", 1, base);

        store.set_ttl(Duration::from_secs(1));
        assert_eq!(store.ttl(), Some(Duration::from_secs(1)));
        store.set_ttl(Duration::ZERO);
        assert!(store.sweep(at(base, 5)).is_empty());

        store.set_ttl(Duration::from_secs(1));
        assert_eq!(store.sweep(at(base, 5)).len(), 1);
    }

    #[test]
    fn test_clear_counts_evictions() {
        let mut store = store(10, 0);
        let now = Instant::now();

        store.set("a", 1, now);
        store.set("b", 2, now);
        assert_eq!(store.clear(), 2);
        assert!(store.is_empty());
        assert_eq!(store.stats().evictions, 2);

        store.clear_stats();
        assert_eq!(store.stats(), CacheStats::default());
    }
}
