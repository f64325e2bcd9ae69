//! Cache entry with the last-access metadata used for LRU and TTL.

use std::time::{Duration, Instant};

/// A single cache entry containing the value and its last-access time.
///
/// Entries live only inside the cache map; reading the value through
/// [`CacheEntry::access`] refreshes the timestamp, so eviction follows
/// access order rather than insertion order.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value.
    pub(crate) value: V,

    /// When this entry was last written or read.
    pub(crate) last_access: Instant,
}

impl<V> CacheEntry<V> {
    /// Create a new entry stamped with `now`.
    pub fn new(value: V, now: Instant) -> Self {
        Self {
            value,
            last_access: now,
        }
    }

    /// Return the value and refresh the access time to `now`.
    pub fn access(&mut self, now: Instant) -> &V {
        self.last_access = now;
        &self.value
    }

    /// Get a reference to the value without touching the entry.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Get the last access time.
    pub fn last_access(&self) -> Instant {
        self.last_access
    }

    /// Whether the entry has been idle for longer than `ttl` at `now`.
    pub fn is_stale_at(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.last_access) > ttl
    }
}
