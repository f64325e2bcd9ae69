//! Statistics for the cache and the server.
//!
//! Cache counters live inside the cache's critical section, so a copy taken
//! through [`Cache::stats`](crate::Cache::stats) is always consistent with the
//! map it describes. Server counters are owned by the single control loop.

use std::fmt;

/// Counters for cache operations.
///
/// All four counters only ever grow, except through
/// [`Cache::clear_statistics`](crate::Cache::clear_statistics).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that found an entry.
    pub hits: u64,

    /// Lookups that found nothing.
    pub faults: u64,

    /// Entries removed to respect capacity or TTL, or by a clear.
    pub evictions: u64,

    /// Writes that replaced an existing entry.
    pub overwrites: u64,
}

impl CacheStats {
    /// Record a cache hit.
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    /// Record a cache fault.
    pub fn record_fault(&mut self) {
        self.faults += 1;
    }

    /// Record `count` evictions.
    pub fn record_evictions(&mut self, count: u64) {
        self.evictions += count;
    }

    /// Record an overwrite.
    pub fn record_overwrite(&mut self) {
        self.overwrites += 1;
    }

    /// Calculate the hit rate as a percentage (0.0 to 100.0).
    /// Returns 0.0 if no lookups have been performed.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.faults;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[hits:{}] [faults:{}] [erased:{}] [overwritten:{}]",
            self.hits, self.faults, self.evictions, self.overwrites
        )
    }
}

/// Aggregate counters kept by the server control loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerStats {
    /// Workers successfully launched.
    pub workers: u64,

    /// Workers that finished with an error, were cancelled or panicked.
    pub errors: u64,

    /// Connections dropped because no worker thread could be launched.
    pub unattended: u64,
}

impl ServerStats {
    /// Record a launched worker.
    pub fn record_worker(&mut self) {
        self.workers += 1;
    }

    /// Record a worker that reported an error.
    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    /// Record a connection that could not be served.
    pub fn record_unattended(&mut self) {
        self.unattended += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_stats() {
        let stats = CacheStats::default();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.faults, 0);
        assert_eq!(stats.evictions, 0);
        assert_eq!(stats.overwrites, 0);
    }

    #[test]
    fn test_hit_rate() {
        let mut stats = CacheStats::default();

        // No lookups = 0% hit rate
        assert_eq!(stats.hit_rate(), 0.0);

        stats.record_hit();
        stats.record_hit();
        stats.record_hit();
        stats.record_fault();

        assert!((stats.hit_rate() - 75.0).abs() < 0.01);
    }

    #[test]
    fn test_display() {
        let mut stats = CacheStats::default();
        stats.record_hit();
        stats.record_evictions(3);
        stats.record_overwrite();
        assert_eq!(
            stats.to_string(),
            "[hits:1] [faults:0] [erased:3] [overwritten:1]"
        );
    }

    #[test]
    fn test_server_counters() {
        let mut stats = ServerStats::default();
        stats.record_worker();
        stats.record_worker();
        stats.record_error();
        stats.record_unattended();

        assert_eq!(
            stats,
            ServerStats {
                workers: 2,
                errors: 1,
                unattended: 1
            }
        );
    }
}
