//! Configuration for the cache and the server.
//!
//! Both types use a consuming builder. Zero values carry the same meaning
//! as on the command line: a zero capacity turns the cache into a
//! pass-through and a zero TTL disables automatic expiry.

use std::time::Duration;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 3456;

/// Default number of cache entries.
pub const DEFAULT_CACHE_CAPACITY: usize = 10;

/// Default cache TTL, in seconds.
pub const DEFAULT_CACHE_TIMEOUT_SECS: u64 = 600;

/// How long the control loop waits for a connection before running its
/// housekeeping steps.
pub const LISTEN_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// How long a worker waits on each receive before treating the input as
/// complete.
pub const RECEIVE_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Sleep granularity of the simulated computation, and therefore the
/// responsiveness of cancellation.
pub const DELAY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Longest request line a worker accepts.
pub const MAX_REQUEST_BYTES: usize = 1024;

/// Configuration for creating a new cache instance.
///
/// ```
/// use digest_cache::CacheConfig;
/// use std::time::Duration;
///
/// let config = CacheConfig::new()
///     .capacity(100)
///     .ttl(Duration::from_secs(120))
///     .build();
/// assert_eq!(config.get_capacity(), 100);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of entries. Zero disables writes.
    pub(crate) capacity: usize,

    /// Idle time after which a sweep discards an entry.
    /// `None` disables automatic expiry.
    pub(crate) ttl: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
            ttl: Some(Duration::from_secs(DEFAULT_CACHE_TIMEOUT_SECS)),
        }
    }
}

impl CacheConfig {
    /// Create a new configuration builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of entries.
    ///
    /// When the cache is full, inserting a new key evicts the entry that
    /// was accessed least recently. Use 0 to disable caching entirely.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the idle time after which entries expire.
    ///
    /// Set to `Duration::ZERO` to disable automatic expiry.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = if ttl.is_zero() { None } else { Some(ttl) };
        self
    }

    /// Build the final configuration.
    pub fn build(self) -> Self {
        self
    }

    /// Get the maximum number of entries.
    pub fn get_capacity(&self) -> usize {
        self.capacity
    }

    /// Get the TTL, if set.
    pub fn get_ttl(&self) -> Option<Duration> {
        self.ttl
    }
}

/// Configuration for the digest server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) cache: CacheConfig,
    pub(crate) worker_stack_size: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            cache: CacheConfig::default(),
            worker_stack_size: None,
        }
    }
}

impl ServerConfig {
    /// Create a new configuration builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the interface to bind.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the listening port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the configuration of the shared cache.
    pub fn cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Set the stack size of worker threads, in bytes.
    ///
    /// Defaults to the platform's thread stack size.
    pub fn worker_stack_size(mut self, bytes: usize) -> Self {
        self.worker_stack_size = Some(bytes);
        self
    }

    /// Build the final configuration.
    pub fn build(self) -> Self {
        self
    }

    /// The `host:port` address to bind.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the listening port.
    pub fn get_port(&self) -> u16 {
        self.port
    }

    /// Get the cache configuration.
    pub fn get_cache(&self) -> &CacheConfig {
        &self.cache
    }
}
