//! Cache service trait and error types.

use async_trait::async_trait;
use std::time::Duration;

/// Errors that can occur during cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache connection error: {0}")]
    Connection(String),

    #[error("Cache operation error: {0}")]
    Operation(String),

    #[error("Cache operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache-aside store for short code resolutions.
///
/// Each entry maps a short code to its origin URL plus a local hit delta: the
/// number of hits counted against this entry that have not yet been settled by
/// a flush. The cache is never authoritative for hit counts; the durable store
/// is.
///
/// Callers treat every error as a miss. Implementations may therefore surface
/// backend failures instead of hiding them, so that callers can log them once.
///
/// # Implementations
///
/// - [`crate::infrastructure::cache::MemoryCache`] - in-process cache with per-entry TTL
/// - [`crate::infrastructure::cache::RedisCache`] - Redis-backed cache shared by instances
/// - [`crate::infrastructure::cache::NullCache`] - always misses
/// - [`crate::infrastructure::cache::TimeoutCache`] - bounds another cache's calls
#[async_trait]
pub trait CacheService: Send + Sync {
    /// Looks up the origin URL for a short code. Never touches the durable store.
    async fn get_url(&self, code: &str) -> CacheResult<Option<String>>;

    /// Installs or refreshes an entry.
    ///
    /// Refreshing an entry keeps its local hit delta. `ttl = None` uses the
    /// implementation's default.
    async fn set_url(&self, code: &str, origin_url: &str, ttl: Option<Duration>)
    -> CacheResult<()>;

    /// Atomically bumps the entry's local hit delta.
    ///
    /// Returns the new delta, or `None` if the code is not cached.
    async fn increment_local(&self, code: &str) -> CacheResult<Option<u64>>;

    /// Subtracts a flushed amount from the entry's local hit delta, saturating at
    /// zero. A missing entry is not an error.
    async fn settle_local(&self, code: &str, delta: u64) -> CacheResult<()>;

    /// Removes the entry immediately. Subsequent lookups miss until repopulated.
    async fn invalidate(&self, code: &str) -> CacheResult<()>;

    /// Checks if the cache backend is healthy.
    async fn health_check(&self) -> bool;

    /// Short backend name for logs and health reports.
    fn backend_name(&self) -> &'static str;
}
