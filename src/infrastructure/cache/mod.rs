//! Caching layer for fast redirect lookups.
//!
//! Provides a [`CacheService`] trait with these implementations:
//! - [`MemoryCache`] - in-process cache with per-entry TTL (default)
//! - [`RedisCache`] - Redis-backed cache shared between instances
//! - [`NullCache`] - no-op implementation for disabled caching
//! - [`TimeoutCache`] - decorator bounding any of the above with a timeout

mod memory_cache;
mod null_cache;
mod redis_cache;
mod service;
mod timeout_cache;

pub use memory_cache::MemoryCache;
pub use null_cache::NullCache;
pub use redis_cache::RedisCache;
pub use service::{CacheError, CacheResult, CacheService};
pub use timeout_cache::TimeoutCache;
