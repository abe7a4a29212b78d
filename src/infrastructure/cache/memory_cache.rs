//! In-process cache backed by `moka`.

use super::service::{CacheResult, CacheService};
use async_trait::async_trait;
use moka::Expiry;
use moka::sync::Cache;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

/// A cached resolution. The hit delta is an atomic cell so concurrent
/// redirects for the same code never lose an increment.
#[derive(Debug)]
struct CachedEntry {
    origin_url: String,
    local_hits: AtomicU64,
    ttl: Duration,
}

/// Expires each entry after the TTL it was installed with.
struct PerEntryTtl;

impl Expiry<String, Arc<CachedEntry>> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Arc<CachedEntry>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Arc<CachedEntry>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Single-node cache with a capacity bound and per-entry TTL.
///
/// Suitable when one instance serves all redirects, or as the fallback when
/// Redis is unreachable at startup.
#[derive(Clone)]
pub struct MemoryCache {
    entries: Cache<String, Arc<CachedEntry>>,
    default_ttl: Duration,
}

impl MemoryCache {
    /// Creates a cache holding at most `max_capacity` entries.
    pub fn new(max_capacity: u64, default_ttl: Duration) -> Self {
        let entries = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryTtl)
            .build();

        Self {
            entries,
            default_ttl,
        }
    }

    /// Returns the local hit delta for a cached code, mostly for diagnostics.
    pub fn local_delta(&self, code: &str) -> Option<u64> {
        self.entries
            .get(code)
            .map(|entry| entry.local_hits.load(Ordering::Acquire))
    }
}

#[async_trait]
impl CacheService for MemoryCache {
    async fn get_url(&self, code: &str) -> CacheResult<Option<String>> {
        match self.entries.get(code) {
            Some(entry) => {
                debug!("Cache HIT: {}", code);
                Ok(Some(entry.origin_url.clone()))
            }
            None => {
                debug!("Cache MISS: {}", code);
                Ok(None)
            }
        }
    }

    async fn set_url(
        &self,
        code: &str,
        origin_url: &str,
        ttl: Option<Duration>,
    ) -> CacheResult<()> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let carried = self
            .entries
            .get(code)
            .map(|existing| existing.local_hits.load(Ordering::Acquire))
            .unwrap_or(0);

        self.entries.insert(
            code.to_string(),
            Arc::new(CachedEntry {
                origin_url: origin_url.to_string(),
                local_hits: AtomicU64::new(carried),
                ttl,
            }),
        );
        debug!("Cache SET: {} -> {} (TTL: {:?})", code, origin_url, ttl);
        Ok(())
    }

    async fn increment_local(&self, code: &str) -> CacheResult<Option<u64>> {
        Ok(self
            .entries
            .get(code)
            .map(|entry| entry.local_hits.fetch_add(1, Ordering::AcqRel) + 1))
    }

    async fn settle_local(&self, code: &str, delta: u64) -> CacheResult<()> {
        if let Some(entry) = self.entries.get(code) {
            let _ = entry
                .local_hits
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                    Some(current.saturating_sub(delta))
                });
        }
        Ok(())
    }

    async fn invalidate(&self, code: &str) -> CacheResult<()> {
        self.entries.invalidate(code);
        debug!("Cache INVALIDATE: {}", code);
        Ok(())
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
