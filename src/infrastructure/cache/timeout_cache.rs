//! Decorator bounding every cache call with a timeout.

use super::service::{CacheError, CacheResult, CacheService};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Wraps another [`CacheService`] and fails any call that takes longer than
/// `timeout` with [`CacheError::Timeout`].
///
/// Callers already treat cache errors as misses, so a slow backend degrades
/// redirects to store lookups instead of stalling them.
pub struct TimeoutCache {
    inner: Arc<dyn CacheService>,
    timeout: Duration,
}

impl TimeoutCache {
    pub fn new(inner: Arc<dyn CacheService>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T>(&self, fut: impl Future<Output = CacheResult<T>>) -> CacheResult<T> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| CacheError::Timeout(self.timeout))?
    }
}

#[async_trait]
impl CacheService for TimeoutCache {
    async fn get_url(&self, code: &str) -> CacheResult<Option<String>> {
        self.bounded(self.inner.get_url(code)).await
    }

    async fn set_url(
        &self,
        code: &str,
        origin_url: &str,
        ttl: Option<Duration>,
    ) -> CacheResult<()> {
        self.bounded(self.inner.set_url(code, origin_url, ttl)).await
    }

    async fn increment_local(&self, code: &str) -> CacheResult<Option<u64>> {
        self.bounded(self.inner.increment_local(code)).await
    }

    async fn settle_local(&self, code: &str, delta: u64) -> CacheResult<()> {
        self.bounded(self.inner.settle_local(code, delta)).await
    }

    async fn invalidate(&self, code: &str) -> CacheResult<()> {
        self.bounded(self.inner.invalidate(code)).await
    }

    async fn health_check(&self) -> bool {
        tokio::time::timeout(self.timeout, self.inner.health_check())
            .await
            .unwrap_or(false)
    }

    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }
}
