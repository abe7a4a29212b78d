//! Public redirect path: code to origin URL, counting each resolution.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::RetryIf;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, warn};

use crate::domain::deletion_fence::DeletionFence;
use crate::domain::entities::ShortUrl;
use crate::domain::hit_aggregator::HitAggregator;
use crate::domain::repositories::ShortUrlRepository;
use crate::error::AppError;
use crate::infrastructure::cache::CacheService;
use crate::utils::code_generator::is_well_formed_code;

use super::store_policy::StorePolicy;

/// Where a resolution was answered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveSource {
    Cache,
    Store,
}

impl ResolveSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolveSource::Cache => "cache",
            ResolveSource::Store => "store",
        }
    }
}

/// Resolves short codes with a cache-aside lookup.
///
/// Every successful resolution records exactly one hit in the
/// [`HitAggregator`]. Cache failures degrade to a store lookup. A store that
/// does not answer in time surfaces as [`AppError::Unavailable`], never as
/// not found.
pub struct RedirectResolver {
    repository: Arc<dyn ShortUrlRepository>,
    cache: Arc<dyn CacheService>,
    aggregator: Arc<HitAggregator>,
    fence: DeletionFence,
    store_policy: StorePolicy,
}

impl RedirectResolver {
    pub fn new(
        repository: Arc<dyn ShortUrlRepository>,
        cache: Arc<dyn CacheService>,
        aggregator: Arc<HitAggregator>,
        fence: DeletionFence,
        store_policy: StorePolicy,
    ) -> Self {
        Self {
            repository,
            cache,
            aggregator,
            fence,
            store_policy,
        }
    }

    /// Returns the origin URL for `code` and counts the hit.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] for malformed, unknown or just-deleted codes.
    /// Returns [`AppError::Unavailable`] if the store times out or stays
    /// unreachable after retries.
    pub async fn resolve(&self, code: &str) -> Result<String, AppError> {
        self.resolve_with_source(code).await.map(|(url, _)| url)
    }

    pub async fn resolve_with_source(
        &self,
        code: &str,
    ) -> Result<(String, ResolveSource), AppError> {
        if !is_well_formed_code(code) {
            return Err(not_found(code));
        }

        match self.cache.get_url(code).await {
            Ok(Some(origin_url)) if !self.fence.is_fenced(code) => {
                self.aggregator.increment(code).await;
                metrics::counter!("redirects_total", "source" => "cache").increment(1);
                return Ok((origin_url, ResolveSource::Cache));
            }
            Ok(Some(_)) => {
                debug!(code, "Cached entry for deleted code ignored");
                self.evict(code).await;
            }
            Ok(None) => {}
            Err(e) => debug!(code, error = %e, "Cache read failed, falling back to store"),
        }

        let short_url = match self.fetch_from_store(code).await? {
            Some(short_url) => short_url,
            None => {
                metrics::counter!("redirect_not_found_total").increment(1);
                return Err(not_found(code));
            }
        };

        if let Err(e) = self.cache.set_url(code, &short_url.origin_url, None).await {
            debug!(code, error = %e, "Cache populate failed");
        }

        // A delete may have committed while the store read was in flight.
        if self.fence.is_fenced(code) {
            self.evict(code).await;
            metrics::counter!("redirect_not_found_total").increment(1);
            return Err(not_found(code));
        }

        self.aggregator.increment(code).await;
        metrics::counter!("redirects_total", "source" => "store").increment(1);

        Ok((short_url.origin_url, ResolveSource::Store))
    }

    async fn evict(&self, code: &str) {
        if let Err(e) = self.cache.invalidate(code).await {
            debug!(code, error = %e, "Cache invalidation of deleted code failed");
        }
    }

    async fn fetch_from_store(&self, code: &str) -> Result<Option<ShortUrl>, AppError> {
        let strategy = ExponentialBackoff::from_millis(10)
            .max_delay(Duration::from_millis(200))
            .map(jitter)
            .take(self.store_policy.retry_attempts);

        let policy = self.store_policy;

        RetryIf::spawn(
            strategy,
            move || async move {
                policy
                    .run("find_by_code", self.repository.find_by_code(code))
                    .await
            },
            |e: &AppError| {
                if e.is_transient() {
                    warn!(code, error = %e, "Transient store failure on redirect, retrying");
                    true
                } else {
                    false
                }
            },
        )
        .await
    }
}

fn not_found(code: &str) -> AppError {
    AppError::not_found("Short URL not found", json!({ "code": code }))
}
