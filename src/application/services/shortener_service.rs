//! Owner-facing operations: create, list and delete short URLs.

use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::deletion_fence::DeletionFence;
use crate::domain::entities::{NewShortUrl, ShortUrl, UserId};
use crate::domain::hit_aggregator::HitAggregator;
use crate::domain::repositories::ShortUrlRepository;
use crate::error::AppError;
use crate::infrastructure::cache::CacheService;
use crate::utils::code_generator::generate_code;
use crate::utils::url_validator::validate_origin_url;

use super::store_policy::StorePolicy;

/// Draws allowed per create before giving up.
pub const MAX_CODE_ATTEMPTS: usize = 5;

type CodeSource = Box<dyn Fn() -> String + Send + Sync>;

/// Service for creating, listing and deleting an owner's short URLs.
///
/// # Code allocation
///
/// A drawn code is rejected if it is known to the store, the cache, the hit
/// aggregator or the deletion fence. A unique violation on insert counts as
/// one more collision. After [`MAX_CODE_ATTEMPTS`] draws the create fails with
/// [`AppError::CodeSpaceExhausted`].
///
/// # Deletion order
///
/// 1. queued hits taken out of the aggregator
/// 2. code fenced against late cache repopulation
/// 3. cache entry invalidated; on failure the fence is held for the cache TTL
/// 4. store record deleted; on failure the fence is lifted and the hits requeued
/// 5. remaining pending hits dropped
pub struct ShortenerService {
    repository: Arc<dyn ShortUrlRepository>,
    cache: Arc<dyn CacheService>,
    aggregator: Arc<HitAggregator>,
    fence: DeletionFence,
    store_policy: StorePolicy,
    warm_on_create: bool,
    code_source: CodeSource,
}

impl ShortenerService {
    pub fn new(
        repository: Arc<dyn ShortUrlRepository>,
        cache: Arc<dyn CacheService>,
        aggregator: Arc<HitAggregator>,
        fence: DeletionFence,
        store_policy: StorePolicy,
        warm_on_create: bool,
    ) -> Self {
        Self {
            repository,
            cache,
            aggregator,
            fence,
            store_policy,
            warm_on_create,
            code_source: Box::new(generate_code),
        }
    }

    /// Replaces the random code source. Used to force collisions in tests.
    pub fn with_code_source(mut self, source: impl Fn() -> String + Send + Sync + 'static) -> Self {
        self.code_source = Box::new(source);
        self
    }

    /// Creates a short URL for `owner`.
    ///
    /// The URL is stored exactly as submitted.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] for empty, malformed, relative,
    /// non-HTTP(S), host-less or oversized URLs.
    /// Returns [`AppError::CodeSpaceExhausted`] when every draw collided.
    pub async fn create(&self, owner: UserId, raw_url: &str) -> Result<ShortUrl, AppError> {
        validate_origin_url(raw_url).map_err(|e| {
            AppError::bad_request("Invalid URL", json!({ "reason": e.to_string() }))
        })?;

        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let code = (self.code_source)();

            if !self.is_code_free(&code).await? {
                self.record_collision(&code, attempt);
                continue;
            }

            let insert = self.repository.insert(NewShortUrl {
                code: code.clone(),
                origin_url: raw_url.to_string(),
                owner_id: owner,
            });

            match self.store_policy.run("insert", insert).await {
                Ok(short_url) => {
                    if self.warm_on_create
                        && let Err(e) = self.cache.set_url(&code, raw_url, None).await
                    {
                        debug!(code = %code, error = %e, "Cache warm on create failed");
                    }

                    info!(code = %short_url.code, owner_id = owner, "Short URL created");
                    return Ok(short_url);
                }
                Err(AppError::Conflict { .. }) => self.record_collision(&code, attempt),
                Err(e) => return Err(e),
            }
        }

        Err(AppError::code_space_exhausted(
            "Failed to allocate a unique short code",
            json!({ "attempts": MAX_CODE_ATTEMPTS }),
        ))
    }

    /// Lists the owner's short URLs, newest first.
    ///
    /// Hit counts are those already flushed to the store.
    pub async fn list(&self, owner: UserId) -> Result<Vec<ShortUrl>, AppError> {
        self.store_policy
            .run("list_by_owner", self.repository.list_by_owner(owner))
            .await
    }

    /// Deletes one of the owner's short URLs.
    ///
    /// A failed store delete leaves the record, its pending hits and its
    /// reachability as they were.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if the code does not exist.
    /// Returns [`AppError::Forbidden`] if it belongs to someone else.
    /// Returns [`AppError::Unavailable`] if the store delete timed out.
    pub async fn delete(&self, owner: UserId, code: &str) -> Result<(), AppError> {
        let short_url = self
            .store_policy
            .run("find_by_code", self.repository.find_by_code(code))
            .await?
            .ok_or_else(|| not_found(code))?;

        if !short_url.is_owned_by(owner) {
            return Err(AppError::forbidden(
                "Short URL belongs to another user",
                json!({ "code": code }),
            ));
        }

        let held = self.aggregator.take_queued(code);
        self.fence.mark(code);

        if let Err(e) = self.cache.invalidate(code).await {
            warn!(code, error = %e, "Cache invalidation failed, fencing until entry expires");
            self.fence.mark_stale(code);
        }

        let deleted = match self
            .store_policy
            .run("delete", self.repository.delete(code))
            .await
        {
            Ok(deleted) => deleted,
            Err(e) => {
                self.fence.unmark(code);
                self.aggregator.restore_pending(code, held);
                warn!(code, error = %e, "Store delete failed, short URL kept");
                return Err(e);
            }
        };

        // Covers a claim that was in flight and any hit that passed the fence
        // check just before it was set.
        let dropped = held + self.aggregator.drop_pending(code);

        if !deleted {
            return Err(not_found(code));
        }

        info!(code, owner_id = owner, dropped_hits = dropped, "Short URL deleted");
        Ok(())
    }

    async fn is_code_free(&self, code: &str) -> Result<bool, AppError> {
        if self.fence.is_fenced(code) || self.aggregator.is_pending(code) {
            return Ok(false);
        }

        if let Ok(Some(_)) = self.cache.get_url(code).await {
            return Ok(false);
        }

        let exists = self
            .store_policy
            .run("exists", self.repository.exists(code))
            .await?;
        Ok(!exists)
    }

    fn record_collision(&self, code: &str, attempt: usize) {
        metrics::counter!("code_collisions_total").increment(1);
        warn!(code, attempt, "Short code collision");
    }
}

fn not_found(code: &str) -> AppError {
    AppError::not_found("Short URL not found", json!({ "code": code }))
}
