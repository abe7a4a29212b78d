//! Repository trait for short URL data access.

use crate::domain::entities::{NewShortUrl, ShortUrl, UserId};
use crate::error::AppError;
use async_trait::async_trait;

/// Durable store contract for short URLs.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgShortUrlRepository`] - PostgreSQL implementation
/// - [`crate::infrastructure::persistence::MemoryShortUrlRepository`] - in-process map
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ShortUrlRepository: Send + Sync {
    /// Inserts a new short URL with `hits = 0`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Conflict`] if the code is already taken.
    /// Returns [`AppError::Internal`] or [`AppError::Unavailable`] on database errors.
    async fn insert(&self, new_short_url: NewShortUrl) -> Result<ShortUrl, AppError>;

    /// Finds a short URL by its code.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] or [`AppError::Unavailable`] on database errors.
    async fn find_by_code(&self, code: &str) -> Result<Option<ShortUrl>, AppError>;

    /// Returns true if a record with this code exists.
    async fn exists(&self, code: &str) -> Result<bool, AppError>;

    /// Lists every short URL owned by `owner_id`, newest first.
    async fn list_by_owner(&self, owner_id: UserId) -> Result<Vec<ShortUrl>, AppError>;

    /// Hard-deletes a short URL.
    ///
    /// Returns `Ok(true)` if a record was removed, `Ok(false)` if none existed.
    async fn delete(&self, code: &str) -> Result<bool, AppError>;

    /// Atomically adds `delta` to the record's hit counter.
    ///
    /// The update is additive (`hits = hits + delta`), never an overwrite.
    /// Returns `Ok(false)` without side effects if the record does not exist.
    async fn increment_hits(&self, code: &str, delta: u64) -> Result<bool, AppError>;

    /// Connectivity check for the health endpoint.
    async fn ping(&self) -> Result<(), AppError>;
}
