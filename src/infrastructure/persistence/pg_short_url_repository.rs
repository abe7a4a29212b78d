//! PostgreSQL implementation of the short URL repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;

use crate::domain::entities::{NewShortUrl, ShortUrl, UserId};
use crate::domain::repositories::ShortUrlRepository;
use crate::error::AppError;

#[derive(sqlx::FromRow)]
struct ShortUrlRow {
    code: String,
    origin_url: String,
    owner_id: i64,
    hits: i64,
    created_at: DateTime<Utc>,
}

impl From<ShortUrlRow> for ShortUrl {
    fn from(row: ShortUrlRow) -> Self {
        ShortUrl::new(
            row.code,
            row.origin_url,
            row.owner_id,
            row.hits,
            row.created_at,
        )
    }
}

/// PostgreSQL repository for short URLs.
///
/// Uses bound parameters for every query. Hit increments are single
/// `UPDATE ... SET hits = hits + $2` statements, so concurrent flushes compose
/// without lost updates.
pub struct PgShortUrlRepository {
    pool: Arc<PgPool>,
}

impl PgShortUrlRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ShortUrlRepository for PgShortUrlRepository {
    async fn insert(&self, new_short_url: NewShortUrl) -> Result<ShortUrl, AppError> {
        let row = sqlx::query_as::<_, ShortUrlRow>(
            r#"
            INSERT INTO short_urls (code, origin_url, owner_id)
            VALUES ($1, $2, $3)
            RETURNING code, origin_url, owner_id, hits, created_at
            "#,
        )
        .bind(&new_short_url.code)
        .bind(&new_short_url.origin_url)
        .bind(new_short_url.owner_id)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(row.into())
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<ShortUrl>, AppError> {
        let row = sqlx::query_as::<_, ShortUrlRow>(
            r#"
            SELECT code, origin_url, owner_id, hits, created_at
            FROM short_urls
            WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(Into::into))
    }

    async fn exists(&self, code: &str) -> Result<bool, AppError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM short_urls WHERE code = $1)")
                .bind(code)
                .fetch_one(self.pool.as_ref())
                .await?;

        Ok(exists)
    }

    async fn list_by_owner(&self, owner_id: UserId) -> Result<Vec<ShortUrl>, AppError> {
        let rows = sqlx::query_as::<_, ShortUrlRow>(
            r#"
            SELECT code, origin_url, owner_id, hits, created_at
            FROM short_urls
            WHERE owner_id = $1
            ORDER BY created_at DESC, code
            "#,
        )
        .bind(owner_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete(&self, code: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM short_urls WHERE code = $1")
            .bind(code)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn increment_hits(&self, code: &str, delta: u64) -> Result<bool, AppError> {
        let delta = i64::try_from(delta).map_err(|_| {
            AppError::bad_request(
                "Hit delta out of range",
                serde_json::json!({ "delta": delta }),
            )
        })?;

        let result = sqlx::query("UPDATE short_urls SET hits = hits + $2 WHERE code = $1")
            .bind(code)
            .bind(delta)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }
}
