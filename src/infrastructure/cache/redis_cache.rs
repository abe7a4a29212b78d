//! Redis-backed cache implementation.

use super::service::{CacheError, CacheResult, CacheService};
use async_trait::async_trait;
use redis::{AsyncCommands, Client, Script, aio::ConnectionManager};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info};

/// Bumps the `hits` field only when the entry exists, so an increment never
/// creates a key without a TTL.
static INCREMENT_IF_CACHED: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r#"
        if redis.call('EXISTS', KEYS[1]) == 1 then
            return redis.call('HINCRBY', KEYS[1], 'hits', 1)
        end
        return false
        "#,
    )
});

/// Subtracts a settled delta from `hits`, flooring at zero.
static SETTLE_LOCAL: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r#"
        if redis.call('EXISTS', KEYS[1]) == 0 then
            return 0
        end
        local current = tonumber(redis.call('HGET', KEYS[1], 'hits') or '0')
        local next = current - tonumber(ARGV[1])
        if next < 0 then
            next = 0
        end
        redis.call('HSET', KEYS[1], 'hits', next)
        return next
        "#,
    )
});

/// Redis cache shared by every service instance.
///
/// Each code is stored as a hash `url:{code}` with fields `url` and `hits`.
/// Uses connection pooling via `ConnectionManager`. Errors are returned to the
/// caller, which treats them as misses.
pub struct RedisCache {
    client: ConnectionManager,
    default_ttl: Duration,
    key_prefix: String,
}

impl RedisCache {
    /// Connects to Redis and validates the connection with a PING.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Connection`] if the URL is invalid, the connection
    /// cannot be established, or the PING fails.
    pub async fn connect(redis_url: &str, default_ttl: Duration) -> CacheResult<Self> {
        info!("Connecting to Redis");

        let client = Client::open(redis_url)
            .map_err(|e| CacheError::Connection(format!("Failed to create Redis client: {e}")))?;

        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| CacheError::Connection(format!("Failed to connect to Redis: {e}")))?;

        let mut test_conn = manager.clone();
        test_conn
            .ping::<()>()
            .await
            .map_err(|e| CacheError::Connection(format!("Redis PING failed: {e}")))?;

        info!("Connected to Redis");

        Ok(Self {
            client: manager,
            default_ttl,
            key_prefix: "url:".to_string(),
        })
    }

    fn build_key(&self, code: &str) -> String {
        format!("{}{}", self.key_prefix, code)
    }
}

fn op_error(op: &str, e: redis::RedisError) -> CacheError {
    CacheError::Operation(format!("Redis {op} failed: {e}"))
}

#[async_trait]
impl CacheService for RedisCache {
    async fn get_url(&self, code: &str) -> CacheResult<Option<String>> {
        let key = self.build_key(code);
        let mut conn = self.client.clone();

        let url: Option<String> = conn
            .hget(&key, "url")
            .await
            .map_err(|e| op_error("HGET", e))?;

        match &url {
            Some(_) => debug!("Cache HIT: {}", code),
            None => debug!("Cache MISS: {}", code),
        }
        Ok(url)
    }

    async fn set_url(
        &self,
        code: &str,
        origin_url: &str,
        ttl: Option<Duration>,
    ) -> CacheResult<()> {
        let key = self.build_key(code);
        let mut conn = self.client.clone();
        let ttl = ttl.unwrap_or(self.default_ttl);
        let ttl_seconds = ttl.as_secs().max(1) as i64;

        redis::pipe()
            .atomic()
            .hset(&key, "url", origin_url)
            .ignore()
            .expire(&key, ttl_seconds)
            .ignore()
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| op_error("HSET/EXPIRE", e))?;

        debug!("Cache SET: {} -> {} (TTL: {}s)", code, origin_url, ttl_seconds);
        Ok(())
    }

    async fn increment_local(&self, code: &str) -> CacheResult<Option<u64>> {
        let key = self.build_key(code);
        let mut conn = self.client.clone();

        let delta: Option<i64> = INCREMENT_IF_CACHED
            .key(&key)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| op_error("HINCRBY", e))?;

        Ok(delta.map(|d| d.max(0) as u64))
    }

    async fn settle_local(&self, code: &str, delta: u64) -> CacheResult<()> {
        let key = self.build_key(code);
        let mut conn = self.client.clone();

        SETTLE_LOCAL
            .key(&key)
            .arg(delta)
            .invoke_async::<i64>(&mut conn)
            .await
            .map_err(|e| op_error("settle", e))?;

        Ok(())
    }

    async fn invalidate(&self, code: &str) -> CacheResult<()> {
        let key = self.build_key(code);
        let mut conn = self.client.clone();

        let deleted: i32 = conn.del(&key).await.map_err(|e| op_error("DEL", e))?;
        if deleted > 0 {
            debug!("Cache INVALIDATE: {}", code);
        }
        Ok(())
    }

    async fn health_check(&self) -> bool {
        let mut conn = self.client.clone();
        conn.ping::<()>().await.is_ok()
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
