#![allow(dead_code)]

use axum_test::TestServer;
use hitlink::config::{CacheBackend, Config};
use hitlink::domain::entities::{NewShortUrl, UserId};
use hitlink::domain::repositories::ShortUrlRepository;
use hitlink::infrastructure::cache::MemoryCache;
use hitlink::infrastructure::persistence::MemoryShortUrlRepository;
use hitlink::routes::app_router;
use hitlink::server::build_state;
use hitlink::state::AppState;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

pub const SESSION_SECRET: &str = "test-session-secret";

pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub repo: Arc<MemoryShortUrlRepository>,
    pub cache: Arc<MemoryCache>,
    shutdown: watch::Sender<bool>,
}

impl TestApp {
    /// `Cookie` header value carrying a session for `user_id`.
    pub fn cookie_for(&self, user_id: UserId) -> String {
        format!("accessToken={}", self.state.sessions.issue(user_id))
    }

    /// `Authorization` header value carrying a session for `user_id`.
    pub fn bearer_for(&self, user_id: UserId) -> String {
        format!("Bearer {}", self.state.sessions.issue(user_id))
    }

    /// Applies pending hits to the store, as the background worker would.
    pub async fn flush(&self) {
        self.state.aggregator.flush_once().await;
    }
}

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://localhost/unused".to_string(),
        redis_url: None,
        cache_backend: CacheBackend::Memory,
        listen_addr: "127.0.0.1:0".to_string(),
        base_url: "http://short.test".to_string(),
        log_level: "info".to_string(),
        log_format: "text".to_string(),
        cache_ttl_seconds: 3600,
        cache_capacity: 10_000,
        cache_timeout_ms: 250,
        cache_warm_on_create: true,
        // Tests flush explicitly.
        flush_interval_ms: 3_600_000,
        store_timeout_ms: 1000,
        store_retry_attempts: 1,
        session_secret: SESSION_SECRET.to_string(),
        session_ttl_seconds: 3600,
        db_max_connections: 1,
        db_connect_timeout: 1,
        db_idle_timeout: 600,
        db_max_lifetime: 1800,
    }
}

/// Builds the full router over the in-memory store and cache.
pub fn spawn_app() -> TestApp {
    spawn_app_with(test_config())
}

pub fn spawn_app_with(config: Config) -> TestApp {
    let repo = Arc::new(MemoryShortUrlRepository::new());
    let cache = Arc::new(MemoryCache::new(config.cache_capacity, config.cache_ttl()));
    let (shutdown, shutdown_rx) = watch::channel(false);

    let (state, _worker) = build_state(&config, repo.clone(), cache.clone(), shutdown_rx);
    let server = TestServer::new(app_router(state.clone())).unwrap();

    TestApp {
        server,
        state,
        repo,
        cache,
        shutdown,
    }
}

pub async fn create_short_url(repo: &MemoryShortUrlRepository, code: &str, url: &str, owner: UserId) {
    repo.insert(NewShortUrl {
        code: code.to_string(),
        origin_url: url.to_string(),
        owner_id: owner,
    })
    .await
    .unwrap();
}

pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}
