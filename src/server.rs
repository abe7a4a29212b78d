//! HTTP server initialization and runtime setup.
//!
//! Handles database connections, cache setup, the hit flush worker, and the
//! Axum server lifecycle.

use crate::application::services::{
    RedirectResolver, SessionService, ShortenerService, StorePolicy,
};
use crate::config::{CacheBackend, Config};
use crate::domain::deletion_fence::DeletionFence;
use crate::domain::hit_aggregator::{HitAggregator, run_flush_worker};
use crate::domain::repositories::ShortUrlRepository;
use crate::infrastructure::cache::{CacheService, MemoryCache, NullCache, RedisCache, TimeoutCache};
use crate::infrastructure::persistence::PgShortUrlRepository;
use crate::routes::app_router;
use crate::state::AppState;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Runs the HTTP server with the given configuration.
///
/// Initializes:
/// - PostgreSQL connection pool
/// - Apply migrations
/// - Cache backend (memory, Redis or none), bounded by a timeout
/// - Background hit flush worker
/// - Axum HTTP server with graceful shutdown
///
/// # Errors
///
/// Returns an error if:
/// - Database connection or migration fails
/// - Server bind fails
/// - Server runtime error occurs
pub async fn run(config: Config) -> Result<()> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_connect_timeout))
        .idle_timeout(Duration::from_secs(config.db_idle_timeout))
        .max_lifetime(Duration::from_secs(config.db_max_lifetime))
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    let repository: Arc<dyn ShortUrlRepository> =
        Arc::new(PgShortUrlRepository::new(Arc::new(pool)));

    let cache = build_cache(&config).await;
    let cache: Arc<dyn CacheService> = Arc::new(TimeoutCache::new(cache, config.cache_timeout()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (state, flush_worker) = build_state(&config, repository, cache, shutdown_rx);
    tracing::info!(
        interval_ms = config.flush_interval_ms,
        "Hit flush worker started"
    );

    let app = app_router(state);

    let addr: SocketAddr = config.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped, flushing pending hits");
    let _ = shutdown_tx.send(true);
    flush_worker.await.context("Hit flush worker panicked")?;

    Ok(())
}

/// Wires services around a repository and cache and spawns the flush worker.
///
/// Returns the state for the router and the worker handle; the worker exits
/// after a final flush once `shutdown` flips to `true`.
pub fn build_state(
    config: &Config,
    repository: Arc<dyn ShortUrlRepository>,
    cache: Arc<dyn CacheService>,
    shutdown: watch::Receiver<bool>,
) -> (AppState, tokio::task::JoinHandle<()>) {
    let store_policy = StorePolicy {
        timeout: config.store_timeout(),
        retry_attempts: config.store_retry_attempts,
    };

    let aggregator = Arc::new(HitAggregator::new(
        repository.clone(),
        cache.clone(),
        config.store_timeout(),
    ));
    let fence = DeletionFence::new(config.deletion_fence_window())
        .with_stale_entry_window(config.cache_ttl());

    let shortener = ShortenerService::new(
        repository.clone(),
        cache.clone(),
        aggregator.clone(),
        fence.clone(),
        store_policy,
        config.cache_warm_on_create,
    );
    let resolver = RedirectResolver::new(
        repository.clone(),
        cache.clone(),
        aggregator.clone(),
        fence,
        store_policy,
    );
    let sessions = SessionService::new(
        config.session_secret.clone(),
        chrono::Duration::seconds(config.session_ttl_seconds as i64),
    );

    let flush_worker = tokio::spawn(run_flush_worker(
        aggregator.clone(),
        config.flush_interval(),
        shutdown,
    ));

    let state = AppState {
        shortener: Arc::new(shortener),
        resolver: Arc::new(resolver),
        sessions: Arc::new(sessions),
        aggregator,
        repository,
        cache,
        base_url: config.base_url.clone(),
    };

    (state, flush_worker)
}

async fn build_cache(config: &Config) -> Arc<dyn CacheService> {
    let memory = || -> Arc<dyn CacheService> {
        Arc::new(MemoryCache::new(config.cache_capacity, config.cache_ttl()))
    };

    match config.cache_backend {
        CacheBackend::None => {
            tracing::info!("Cache disabled (NullCache)");
            Arc::new(NullCache::new())
        }
        CacheBackend::Memory => {
            tracing::info!("Cache enabled (in-process)");
            memory()
        }
        CacheBackend::Redis => {
            let Some(redis_url) = config.redis_url.as_deref() else {
                tracing::warn!("Redis cache selected without REDIS_URL. Using in-process cache.");
                return memory();
            };

            match RedisCache::connect(redis_url, config.cache_ttl()).await {
                Ok(redis) => {
                    tracing::info!("Cache enabled (Redis)");
                    Arc::new(redis)
                }
                Err(e) => {
                    tracing::warn!("Failed to connect to Redis: {}. Using in-process cache.", e);
                    memory()
                }
            }
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
