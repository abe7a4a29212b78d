//! Top-level router configuration.
//!
//! # Route Structure
//!
//! - `GET  /health`                   - Health check: store, cache, pending hits (public)
//! - `GET  /api/shortener/r/{code}`   - Short URL redirect (public)
//! - `/api/*`                         - Owner endpoints (session required)
//!
//! # Middleware
//!
//! - **Tracing** - Structured request/response logging
//! - **Authentication** - `accessToken` cookie or Bearer session token

use crate::api;
use crate::api::handlers::health_handler;
use crate::api::middleware::{auth, tracing};
use crate::state::AppState;
use axum::routing::get;
use axum::{Router, middleware};

/// Constructs the application router with all routes and middleware.
pub fn app_router(state: AppState) -> Router {
    let protected = api::routes::protected_routes()
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::layer));

    let api_router = Router::new()
        .merge(api::routes::public_routes())
        .merge(protected);

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api", api_router)
        .with_state(state)
        .layer(tracing::layer())
}
