//! API route configuration.

use crate::api::handlers::{
    auth_check_handler, delete_url_handler, list_urls_handler, redirect_handler, shorten_handler,
};
use crate::state::AppState;
use axum::{
    Router,
    routing::{delete, get, post},
};

/// Routes reachable without a session.
///
/// # Endpoints
///
/// - `GET /shortener/r/{code}` - Redirect to the origin URL
pub fn public_routes() -> Router<AppState> {
    Router::new().route("/shortener/r/{code}", get(redirect_handler))
}

/// Routes requiring a session, see [`crate::api::middleware::auth`].
///
/// # Endpoints
///
/// - `POST   /shortener/`        - Create a short URL (also without trailing slash)
/// - `GET    /user/url/list`     - List the caller's short URLs
/// - `DELETE /user/url/r/{code}` - Delete one of the caller's short URLs
/// - `GET    /user/authCheck`    - Return the caller's user id
pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/shortener", post(shorten_handler))
        .route("/shortener/", post(shorten_handler))
        .route("/user/url/list", get(list_urls_handler))
        .route("/user/url/r/{code}", delete(delete_url_handler))
        .route("/user/authCheck", get(auth_check_handler))
}
