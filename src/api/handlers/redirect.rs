//! Handler for short URL redirect.

use axum::{
    extract::{Path, State},
    response::Redirect,
};
use tracing::debug;

use crate::error::AppError;
use crate::state::AppState;
use crate::utils::url_validator::location_for;

/// Redirects a short code to its origin URL.
///
/// # Endpoint
///
/// `GET /api/shortener/r/{code}`
///
/// Resolution goes through [`crate::application::services::RedirectResolver`]:
/// cache first, then the store. Each successful redirect counts one hit,
/// flushed to the store in the background. URLs holding spaces or non-ASCII
/// characters are sent percent-encoded (host punycoded) so the header stays a
/// valid URI.
///
/// # Errors
///
/// Returns 404 Not Found if the code does not exist or was deleted.
/// Returns 503 Service Unavailable if the store cannot be reached.
pub async fn redirect_handler(
    Path(code): Path<String>,
    State(state): State<AppState>,
) -> Result<Redirect, AppError> {
    let (origin_url, source) = state.resolver.resolve_with_source(&code).await?;
    debug!(code = %code, source = source.as_str(), "Redirecting");

    Ok(Redirect::temporary(&location_for(&origin_url)))
}
