//! Handler for the shorten endpoint.

use axum::{Extension, Json, extract::State};
use validator::Validate;

use crate::api::dto::shorten::{ShortenRequest, ShortenResponse};
use crate::api::middleware::CurrentUser;
use crate::error::AppError;
use crate::state::AppState;

/// Creates a short URL owned by the current user.
///
/// # Endpoint
///
/// `POST /api/shortener/`
///
/// # Request Body
///
/// ```json
/// { "url": "https://example.com/some/page" }
/// ```
///
/// # Response
///
/// ```json
/// {
///   "url": "aB3dE5fG",
///   "shortUrl": "http://localhost:8080/api/shortener/r/aB3dE5fG"
/// }
/// ```
///
/// # Errors
///
/// Returns 400 Bad Request for an empty or invalid URL.
/// Returns 401 Unauthorized without a valid session.
pub async fn shorten_handler(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Json(payload): Json<ShortenRequest>,
) -> Result<Json<ShortenResponse>, AppError> {
    payload.validate()?;

    let short_url = state.shortener.create(user_id, &payload.url).await?;

    Ok(Json(ShortenResponse {
        short_url: state.short_url(&short_url.code),
        url: short_url.code,
    }))
}
