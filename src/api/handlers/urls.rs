//! Handlers for the owner's URL management endpoints.

use axum::{
    Extension, Json,
    extract::{Path, State},
};

use crate::api::dto::url_list::{AuthCheckResponse, DeleteResponse, UrlItem, UrlListResponse};
use crate::api::middleware::CurrentUser;
use crate::error::AppError;
use crate::state::AppState;

/// Lists the current user's short URLs, newest first.
///
/// # Endpoint
///
/// `GET /api/user/url/list`
///
/// Hit counts lag live traffic by up to one flush interval.
pub async fn list_urls_handler(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<Json<UrlListResponse>, AppError> {
    let urls = state.shortener.list(user_id).await?;

    Ok(Json(UrlListResponse {
        urls: urls.into_iter().map(UrlItem::from).collect(),
    }))
}

/// Deletes one of the current user's short URLs.
///
/// # Endpoint
///
/// `DELETE /api/user/url/r/{code}`
///
/// # Errors
///
/// Returns 404 Not Found when the code does not exist or belongs to another
/// user; the two cases are indistinguishable to the caller.
/// Returns 503 Service Unavailable if the store delete timed out; nothing is changed then.
pub async fn delete_url_handler(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(code): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    match state.shortener.delete(user_id, &code).await {
        Ok(()) => Ok(Json(DeleteResponse { deleted: code })),
        Err(AppError::Forbidden { .. }) => Err(AppError::not_found(
            "Short URL not found",
            serde_json::json!({ "code": code }),
        )),
        Err(e) => Err(e),
    }
}

/// Confirms the session and returns the user id it carries.
///
/// # Endpoint
///
/// `GET /api/user/authCheck`
pub async fn auth_check_handler(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Json<AuthCheckResponse> {
    Json(AuthCheckResponse { user_id })
}
