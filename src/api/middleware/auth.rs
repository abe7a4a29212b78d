//! Session authentication middleware.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header::COOKIE},
    middleware::Next,
    response::Response,
};
use axum_auth::AuthBearer;

use crate::{domain::entities::UserId, error::AppError, state::AppState};

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "accessToken";

/// The authenticated caller, inserted into request extensions by [`layer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub UserId);

/// Authenticates requests using a signed session token.
///
/// # Token Sources
///
/// Checked in order:
///
/// ```text
/// Cookie: accessToken=<token>
/// Authorization: Bearer <token>
/// ```
///
/// On success the resolved [`CurrentUser`] is added to request extensions.
///
/// # Errors
///
/// Returns `401 Unauthorized` if no token is present or the token is
/// malformed, forged or expired.
pub async fn layer(
    State(st): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = req.into_parts();

    let token = match session_cookie(&parts.headers) {
        Some(token) => token,
        None => {
            let AuthBearer(token) = AuthBearer::from_request_parts(&mut parts, &())
                .await
                .map_err(|_| {
                    AppError::unauthorized(
                        "Unauthorized",
                        serde_json::json!({"reason": "Session cookie or bearer token is required"}),
                    )
                })?;
            token
        }
    };

    let user_id = st.sessions.current_user_id(&token)?;

    let mut req = Request::from_parts(parts, body);
    req.extensions_mut().insert(CurrentUser(user_id));

    Ok(next.run(req).await)
}

/// Extracts the `accessToken` value from the `Cookie` header, if any.
fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .find_map(|cookie| {
            let mut parts = cookie.trim().splitn(2, '=');
            match (parts.next(), parts.next()) {
                (Some(SESSION_COOKIE), Some(value)) if !value.is_empty() => {
                    Some(value.to_string())
                }
                _ => None,
            }
        })
}
