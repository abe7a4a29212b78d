//! Signed session tokens identifying the current user.

use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;

use crate::domain::entities::UserId;
use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

/// Issues and verifies session tokens.
///
/// A token has the form `{user_id}.{expires_at}.{signature}` where
/// `expires_at` is a Unix timestamp and `signature` is the hex-encoded
/// HMAC-SHA256 of `{user_id}.{expires_at}` keyed by the server secret.
/// Tokens are stateless; nothing is stored server-side.
pub struct SessionService {
    signing_secret: String,
    default_ttl: Duration,
}

impl SessionService {
    /// Creates a new session service.
    ///
    /// # Arguments
    ///
    /// - `signing_secret` - HMAC key; tokens signed with another key are rejected
    /// - `default_ttl` - lifetime of tokens issued by [`Self::issue`]
    pub fn new(signing_secret: String, default_ttl: Duration) -> Self {
        Self {
            signing_secret,
            default_ttl,
        }
    }

    fn sign(&self, payload: &str) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(self.signing_secret.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(payload.as_bytes());
        mac
    }

    /// Issues a token for `user_id` valid for the default TTL.
    pub fn issue(&self, user_id: UserId) -> String {
        self.issue_with_ttl(user_id, self.default_ttl)
    }

    pub fn issue_with_ttl(&self, user_id: UserId, ttl: Duration) -> String {
        let expires_at = (Utc::now() + ttl).timestamp();
        let payload = format!("{user_id}.{expires_at}");
        let signature = hex::encode(self.sign(&payload).finalize().into_bytes());
        format!("{payload}.{signature}")
    }

    /// Resolves the user a token was issued for.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Unauthorized`] if the token is malformed, carries a
    /// bad signature, or has expired.
    pub fn current_user_id(&self, token: &str) -> Result<UserId, AppError> {
        let invalid = |reason: &str| {
            AppError::unauthorized("Unauthorized", json!({ "reason": reason }))
        };

        let (payload, signature) = token
            .rsplit_once('.')
            .ok_or_else(|| invalid("Malformed session token"))?;
        let (user_id, expires_at) = payload
            .split_once('.')
            .ok_or_else(|| invalid("Malformed session token"))?;

        let signature = hex::decode(signature).map_err(|_| invalid("Malformed session token"))?;
        self.sign(payload)
            .verify_slice(&signature)
            .map_err(|_| invalid("Invalid session signature"))?;

        let user_id: UserId = user_id
            .parse()
            .map_err(|_| invalid("Malformed session token"))?;
        let expires_at: i64 = expires_at
            .parse()
            .map_err(|_| invalid("Malformed session token"))?;

        if expires_at <= Utc::now().timestamp() {
            return Err(invalid("Session expired"));
        }

        Ok(user_id)
    }
}
