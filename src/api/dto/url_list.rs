//! DTOs for the owner's URL list and related endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::{ShortUrl, UserId};

#[derive(Debug, Serialize, Deserialize)]
pub struct UrlListResponse {
    pub urls: Vec<UrlItem>,
}

/// One short URL as shown to its owner.
#[derive(Debug, Serialize, Deserialize)]
pub struct UrlItem {
    pub code: String,
    #[serde(rename = "originURL")]
    pub origin_url: String,
    /// Hits already flushed to the store.
    pub hits: i64,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl From<ShortUrl> for UrlItem {
    fn from(short_url: ShortUrl) -> Self {
        Self {
            code: short_url.code,
            origin_url: short_url.origin_url,
            hits: short_url.hits,
            created_at: short_url.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub deleted: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthCheckResponse {
    #[serde(rename = "userId")]
    pub user_id: UserId,
}
