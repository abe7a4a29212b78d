//! DTOs for the shorten endpoint.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Request to shorten a single URL.
#[derive(Debug, Deserialize, Validate)]
pub struct ShortenRequest {
    /// The origin URL. Checked for scheme and host by the service.
    #[serde(default)]
    #[validate(length(min = 1, message = "URL must not be empty"))]
    pub url: String,
}

/// Result of a successful shorten.
///
/// `url` carries the short code; `shortUrl` is the full public link.
#[derive(Debug, Serialize, Deserialize)]
pub struct ShortenResponse {
    pub url: String,
    #[serde(rename = "shortUrl")]
    pub short_url: String,
}
