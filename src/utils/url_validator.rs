//! Origin URL validation.
//!
//! URLs are checked but never rewritten on the way in: the stored and
//! resolved URL is exactly the string the owner submitted. Only the
//! `Location` header gets a URI-safe serialization, and only when the stored
//! string contains characters a URI cannot carry.

use std::borrow::Cow;
use url::Url;

/// Longest accepted origin URL, in bytes.
pub const MAX_URL_LENGTH: usize = 2048;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum UrlValidationError {
    #[error("URL must not be empty")]
    Empty,

    #[error("URL exceeds {MAX_URL_LENGTH} bytes")]
    TooLong,

    #[error("Invalid URL format: {0}")]
    InvalidFormat(String),

    #[error("Only HTTP and HTTPS protocols are allowed")]
    UnsupportedProtocol,

    #[error("URL must include a host")]
    MissingHost,
}

/// Validates an origin URL submitted for shortening.
///
/// # Rules
///
/// 1. Not empty or whitespace-only
/// 2. At most [`MAX_URL_LENGTH`] bytes
/// 3. Absolute and parseable (relative references fail to parse)
/// 4. Scheme is `http` or `https`
/// 5. Has a non-empty host
///
/// Rejects `javascript:`, `data:`, `file:` and similar schemes.
///
/// # Examples
///
/// ```ignore
/// assert!(validate_origin_url("https://example.com/Path?q=1").is_ok());
/// assert_eq!(validate_origin_url(""), Err(UrlValidationError::Empty));
/// assert_eq!(validate_origin_url("ftp://x.org"), Err(UrlValidationError::UnsupportedProtocol));
/// ```
pub fn validate_origin_url(input: &str) -> Result<(), UrlValidationError> {
    if input.trim().is_empty() {
        return Err(UrlValidationError::Empty);
    }

    if input.len() > MAX_URL_LENGTH {
        return Err(UrlValidationError::TooLong);
    }

    let url = Url::parse(input).map_err(|e| UrlValidationError::InvalidFormat(e.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        _ => return Err(UrlValidationError::UnsupportedProtocol),
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(()),
        _ => Err(UrlValidationError::MissingHost),
    }
}

/// Returns the value to send in a `Location` header for `origin`.
///
/// Strings made only of URI characters are sent as stored. Anything else
/// (spaces, non-ASCII hosts or paths) goes through [`Url`] serialization,
/// which punycodes the host and percent-encodes the rest.
pub fn location_for(origin: &str) -> Cow<'_, str> {
    if origin.bytes().all(is_uri_byte) {
        return Cow::Borrowed(origin);
    }

    match Url::parse(origin) {
        Ok(url) => Cow::Owned(url.into()),
        Err(_) => Cow::Borrowed(origin),
    }
}

fn is_uri_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"-._~:/?#[]@!$&'()*+,;=%".contains(&b)
}
