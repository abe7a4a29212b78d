//! Short code generation and shape checks.

use rand::Rng;
use rand::distr::Alphanumeric;

/// Number of characters in a generated code.
pub const CODE_LENGTH: usize = 8;

/// Generates a random short code.
///
/// Draws [`CODE_LENGTH`] characters from the 62-symbol alphabet `[A-Za-z0-9]`
/// using the thread-local CSPRNG. Uniqueness is not checked here; see
/// [`crate::application::services::ShortenerService`].
///
/// # Examples
///
/// ```ignore
/// let code = generate_code();
/// assert_eq!(code.len(), 8);
/// assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
/// ```
pub fn generate_code() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(CODE_LENGTH)
        .map(char::from)
        .collect()
}

/// Returns true if `code` could have been produced by [`generate_code`].
///
/// The resolver uses this to answer obviously bogus paths without touching
/// the cache or the store.
pub fn is_well_formed_code(code: &str) -> bool {
    code.len() == CODE_LENGTH && code.bytes().all(|b| b.is_ascii_alphanumeric())
}
