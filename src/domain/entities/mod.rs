//! Core domain entities.
//!
//! - [`ShortUrl`] - A stored alias with its origin URL, owner and flushed hit count
//! - [`NewShortUrl`] - Insert payload for a new alias

pub mod short_url;

pub use short_url::{NewShortUrl, ShortUrl, UserId};
