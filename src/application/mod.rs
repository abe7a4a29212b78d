//! Application layer services implementing business logic.
//!
//! Services coordinate the repository, the cache and the hit aggregator, and
//! give HTTP handlers a small API.
//!
//! # Available Services
//!
//! - [`services::shortener_service::ShortenerService`] - Create, list and delete short URLs
//! - [`services::redirect_resolver::RedirectResolver`] - Cache-aside code resolution with hit counting
//! - [`services::session_service::SessionService`] - Signed session tokens

pub mod services;
