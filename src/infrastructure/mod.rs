//! Infrastructure layer for external integrations.
//!
//! This layer implements interfaces defined by the domain layer, providing
//! concrete implementations for data persistence and caching.
//!
//! # Modules
//!
//! - [`cache`] - Cache-aside backends (memory, Redis, no-op) and the timeout decorator
//! - [`persistence`] - Short URL repositories (PostgreSQL, in-memory)

pub mod cache;
pub mod persistence;
