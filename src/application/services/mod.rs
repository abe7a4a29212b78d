//! Business logic services for the application layer.

pub mod redirect_resolver;
pub mod session_service;
pub mod shortener_service;
pub mod store_policy;

pub use redirect_resolver::{RedirectResolver, ResolveSource};
pub use session_service::SessionService;
pub use shortener_service::ShortenerService;
pub use store_policy::StorePolicy;
