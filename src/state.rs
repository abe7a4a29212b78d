use std::sync::Arc;

use crate::application::services::{RedirectResolver, SessionService, ShortenerService};
use crate::domain::hit_aggregator::HitAggregator;
use crate::domain::repositories::ShortUrlRepository;
use crate::infrastructure::cache::CacheService;

/// Shared handles given to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub shortener: Arc<ShortenerService>,
    pub resolver: Arc<RedirectResolver>,
    pub sessions: Arc<SessionService>,
    pub aggregator: Arc<HitAggregator>,
    pub repository: Arc<dyn ShortUrlRepository>,
    pub cache: Arc<dyn CacheService>,
    pub base_url: String,
}

impl AppState {
    /// Public short URL for `code`.
    pub fn short_url(&self, code: &str) -> String {
        format!("{}/api/shortener/r/{}", self.base_url.trim_end_matches('/'), code)
    }
}
