//! Short URL entity: the durable mapping from a short code to its origin URL.

use chrono::{DateTime, Utc};

/// Identifier of an authenticated user, as provided by the session layer.
pub type UserId = i64;

/// A short URL record as held by the durable store.
///
/// `hits` is the flushed count only. Hits still queued in the
/// [`crate::domain::hit_aggregator::HitAggregator`] are not reflected here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortUrl {
    pub code: String,
    pub origin_url: String,
    pub owner_id: UserId,
    pub hits: i64,
    pub created_at: DateTime<Utc>,
}

impl ShortUrl {
    pub fn new(
        code: String,
        origin_url: String,
        owner_id: UserId,
        hits: i64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            code,
            origin_url,
            owner_id,
            hits,
            created_at,
        }
    }

    /// Returns true if `user_id` created this record.
    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.owner_id == user_id
    }
}

/// Input data for inserting a new short URL.
#[derive(Debug, Clone)]
pub struct NewShortUrl {
    pub code: String,
    pub origin_url: String,
    pub owner_id: UserId,
}
