//! Short-lived record of recently deleted codes.

use moka::Expiry;
use moka::sync::Cache;
use std::time::{Duration, Instant};

/// How long one fenced code stays fenced.
#[derive(Debug, Clone, Copy)]
struct FenceEntry {
    ttl: Duration,
}

/// Expires each code after its own window; re-marking never shortens it.
struct FenceExpiry;

impl Expiry<String, FenceEntry> for FenceExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &FenceEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &FenceEntry,
        _updated_at: Instant,
        duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(duration_until_expiry.map_or(value.ttl, |left| left.max(value.ttl)))
    }
}

/// Remembers deleted codes for a bounded window.
///
/// A redirect that read the store just before a delete committed could
/// otherwise write the stale URL back into the cache. The resolver checks the
/// fence after populating the cache and the code generator refuses fenced
/// codes, so a deleted alias stays unreachable and is not handed out again
/// while stale state for it may still exist.
#[derive(Clone)]
pub struct DeletionFence {
    codes: Cache<String, FenceEntry>,
    window: Duration,
    stale_entry_window: Duration,
}

impl DeletionFence {
    /// `window` must cover the longest time a store lookup can be in flight.
    pub fn new(window: Duration) -> Self {
        Self {
            codes: Cache::builder()
                .expire_after(FenceExpiry)
                .max_capacity(1_000_000)
                .build(),
            window,
            stale_entry_window: window,
        }
    }

    /// Sets how long a code whose cache entry could not be removed stays
    /// fenced. Should be the cache TTL.
    pub fn with_stale_entry_window(mut self, ttl: Duration) -> Self {
        self.stale_entry_window = ttl.max(self.window);
        self
    }

    pub fn mark(&self, code: &str) {
        self.mark_for(code, self.window);
    }

    /// Fences `code` until any cache entry left behind for it has expired.
    pub fn mark_stale(&self, code: &str) {
        self.mark_for(code, self.stale_entry_window);
    }

    /// Lifts the fence, for a delete that did not go through.
    pub fn unmark(&self, code: &str) {
        self.codes.invalidate(code);
    }

    pub fn is_fenced(&self, code: &str) -> bool {
        self.codes.contains_key(code)
    }

    fn mark_for(&self, code: &str, ttl: Duration) {
        self.codes.insert(code.to_string(), FenceEntry { ttl });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_and_check() {
        let fence = DeletionFence::new(Duration::from_secs(60));
        assert!(!fence.is_fenced("aB3dE5fG"));

        fence.mark("aB3dE5fG");
        assert!(fence.is_fenced("aB3dE5fG"));
        assert!(!fence.is_fenced("zzzzzzzz"));
    }

    #[test]
    fn test_fence_expires() {
        let fence = DeletionFence::new(Duration::from_millis(50));
        fence.mark("aB3dE5fG");

        std::thread::sleep(Duration::from_millis(150));
        fence.codes.run_pending_tasks();

        assert!(!fence.is_fenced("aB3dE5fG"));
    }

    #[test]
    fn test_unmark_lifts_fence() {
        let fence = DeletionFence::new(Duration::from_secs(60));
        fence.mark("aB3dE5fG");

        fence.unmark("aB3dE5fG");
        assert!(!fence.is_fenced("aB3dE5fG"));
    }

    #[test]
    fn test_stale_mark_outlives_regular_window() {
        let fence = DeletionFence::new(Duration::from_millis(50))
            .with_stale_entry_window(Duration::from_secs(60));
        fence.mark_stale("aB3dE5fG");
        // A later regular mark must not shorten it.
        fence.mark("aB3dE5fG");
        fence.mark("zzzzzzzz");

        std::thread::sleep(Duration::from_millis(150));
        fence.codes.run_pending_tasks();

        assert!(fence.is_fenced("aB3dE5fG"));
        assert!(!fence.is_fenced("zzzzzzzz"));
    }
}
