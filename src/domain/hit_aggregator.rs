//! Write-back aggregation of redirect hits.
//!
//! Redirect handlers call [`HitAggregator::increment`], which only touches
//! in-process state. A single background task ([`run_flush_worker`]) applies the
//! accumulated deltas to the durable store on a fixed interval.
//!
//! # Claim / settle protocol
//!
//! Each dirty code owns one [`PendingCell`] with two slots:
//!
//! - `queued` - hits counted since the last claim
//! - `claimed` - hits taken by the flush currently applying them
//!
//! A flush claims (`queued -> claimed`) under the cell lock, performs one
//! additive store update, then settles the claim:
//!
//! | outcome           | effect                                              |
//! |-------------------|-----------------------------------------------------|
//! | applied           | `claimed` cleared; cell removed if nothing queued   |
//! | record not found  | cell removed, delta discarded                       |
//! | store failure     | `claimed` returned to `queued`, retried next cycle  |
//!
//! A claim is settled at most once, so a delta is applied to the store at most
//! once per successful write. Cells carry an epoch: if the code is dropped
//! while its claim is in flight, the settle finds no cell with that epoch and
//! does nothing, even if a new cell was created for the same code meanwhile.

use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::domain::repositories::ShortUrlRepository;
use crate::error::AppError;
use crate::infrastructure::cache::CacheService;

#[derive(Debug)]
struct PendingCell {
    epoch: u64,
    queued: u64,
    claimed: u64,
}

impl PendingCell {
    fn is_empty(&self) -> bool {
        self.queued == 0 && self.claimed == 0
    }
}

/// A delta taken from a pending cell, waiting to be written to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub code: String,
    pub delta: u64,
    epoch: u64,
}

/// How a claimed delta ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    Applied,
    RecordMissing,
    Failed,
}

/// Totals for one flush cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlushReport {
    /// Codes whose delta reached the store.
    pub applied: usize,
    /// Codes whose record no longer exists; their delta was dropped.
    pub discarded: usize,
    /// Codes whose write failed; their delta stays queued.
    pub failed: usize,
    /// Sum of the deltas that reached the store.
    pub hits_applied: u64,
}

/// Batches per-code hit counts and writes them back to the durable store.
pub struct HitAggregator {
    repository: Arc<dyn ShortUrlRepository>,
    cache: Arc<dyn CacheService>,
    pending: DashMap<String, PendingCell>,
    next_epoch: AtomicU64,
    store_timeout: Duration,
}

impl HitAggregator {
    pub fn new(
        repository: Arc<dyn ShortUrlRepository>,
        cache: Arc<dyn CacheService>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            repository,
            cache,
            pending: DashMap::new(),
            next_epoch: AtomicU64::new(1),
            store_timeout,
        }
    }

    /// Records one hit for `code`.
    ///
    /// The pending cell is updated under its shard lock, so concurrent calls
    /// for the same code never lose a count. The cache's local delta is bumped
    /// afterwards on a best-effort basis.
    pub async fn increment(&self, code: &str) {
        {
            let mut cell = self
                .pending
                .entry(code.to_string())
                .or_insert_with(|| PendingCell {
                    epoch: self.next_epoch.fetch_add(1, Ordering::Relaxed),
                    queued: 0,
                    claimed: 0,
                });
            cell.queued += 1;
        }

        match self.cache.increment_local(code).await {
            Ok(Some(local)) => debug!(code, local_delta = local, "Hit recorded"),
            Ok(None) => debug!(code, "Hit recorded (code not cached)"),
            Err(e) => debug!(code, error = %e, "Hit recorded, cache delta not updated"),
        }
    }

    /// Discards every pending hit for `code`, including a claim in flight.
    ///
    /// Returns the number of hits dropped.
    pub fn drop_pending(&self, code: &str) -> u64 {
        match self.pending.remove(code) {
            Some((_, cell)) => {
                debug!(code, dropped = cell.queued + cell.claimed, "Pending hits dropped");
                cell.queued + cell.claimed
            }
            None => 0,
        }
    }

    /// Removes the queued hits of `code` and returns how many there were.
    ///
    /// A claim already in flight is left in place and settles normally. Pair
    /// with [`HitAggregator::restore_pending`] when the caller may need to
    /// give the hits back.
    pub fn take_queued(&self, code: &str) -> u64 {
        let taken = match self.pending.get_mut(code) {
            Some(mut cell) => std::mem::take(&mut cell.queued),
            None => return 0,
        };
        self.pending.remove_if(code, |_, cell| cell.is_empty());
        taken
    }

    /// Queues `hits` for `code` again after a [`HitAggregator::take_queued`].
    pub fn restore_pending(&self, code: &str, hits: u64) {
        if hits == 0 {
            return;
        }

        let mut cell = self
            .pending
            .entry(code.to_string())
            .or_insert_with(|| PendingCell {
                epoch: self.next_epoch.fetch_add(1, Ordering::Relaxed),
                queued: 0,
                claimed: 0,
            });
        cell.queued += hits;
        debug!(code, restored = hits, "Pending hits restored");
    }

    /// Returns true if hits for `code` are queued or being flushed.
    pub fn is_pending(&self, code: &str) -> bool {
        self.pending.contains_key(code)
    }

    /// Hits for `code` not yet confirmed by the store.
    pub fn pending_delta(&self, code: &str) -> u64 {
        self.pending
            .get(code)
            .map(|cell| cell.queued + cell.claimed)
            .unwrap_or(0)
    }

    /// Number of codes with pending hits.
    pub fn pending_codes(&self) -> usize {
        self.pending.len()
    }

    /// Moves the queued hits of `code` into its claimed slot.
    ///
    /// Returns `None` if nothing is queued.
    pub fn claim(&self, code: &str) -> Option<Claim> {
        let mut cell = self.pending.get_mut(code)?;
        if cell.queued == 0 {
            return None;
        }

        cell.claimed += cell.queued;
        cell.queued = 0;

        Some(Claim {
            code: code.to_string(),
            delta: cell.claimed,
            epoch: cell.epoch,
        })
    }

    /// Resolves a claim after the store write.
    pub fn settle(&self, claim: &Claim, outcome: FlushOutcome) {
        match outcome {
            FlushOutcome::Applied => {
                if let Some(mut cell) = self.pending.get_mut(&claim.code)
                    && cell.epoch == claim.epoch
                {
                    cell.claimed = cell.claimed.saturating_sub(claim.delta);
                }
                self.pending
                    .remove_if(&claim.code, |_, cell| {
                        cell.epoch == claim.epoch && cell.is_empty()
                    });
            }
            FlushOutcome::RecordMissing => {
                self.pending
                    .remove_if(&claim.code, |_, cell| cell.epoch == claim.epoch);
            }
            FlushOutcome::Failed => {
                if let Some(mut cell) = self.pending.get_mut(&claim.code)
                    && cell.epoch == claim.epoch
                {
                    let returned = claim.delta.min(cell.claimed);
                    cell.claimed -= returned;
                    cell.queued += returned;
                }
            }
        }
    }

    /// Runs one flush cycle over every dirty code.
    pub async fn flush_once(&self) -> FlushReport {
        let codes: Vec<String> = self.pending.iter().map(|e| e.key().clone()).collect();
        let mut report = FlushReport::default();

        for code in codes {
            let Some(claim) = self.claim(&code) else {
                continue;
            };

            let outcome = self.apply(&claim).await;
            self.settle(&claim, outcome);

            match outcome {
                FlushOutcome::Applied => {
                    report.applied += 1;
                    report.hits_applied += claim.delta;
                    metrics::counter!("hit_flush_applied_total").increment(claim.delta);

                    if let Err(e) = self.cache.settle_local(&claim.code, claim.delta).await {
                        debug!(code = %claim.code, error = %e, "Cache delta not settled");
                    }
                }
                FlushOutcome::RecordMissing => {
                    report.discarded += 1;
                    metrics::counter!("hit_flush_discarded_total").increment(claim.delta);
                    debug!(code = %claim.code, delta = claim.delta, "Discarded hits for missing record");
                }
                FlushOutcome::Failed => {
                    report.failed += 1;
                    metrics::counter!("hit_flush_failed_total").increment(1);
                }
            }
        }

        if report.applied + report.discarded + report.failed > 0 {
            debug!(
                applied = report.applied,
                discarded = report.discarded,
                failed = report.failed,
                hits = report.hits_applied,
                "Hit flush cycle finished"
            );
        }

        report
    }

    async fn apply(&self, claim: &Claim) -> FlushOutcome {
        let write = self.repository.increment_hits(&claim.code, claim.delta);

        match tokio::time::timeout(self.store_timeout, write).await {
            Ok(Ok(true)) => FlushOutcome::Applied,
            Ok(Ok(false)) => FlushOutcome::RecordMissing,
            Ok(Err(e)) => {
                warn!(code = %claim.code, delta = claim.delta, error = %e, "Hit flush failed, will retry");
                FlushOutcome::Failed
            }
            Err(_) => {
                let e = AppError::unavailable(
                    "Hit flush timed out",
                    serde_json::json!({ "timeout_ms": self.store_timeout.as_millis() as u64 }),
                );
                warn!(code = %claim.code, delta = claim.delta, error = %e, "Hit flush failed, will retry");
                FlushOutcome::Failed
            }
        }
    }
}

/// Periodically flushes pending hits until `shutdown` flips to `true`.
///
/// Runs one last flush on shutdown so hits counted before the server stopped
/// still reach the store.
pub async fn run_flush_worker(
    aggregator: Arc<HitAggregator>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                aggregator.flush_once().await;
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    let report = aggregator.flush_once().await;
    info!(
        applied = report.applied,
        failed = report.failed,
        still_pending = aggregator.pending_codes(),
        "Hit flush worker stopped"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repositories::MockShortUrlRepository;
    use crate::infrastructure::cache::{MemoryCache, NullCache};
    use crate::infrastructure::persistence::MemoryShortUrlRepository;
    use crate::domain::entities::NewShortUrl;
    use mockall::Sequence;
    use serde_json::json;

    fn aggregator_with(repository: Arc<dyn ShortUrlRepository>) -> HitAggregator {
        HitAggregator::new(repository, Arc::new(NullCache), Duration::from_secs(1))
    }

    async fn seeded_repo(code: &str) -> Arc<MemoryShortUrlRepository> {
        let repo = Arc::new(MemoryShortUrlRepository::new());
        repo.insert(NewShortUrl {
            code: code.to_string(),
            origin_url: "https://example.com".to_string(),
            owner_id: 1,
        })
        .await
        .unwrap();
        repo
    }

    #[tokio::test]
    async fn test_increment_marks_code_pending() {
        let aggregator = aggregator_with(Arc::new(MemoryShortUrlRepository::new()));

        aggregator.increment("aB3dE5fG").await;
        aggregator.increment("aB3dE5fG").await;

        assert!(aggregator.is_pending("aB3dE5fG"));
        assert_eq!(aggregator.pending_delta("aB3dE5fG"), 2);
    }

    #[tokio::test]
    async fn test_flush_applies_delta_and_clears_cell() {
        let repo = seeded_repo("aB3dE5fG").await;
        let aggregator = aggregator_with(repo.clone());

        for _ in 0..3 {
            aggregator.increment("aB3dE5fG").await;
        }
        let report = aggregator.flush_once().await;

        assert_eq!(report.applied, 1);
        assert_eq!(report.hits_applied, 3);
        assert!(!aggregator.is_pending("aB3dE5fG"));
        assert_eq!(repo.find_by_code("aB3dE5fG").await.unwrap().unwrap().hits, 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_then_flush_lose_nothing() {
        let repo = seeded_repo("aB3dE5fG").await;
        let aggregator = Arc::new(aggregator_with(repo.clone()));

        let mut handles = Vec::new();
        for _ in 0..200 {
            let aggregator = aggregator.clone();
            handles.push(tokio::spawn(async move {
                aggregator.increment("aB3dE5fG").await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        aggregator.flush_once().await;

        assert_eq!(
            repo.find_by_code("aB3dE5fG").await.unwrap().unwrap().hits,
            200
        );
    }

    #[tokio::test]
    async fn test_failed_flush_is_retried_exactly_once() {
        let mut mock_repo = MockShortUrlRepository::new();
        let mut seq = Sequence::new();

        mock_repo
            .expect_increment_hits()
            .withf(|code, delta| code == "aB3dE5fG" && *delta == 2)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(AppError::unavailable("Database unavailable", json!({}))));

        mock_repo
            .expect_increment_hits()
            .withf(|code, delta| code == "aB3dE5fG" && *delta == 3)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(true));

        let aggregator = aggregator_with(Arc::new(mock_repo));

        aggregator.increment("aB3dE5fG").await;
        aggregator.increment("aB3dE5fG").await;

        let first = aggregator.flush_once().await;
        assert_eq!(first.failed, 1);
        assert_eq!(aggregator.pending_delta("aB3dE5fG"), 2);

        // A hit arriving between cycles is merged into the retried delta.
        aggregator.increment("aB3dE5fG").await;

        let second = aggregator.flush_once().await;
        assert_eq!(second.applied, 1);
        assert_eq!(second.hits_applied, 3);
        assert!(!aggregator.is_pending("aB3dE5fG"));

        // Nothing left: a third cycle must not write again.
        let third = aggregator.flush_once().await;
        assert_eq!(third, FlushReport::default());
    }

    #[tokio::test]
    async fn test_flush_to_missing_record_is_discarded() {
        let aggregator = aggregator_with(Arc::new(MemoryShortUrlRepository::new()));

        aggregator.increment("gone1234").await;
        let report = aggregator.flush_once().await;

        assert_eq!(report.discarded, 1);
        assert_eq!(report.applied, 0);
        assert!(!aggregator.is_pending("gone1234"));
    }

    #[tokio::test]
    async fn test_drop_pending_removes_everything() {
        let aggregator = aggregator_with(Arc::new(MemoryShortUrlRepository::new()));

        aggregator.increment("aB3dE5fG").await;
        aggregator.increment("aB3dE5fG").await;

        assert_eq!(aggregator.drop_pending("aB3dE5fG"), 2);
        assert!(!aggregator.is_pending("aB3dE5fG"));
        assert_eq!(aggregator.drop_pending("aB3dE5fG"), 0);
    }

    #[tokio::test]
    async fn test_drop_during_claim_wins_over_failed_settle() {
        let aggregator = aggregator_with(Arc::new(MemoryShortUrlRepository::new()));

        aggregator.increment("aB3dE5fG").await;
        let claim = aggregator.claim("aB3dE5fG").unwrap();

        // Delete runs while the claim is in flight.
        aggregator.drop_pending("aB3dE5fG");
        aggregator.settle(&claim, FlushOutcome::Failed);

        assert!(!aggregator.is_pending("aB3dE5fG"));
    }

    #[tokio::test]
    async fn test_take_queued_then_restore_keeps_every_hit() {
        let aggregator = aggregator_with(Arc::new(MemoryShortUrlRepository::new()));

        aggregator.increment("aB3dE5fG").await;
        aggregator.increment("aB3dE5fG").await;

        assert_eq!(aggregator.take_queued("aB3dE5fG"), 2);
        assert!(!aggregator.is_pending("aB3dE5fG"));

        // A redirect lands while the hits are held back.
        aggregator.increment("aB3dE5fG").await;
        aggregator.restore_pending("aB3dE5fG", 2);

        assert_eq!(aggregator.pending_delta("aB3dE5fG"), 3);
    }

    #[tokio::test]
    async fn test_take_queued_leaves_claim_in_flight() {
        let aggregator = aggregator_with(Arc::new(MemoryShortUrlRepository::new()));

        aggregator.increment("aB3dE5fG").await;
        let claim = aggregator.claim("aB3dE5fG").unwrap();
        aggregator.increment("aB3dE5fG").await;

        assert_eq!(aggregator.take_queued("aB3dE5fG"), 1);
        assert_eq!(aggregator.pending_delta("aB3dE5fG"), 1);

        aggregator.settle(&claim, FlushOutcome::Failed);
        aggregator.restore_pending("aB3dE5fG", 1);
        assert_eq!(aggregator.pending_delta("aB3dE5fG"), 2);
    }

    #[tokio::test]
    async fn test_stale_settle_ignores_recreated_cell() {
        let aggregator = aggregator_with(Arc::new(MemoryShortUrlRepository::new()));

        aggregator.increment("aB3dE5fG").await;
        let claim = aggregator.claim("aB3dE5fG").unwrap();
        aggregator.drop_pending("aB3dE5fG");

        // A late redirect creates a fresh cell for the same code.
        aggregator.increment("aB3dE5fG").await;
        aggregator.settle(&claim, FlushOutcome::Applied);

        assert_eq!(aggregator.pending_delta("aB3dE5fG"), 1);
    }

    #[tokio::test]
    async fn test_claim_without_queued_hits() {
        let aggregator = aggregator_with(Arc::new(MemoryShortUrlRepository::new()));
        assert!(aggregator.claim("aB3dE5fG").is_none());

        aggregator.increment("aB3dE5fG").await;
        let _claim = aggregator.claim("aB3dE5fG").unwrap();
        assert!(aggregator.claim("aB3dE5fG").is_none());
        assert_eq!(aggregator.pending_delta("aB3dE5fG"), 1);
    }

    #[tokio::test]
    async fn test_flush_settles_cache_local_delta() {
        let repo = seeded_repo("aB3dE5fG").await;
        let cache = Arc::new(MemoryCache::new(100, Duration::from_secs(60)));
        cache
            .set_url("aB3dE5fG", "https://example.com", None)
            .await
            .unwrap();

        let aggregator = HitAggregator::new(repo, cache.clone(), Duration::from_secs(1));
        aggregator.increment("aB3dE5fG").await;
        aggregator.increment("aB3dE5fG").await;
        assert_eq!(cache.local_delta("aB3dE5fG"), Some(2));

        aggregator.flush_once().await;
        assert_eq!(cache.local_delta("aB3dE5fG"), Some(0));
    }

    #[tokio::test]
    async fn test_worker_flushes_on_shutdown() {
        let repo = seeded_repo("aB3dE5fG").await;
        let aggregator = Arc::new(aggregator_with(repo.clone()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let worker = tokio::spawn(run_flush_worker(
            aggregator.clone(),
            Duration::from_secs(3600),
            shutdown_rx,
        ));

        aggregator.increment("aB3dE5fG").await;
        shutdown_tx.send(true).unwrap();
        worker.await.unwrap();

        assert_eq!(repo.find_by_code("aB3dE5fG").await.unwrap().unwrap().hits, 1);
    }
}
