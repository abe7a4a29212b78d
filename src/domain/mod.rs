//! Domain layer containing business entities and the hit accounting core.
//!
//! # Architecture
//!
//! - [`entities`] - Core business data structures
//! - [`repositories`] - Data access trait definitions
//! - [`hit_aggregator`] - Batched write-back of redirect hit counts
//! - [`deletion_fence`] - Recently deleted codes, kept out of cache and code allocation
//!
//! # Hit Accounting Flow
//!
//! 1. A redirect resolves a code and calls [`hit_aggregator::HitAggregator::increment`]
//! 2. The increment lands in an in-process pending cell (and the cache's local delta)
//! 3. [`hit_aggregator::run_flush_worker`] periodically applies merged deltas with
//!    [`repositories::ShortUrlRepository::increment_hits`]
//! 4. Failed applies stay pending and are retried on the next cycle

pub mod deletion_fence;
pub mod entities;
pub mod hit_aggregator;
pub mod repositories;
