//! In-memory implementation of the short URL repository.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::json;

use crate::domain::entities::{NewShortUrl, ShortUrl, UserId};
use crate::domain::repositories::ShortUrlRepository;
use crate::error::AppError;

/// Short URL store kept in a sharded concurrent map.
///
/// Used by the HTTP integration tests and for running the service without
/// PostgreSQL. Hit increments take the shard write lock, so they are atomic per
/// code just like the SQL `hits = hits + delta` update.
#[derive(Debug, Default)]
pub struct MemoryShortUrlRepository {
    records: DashMap<String, ShortUrl>,
}

impl MemoryShortUrlRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl ShortUrlRepository for MemoryShortUrlRepository {
    async fn insert(&self, new_short_url: NewShortUrl) -> Result<ShortUrl, AppError> {
        match self.records.entry(new_short_url.code.clone()) {
            Entry::Occupied(_) => Err(AppError::conflict(
                "Unique constraint violation",
                json!({ "constraint": "short_urls_pkey" }),
            )),
            Entry::Vacant(slot) => {
                let record = ShortUrl::new(
                    new_short_url.code,
                    new_short_url.origin_url,
                    new_short_url.owner_id,
                    0,
                    Utc::now(),
                );
                slot.insert(record.clone());
                Ok(record)
            }
        }
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<ShortUrl>, AppError> {
        Ok(self.records.get(code).map(|r| r.value().clone()))
    }

    async fn exists(&self, code: &str) -> Result<bool, AppError> {
        Ok(self.records.contains_key(code))
    }

    async fn list_by_owner(&self, owner_id: UserId) -> Result<Vec<ShortUrl>, AppError> {
        let mut owned: Vec<ShortUrl> = self
            .records
            .iter()
            .filter(|r| r.is_owned_by(owner_id))
            .map(|r| r.value().clone())
            .collect();

        owned.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.code.cmp(&b.code))
        });
        Ok(owned)
    }

    async fn delete(&self, code: &str) -> Result<bool, AppError> {
        Ok(self.records.remove(code).is_some())
    }

    async fn increment_hits(&self, code: &str, delta: u64) -> Result<bool, AppError> {
        let delta = i64::try_from(delta)
            .map_err(|_| AppError::bad_request("Hit delta out of range", json!({ "delta": delta })))?;

        match self.records.get_mut(code) {
            Some(mut record) => {
                record.hits = record.hits.saturating_add(delta);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_short_url(code: &str, owner_id: UserId) -> NewShortUrl {
        NewShortUrl {
            code: code.to_string(),
            origin_url: "https://example.com".to_string(),
            owner_id,
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let repo = MemoryShortUrlRepository::new();
        repo.insert(new_short_url("aB3dE5fG", 1)).await.unwrap();

        let found = repo.find_by_code("aB3dE5fG").await.unwrap().unwrap();
        assert_eq!(found.origin_url, "https://example.com");
        assert_eq!(found.hits, 0);
        assert!(repo.exists("aB3dE5fG").await.unwrap());
    }

    #[tokio::test]
    async fn test_insert_conflict() {
        let repo = MemoryShortUrlRepository::new();
        repo.insert(new_short_url("aB3dE5fG", 1)).await.unwrap();

        let err = repo.insert(new_short_url("aB3dE5fG", 2)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_increment_hits_is_additive() {
        let repo = MemoryShortUrlRepository::new();
        repo.insert(new_short_url("aB3dE5fG", 1)).await.unwrap();

        assert!(repo.increment_hits("aB3dE5fG", 3).await.unwrap());
        assert!(repo.increment_hits("aB3dE5fG", 2).await.unwrap());

        let found = repo.find_by_code("aB3dE5fG").await.unwrap().unwrap();
        assert_eq!(found.hits, 5);
    }

    #[tokio::test]
    async fn test_increment_hits_missing_record_is_noop() {
        let repo = MemoryShortUrlRepository::new();
        assert!(!repo.increment_hits("missing1", 3).await.unwrap());
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn test_list_by_owner_filters() {
        let repo = MemoryShortUrlRepository::new();
        repo.insert(new_short_url("owner1aa", 1)).await.unwrap();
        repo.insert(new_short_url("owner1bb", 1)).await.unwrap();
        repo.insert(new_short_url("owner2aa", 2)).await.unwrap();

        let owned = repo.list_by_owner(1).await.unwrap();
        assert_eq!(owned.len(), 2);
        assert!(owned.iter().all(|r| r.owner_id == 1));
    }

    #[tokio::test]
    async fn test_delete() {
        let repo = MemoryShortUrlRepository::new();
        repo.insert(new_short_url("aB3dE5fG", 1)).await.unwrap();

        assert!(repo.delete("aB3dE5fG").await.unwrap());
        assert!(!repo.delete("aB3dE5fG").await.unwrap());
        assert!(repo.find_by_code("aB3dE5fG").await.unwrap().is_none());
    }
}
