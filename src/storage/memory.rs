//! In-process storage tiers backed by `DashMap`.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::storage::{CacheStore, DurableStore, ShortUrlRecord, StorageError};

/// Cache with lazy TTL eviction.
#[derive(Clone, Default)]
pub struct MemoryCache {
    inner: Arc<DashMap<String, (String, Instant)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let now = Instant::now();
        if let Some(entry) = self.inner.get(key) {
            if entry.1 > now {
                return Ok(Some(entry.0.clone()));
            }
        }
        self.inner.remove_if(key, |_, (_, deadline)| *deadline <= now);
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StorageError> {
        self.inner
            .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.inner.remove(key).is_some())
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.get(key).await?.is_some())
    }

    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Durable table kept in memory.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<DashMap<String, ShortUrlRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current visit count, including expired records.
    pub fn visit_count(&self, code: &str) -> Option<u64> {
        self.inner.get(code).map(|r| r.visit_count)
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn get(&self, code: &str) -> Result<Option<ShortUrlRecord>, StorageError> {
        let now = Utc::now();
        Ok(self
            .inner
            .get(code)
            .filter(|r| r.is_active(now))
            .map(|r| r.value().clone()))
    }

    async fn insert(&self, record: ShortUrlRecord) -> Result<(), StorageError> {
        match self.inner.entry(record.code.clone()) {
            Entry::Occupied(_) => Err(StorageError::Conflict(record.code)),
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }

    async fn increment_visits(&self, code: &str) -> Result<(), StorageError> {
        if let Some(mut record) = self.inner.get_mut(code) {
            record.visit_count += 1;
        }
        Ok(())
    }

    async fn delete(&self, code: &str) -> Result<bool, StorageError> {
        Ok(self.inner.remove(code).is_some())
    }

    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_cache_entries_expire() {
        let cache = MemoryCache::new();
        cache.set("shorturl:a", "https://a", Duration::from_secs(10)).await.unwrap();
        assert_eq!(cache.get("shorturl:a").await.unwrap().as_deref(), Some("https://a"));
        assert!(cache.exists("shorturl:a").await.unwrap());

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(cache.get("shorturl:a").await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_store_conflict_and_visits() {
        let store = MemoryStore::new();
        let record = ShortUrlRecord::new("gh", "https://github.com", Duration::from_secs(60)).unwrap();
        store.insert(record.clone()).await.unwrap();
        assert_eq!(
            store.insert(record).await,
            Err(StorageError::Conflict("gh".into()))
        );

        store.increment_visits("gh").await.unwrap();
        store.increment_visits("gh").await.unwrap();
        store.increment_visits("missing").await.unwrap();
        assert_eq!(store.visit_count("gh"), Some(2));

        assert!(store.delete("gh").await.unwrap());
        assert_eq!(store.get("gh").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_hides_expired_records() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let expired = ShortUrlRecord::with_times(
            "old",
            "https://old.example",
            now - chrono::Duration::hours(2),
            now - chrono::Duration::hours(1),
        )
        .unwrap();
        store.insert(expired).await.unwrap();
        assert_eq!(store.get("old").await.unwrap(), None);
        assert_eq!(store.visit_count("old"), Some(0));
    }
}
