//! Publishing and removing short links across both tiers.
//!
//! The durable store is the source of truth and must accept every write.
//! The cache is warmed on a best-effort basis: its failures are logged and
//! recorded as health, never returned.

use chrono::Utc;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

use crate::health::ServiceHealthTracker;
use crate::storage::{
    CacheStore, DurableStore, ShortUrlRecord, StorageError, CACHE_BACKEND, DURABLE_BACKEND,
};

const MAX_CODE_ATTEMPTS: usize = 5;

/// Random six-character hex short code.
pub fn generate_code() -> String {
    format!("{:06x}", rand::thread_rng().gen_range(0..0x100_0000u32))
}

pub struct LinkWriter {
    cache: Arc<dyn CacheStore>,
    durable: Arc<dyn DurableStore>,
    health: ServiceHealthTracker,
    key_prefix: String,
}

impl LinkWriter {
    pub fn new(
        cache: Arc<dyn CacheStore>,
        durable: Arc<dyn DurableStore>,
        health: ServiceHealthTracker,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            durable,
            health,
            key_prefix: key_prefix.into(),
        }
    }

    fn key(&self, code: &str) -> String {
        format!("{}{}", self.key_prefix, code)
    }

    /// Store `record` durably, then cache it for its remaining lifetime.
    pub async fn publish(&self, record: ShortUrlRecord) -> Result<(), StorageError> {
        if !self.health.is_connected(DURABLE_BACKEND) {
            return Err(StorageError::Unavailable("durable store is disconnected".into()));
        }

        let code = record.code.clone();
        let target = record.target.clone();
        let ttl = record.remaining_ttl(Utc::now());

        match self.durable.insert(record).await {
            Ok(()) => self.health.mark_success(DURABLE_BACKEND),
            Err(StorageError::Conflict(code)) => {
                self.health.mark_success(DURABLE_BACKEND);
                return Err(StorageError::Conflict(code));
            }
            Err(e) => {
                tracing::error!(backend = DURABLE_BACKEND, code = %code, error = %e, "Failed to store short link");
                self.health.mark_failure(DURABLE_BACKEND, &e.to_string());
                return Err(e);
            }
        }
        tracing::info!(code = %code, "Short link stored");

        let Some(ttl) = ttl else {
            return Ok(());
        };
        if self.health.is_connected(CACHE_BACKEND) {
            self.warm_cache(&code, &target, ttl).await;
        } else {
            tracing::debug!(backend = CACHE_BACKEND, code = %code, "Cache unavailable, skipping cache write");
        }
        Ok(())
    }

    async fn warm_cache(&self, code: &str, target: &str, ttl: Duration) {
        match self.cache.set(&self.key(code), target, ttl).await {
            Ok(()) => self.health.mark_success(CACHE_BACKEND),
            Err(e) => {
                tracing::warn!(backend = CACHE_BACKEND, code, error = %e, "Failed to cache short link");
                self.health.mark_failure(CACHE_BACKEND, &e.to_string());
            }
        }
    }

    /// Delete `code` from the durable store, then from the cache.
    pub async fn remove(&self, code: &str) -> Result<bool, StorageError> {
        let removed = match self.durable.delete(code).await {
            Ok(removed) => {
                self.health.mark_success(DURABLE_BACKEND);
                removed
            }
            Err(e) => {
                self.health.mark_failure(DURABLE_BACKEND, &e.to_string());
                return Err(e);
            }
        };

        if self.health.is_connected(CACHE_BACKEND) {
            if let Err(e) = self.cache.delete(&self.key(code)).await {
                tracing::warn!(backend = CACHE_BACKEND, code, error = %e, "Failed to evict short link");
                self.health.mark_failure(CACHE_BACKEND, &e.to_string());
            }
        }
        Ok(removed)
    }

    /// Whether `code` is already in use.
    pub async fn is_taken(&self, code: &str) -> Result<bool, StorageError> {
        if self.health.is_connected(CACHE_BACKEND) {
            match self.cache.exists(&self.key(code)).await {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(e) => self.health.mark_failure(CACHE_BACKEND, &e.to_string()),
            }
        }

        if !self.health.is_connected(DURABLE_BACKEND) {
            return Err(StorageError::Unavailable("durable store is disconnected".into()));
        }
        match self.durable.get(code).await {
            Ok(record) => {
                self.health.mark_success(DURABLE_BACKEND);
                Ok(record.is_some())
            }
            Err(e) => {
                self.health.mark_failure(DURABLE_BACKEND, &e.to_string());
                Err(e)
            }
        }
    }

    /// Pick a generated short code that is not already in use.
    pub async fn allocate_code(&self) -> Result<String, StorageError> {
        self.allocate_code_with(generate_code).await
    }

    async fn allocate_code_with(
        &self,
        mut next: impl FnMut() -> String,
    ) -> Result<String, StorageError> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = next();
            if !self.is_taken(&code).await? {
                return Ok(code);
            }
            tracing::debug!(code = %code, "Generated short code already in use");
        }
        Err(StorageError::Backend(format!(
            "no free short code after {MAX_CODE_ATTEMPTS} attempts"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::{CacheProbe, DurableProbe};
    use crate::storage::{MemoryCache, MemoryStore};

    async fn writer() -> (LinkWriter, MemoryCache, MemoryStore, ServiceHealthTracker) {
        let cache = MemoryCache::new();
        let store = MemoryStore::new();
        let health = ServiceHealthTracker::new();
        health.register(CACHE_BACKEND, Arc::new(CacheProbe(Arc::new(cache.clone()))), Duration::from_secs(1));
        health.register(DURABLE_BACKEND, Arc::new(DurableProbe(Arc::new(store.clone()))), Duration::from_secs(1));
        health.probe_all().await;
        let writer = LinkWriter::new(
            Arc::new(cache.clone()),
            Arc::new(store.clone()),
            health.clone(),
            "shorturl:",
        );
        (writer, cache, store, health)
    }

    #[test]
    fn test_generated_codes_are_six_hex_chars() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_hexdigit()));
        }
    }

    #[tokio::test]
    async fn test_publish_writes_both_tiers() {
        let (writer, cache, store, _) = writer().await;
        let record = ShortUrlRecord::new("abc", "https://example.com", Duration::from_secs(3600)).unwrap();
        writer.publish(record.clone()).await.unwrap();

        assert_eq!(cache.get("shorturl:abc").await.unwrap().as_deref(), Some("https://example.com"));
        assert!(store.get("abc").await.unwrap().is_some());
        assert!(writer.is_taken("abc").await.unwrap());
        assert_eq!(writer.publish(record).await, Err(StorageError::Conflict("abc".into())));
    }

    #[tokio::test]
    async fn test_publish_skips_unhealthy_cache() {
        let (writer, cache, store, health) = writer().await;
        health.mark_failure(CACHE_BACKEND, "connection reset");
        let record = ShortUrlRecord::new("abc", "https://example.com", Duration::from_secs(3600)).unwrap();
        writer.publish(record).await.unwrap();

        assert!(cache.is_empty());
        assert!(store.get("abc").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_publish_requires_durable() {
        let (writer, cache, _, health) = writer().await;
        health.mark_failure(DURABLE_BACKEND, "connection refused");
        let record = ShortUrlRecord::new("abc", "https://example.com", Duration::from_secs(3600)).unwrap();
        assert!(matches!(writer.publish(record).await, Err(StorageError::Unavailable(_))));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_allocate_skips_codes_in_use() {
        let (writer, _, _, _) = writer().await;
        let record = ShortUrlRecord::new("aaaaaa", "https://example.com", Duration::from_secs(3600)).unwrap();
        writer.publish(record).await.unwrap();

        let mut candidates = vec!["bbbbbb", "aaaaaa"];
        let code = writer
            .allocate_code_with(|| candidates.pop().unwrap().to_string())
            .await
            .unwrap();
        assert_eq!(code, "bbbbbb");

        let result = writer.allocate_code_with(|| "aaaaaa".to_string()).await;
        assert!(matches!(result, Err(StorageError::Backend(_))));
    }

    #[tokio::test]
    async fn test_is_taken_requires_durable() {
        let (writer, _, _, health) = writer().await;
        health.mark_failure(DURABLE_BACKEND, "connection refused");
        assert!(matches!(writer.is_taken("abc").await, Err(StorageError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_remove_evicts_both() {
        let (writer, cache, _, _) = writer().await;
        let record = ShortUrlRecord::new("abc", "https://example.com", Duration::from_secs(3600)).unwrap();
        writer.publish(record).await.unwrap();

        assert!(writer.remove("abc").await.unwrap());
        assert!(cache.is_empty());
        assert!(!writer.is_taken("abc").await.unwrap());
        assert!(!writer.remove("abc").await.unwrap());
    }
}
