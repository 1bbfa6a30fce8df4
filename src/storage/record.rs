//! Durable short-URL record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::storage::StorageError;

/// A short code and the URL it redirects to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortUrlRecord {
    pub code: String,
    pub target: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub visit_count: u64,
}

impl ShortUrlRecord {
    /// Create a record that expires `ttl` from now.
    pub fn new(code: &str, target: &str, ttl: Duration) -> Result<Self, StorageError> {
        let created_at = Utc::now();
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|_| StorageError::InvalidRecord(format!("ttl out of range for '{code}'")))?;
        Self::with_times(code, target, created_at, created_at + ttl)
    }

    /// Create a record with explicit timestamps.
    pub fn with_times(
        code: &str,
        target: &str,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<Self, StorageError> {
        if code.is_empty() {
            return Err(StorageError::InvalidRecord("code must not be empty".into()));
        }
        if target.is_empty() {
            return Err(StorageError::InvalidRecord("target must not be empty".into()));
        }
        if expires_at <= created_at {
            return Err(StorageError::InvalidRecord(format!(
                "'{code}' must expire after it is created"
            )));
        }
        Ok(Self {
            code: code.to_string(),
            target: target.to_string(),
            created_at,
            expires_at,
            visit_count: 0,
        })
    }

    /// Freshness predicate applied by every durable read.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    /// Time left before expiry, `None` once expired.
    pub fn remaining_ttl(&self, now: DateTime<Utc>) -> Option<Duration> {
        (self.expires_at - now).to_std().ok().filter(|d| !d.is_zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_must_follow_creation() {
        let now = Utc::now();
        assert!(ShortUrlRecord::with_times("a", "https://x", now, now).is_err());
        assert!(ShortUrlRecord::new("a", "https://x", Duration::ZERO).is_err());
        assert!(ShortUrlRecord::new("", "https://x", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_freshness() {
        let now = Utc::now();
        let record = ShortUrlRecord::with_times(
            "gh",
            "https://github.com",
            now - chrono::Duration::days(2),
            now - chrono::Duration::days(1),
        )
        .unwrap();
        assert!(!record.is_active(now));
        assert!(record.remaining_ttl(now).is_none());

        let record = ShortUrlRecord::new("gh", "https://github.com", Duration::from_secs(3600)).unwrap();
        assert!(record.is_active(Utc::now()));
        let ttl = record.remaining_ttl(Utc::now()).unwrap();
        assert!(ttl <= Duration::from_secs(3600) && ttl > Duration::from_secs(3590));
    }
}
