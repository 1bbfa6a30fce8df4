//! Storage tier contracts.
//!
//! # Data Flow
//! ```text
//! Redirect lookup:
//!     → CacheStore (fast, volatile, keyed by prefix + code)
//!     → DurableStore (source of truth, owns visit counts)
//! ```
//!
//! The gateway core only talks to these traits. `memory.rs` provides
//! in-process implementations; a networked cache or database adapter plugs
//! in by implementing the same traits.

pub mod memory;
pub mod record;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub use memory::{MemoryCache, MemoryStore};
pub use record::ShortUrlRecord;

/// Health-tracker key for the cache tier.
pub const CACHE_BACKEND: &str = "cache";

/// Health-tracker key for the durable tier.
pub const DURABLE_BACKEND: &str = "durable";

/// Errors raised by a storage tier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("short code '{0}' already exists")]
    Conflict(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("store error: {0}")]
    Backend(String),
}

/// Key/value cache with per-entry expiry.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// `GET key`.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// `SETEX key ttl value`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StorageError>;

    /// `DEL key`. Returns whether the key existed.
    async fn delete(&self, key: &str) -> Result<bool, StorageError>;

    /// `EXISTS key`.
    async fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// `PING`.
    async fn ping(&self) -> Result<(), StorageError>;
}

/// Durable short-URL table.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Fetch a record by code. Expired records are never returned.
    async fn get(&self, code: &str) -> Result<Option<ShortUrlRecord>, StorageError>;

    /// Insert a new record; an existing code is a [`StorageError::Conflict`].
    async fn insert(&self, record: ShortUrlRecord) -> Result<(), StorageError>;

    /// `visits = visits + 1`. A missing code is not an error.
    async fn increment_visits(&self, code: &str) -> Result<(), StorageError>;

    /// Delete by code. Returns whether a row was removed.
    async fn delete(&self, code: &str) -> Result<bool, StorageError>;

    /// Liveness query (`SELECT 1`).
    async fn ping(&self) -> Result<(), StorageError>;
}
