//! Cache-first short code resolution with durable fallback.
//!
//! # Algorithm
//! ```text
//! cache connected?   → GET prefix+code   (error: mark cache down, continue)
//! still no value and
//! durable connected? → SELECT unexpired  (error: mark durable down)
//! hit                → detached visit increment if durable connected
//! ```
//!
//! Cache is always tried before durable. Tier errors never reach the caller
//! of [`FallbackResolver::resolve`]; they only update health.

use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{GatewayError, GatewayResult, TierStatus};
use crate::health::ServiceHealthTracker;
use crate::observability::metrics;
use crate::storage::{CacheStore, DurableStore, StorageError, CACHE_BACKEND, DURABLE_BACKEND};

/// Which tier served a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LookupSource {
    Cache,
    Durable,
    None,
}

impl LookupSource {
    fn as_str(&self) -> &'static str {
        match self {
            LookupSource::Cache => "cache",
            LookupSource::Durable => "durable",
            LookupSource::None => "none",
        }
    }
}

/// Tier connectivity observed at the end of a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TierHealth {
    pub cache: bool,
    pub durable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupResult {
    pub found: bool,
    pub value: Option<String>,
    pub source: LookupSource,
    pub health: TierHealth,
}

/// Outcome of asking one tier.
enum TierRead {
    Hit(String),
    Miss,
    Skipped,
    Failed,
}

pub struct FallbackResolver {
    cache: Arc<dyn CacheStore>,
    durable: Arc<dyn DurableStore>,
    health: ServiceHealthTracker,
    key_prefix: String,
    cache_timeout: Duration,
    durable_timeout: Duration,
}

impl FallbackResolver {
    pub fn new(
        cache: Arc<dyn CacheStore>,
        durable: Arc<dyn DurableStore>,
        health: ServiceHealthTracker,
        key_prefix: impl Into<String>,
        cache_timeout: Duration,
        durable_timeout: Duration,
    ) -> Self {
        Self {
            cache,
            durable,
            health,
            key_prefix: key_prefix.into(),
            cache_timeout,
            durable_timeout,
        }
    }

    /// Current connectivity of both tiers.
    pub fn tier_health(&self) -> TierHealth {
        TierHealth {
            cache: self.health.is_connected(CACHE_BACKEND),
            durable: self.health.is_connected(DURABLE_BACKEND),
        }
    }

    /// Resolve `code`. Never fails; a miss is `found = false`.
    pub async fn resolve(&self, code: &str) -> LookupResult {
        self.resolve_tiers(code).await.0
    }

    /// Resolve `code`, telling a normal miss apart from a degraded lookup.
    ///
    /// A cache miss is not authoritative: the lookup is degraded unless the
    /// durable tier answered or some tier produced a hit.
    pub async fn lookup(&self, code: &str) -> GatewayResult<Option<LookupResult>> {
        let (result, durable_answered) = self.resolve_tiers(code).await;
        if result.found {
            return Ok(Some(result));
        }
        if durable_answered {
            return Ok(None);
        }
        Err(GatewayError::BackendUnavailable {
            cache: TierStatus::from_connected(result.health.cache),
            durable: TierStatus::from_connected(result.health.durable),
        })
    }

    async fn resolve_tiers(&self, code: &str) -> (LookupResult, bool) {
        let mut durable_answered = false;

        let mut hit = match self.read_cache(code).await {
            TierRead::Hit(value) => Some((value, LookupSource::Cache)),
            _ => None,
        };

        if hit.is_none() {
            match self.read_durable(code).await {
                TierRead::Hit(value) => {
                    durable_answered = true;
                    hit = Some((value, LookupSource::Durable));
                }
                TierRead::Miss => durable_answered = true,
                TierRead::Skipped | TierRead::Failed => {}
            }
        }

        let (found, value, source) = match hit {
            Some((value, source)) => {
                self.spawn_visit_increment(code);
                (true, Some(value), source)
            }
            None => (false, None, LookupSource::None),
        };

        metrics::record_lookup(source.as_str());
        let result = LookupResult {
            found,
            value,
            source,
            health: self.tier_health(),
        };
        (result, durable_answered)
    }

    async fn read_cache(&self, code: &str) -> TierRead {
        if !self.health.is_connected(CACHE_BACKEND) {
            tracing::debug!(backend = CACHE_BACKEND, code, "Cache unavailable, skipping cache lookup");
            return TierRead::Skipped;
        }

        let key = format!("{}{}", self.key_prefix, code);
        let result = self.timed(CACHE_BACKEND, self.cache_timeout, self.cache.get(&key)).await;
        match result {
            Ok(Some(value)) => {
                tracing::debug!(backend = CACHE_BACKEND, code, "Found in cache");
                TierRead::Hit(value)
            }
            Ok(None) => {
                tracing::debug!(backend = CACHE_BACKEND, code, "Not found in cache");
                TierRead::Miss
            }
            Err(_) => TierRead::Failed,
        }
    }

    async fn read_durable(&self, code: &str) -> TierRead {
        if !self.health.is_connected(DURABLE_BACKEND) {
            tracing::debug!(backend = DURABLE_BACKEND, code, "Durable store unavailable, cannot fall back");
            return TierRead::Skipped;
        }

        let result = self
            .timed(DURABLE_BACKEND, self.durable_timeout, self.durable.get(code))
            .await;
        match result {
            Ok(Some(record)) => {
                tracing::debug!(backend = DURABLE_BACKEND, code, "Found in durable store");
                TierRead::Hit(record.target)
            }
            Ok(None) => {
                tracing::debug!(backend = DURABLE_BACKEND, code, "Not found in durable store");
                TierRead::Miss
            }
            Err(_) => TierRead::Failed,
        }
    }

    /// Run a tier call under its timeout and record the outcome.
    async fn timed<T>(
        &self,
        tier: &str,
        timeout: Duration,
        call: impl Future<Output = Result<T, StorageError>>,
    ) -> Result<T, StorageError> {
        let result = match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StorageError::Unavailable(format!(
                "timed out after {}ms",
                timeout.as_millis()
            ))),
        };
        match &result {
            Ok(_) => self.health.mark_success(tier),
            Err(e) => {
                tracing::warn!(backend = tier, error = %e, "Tier lookup failed");
                self.health.mark_failure(tier, &e.to_string());
            }
        }
        result
    }

    /// Detached `visits + 1`. The response never waits on it and its failure
    /// only reaches the log and the durable health record.
    fn spawn_visit_increment(&self, code: &str) {
        if !self.health.is_connected(DURABLE_BACKEND) {
            tracing::debug!(backend = DURABLE_BACKEND, code, "Durable store unavailable, skipping visit count");
            metrics::record_visit_increment("skipped");
            return;
        }

        let durable = self.durable.clone();
        let health = self.health.clone();
        let timeout = self.durable_timeout;
        let code = code.to_string();

        tokio::spawn(async move {
            let result = match tokio::time::timeout(timeout, durable.increment_visits(&code)).await {
                Ok(result) => result,
                Err(_) => Err(StorageError::Unavailable(format!(
                    "timed out after {}ms",
                    timeout.as_millis()
                ))),
            };
            match result {
                Ok(()) => {
                    health.mark_success(DURABLE_BACKEND);
                    metrics::record_visit_increment("ok");
                }
                Err(e) => {
                    tracing::error!(backend = DURABLE_BACKEND, code = %code, error = %e, "Failed to increment visit count");
                    health.mark_failure(DURABLE_BACKEND, &e.to_string());
                    metrics::record_visit_increment("failed");
                }
            }
        });
    }
}
