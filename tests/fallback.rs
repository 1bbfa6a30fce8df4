//! Cache-first lookup and degradation behavior against flaky storage tiers.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use shortlink_gateway::error::{GatewayError, TierStatus};
use shortlink_gateway::health::{CacheProbe, DurableProbe, ServiceHealthTracker};
use shortlink_gateway::redirect::{FallbackResolver, LookupSource};
use shortlink_gateway::storage::{CacheStore, CACHE_BACKEND, DURABLE_BACKEND};

mod common;

use common::{FlakyCache, FlakyStore};

struct Tiers {
    cache: FlakyCache,
    store: FlakyStore,
    health: ServiceHealthTracker,
    resolver: FallbackResolver,
}

async fn tiers() -> Tiers {
    let cache = FlakyCache::default();
    let store = FlakyStore::default();
    let health = ServiceHealthTracker::new();
    health.register(CACHE_BACKEND, Arc::new(CacheProbe(Arc::new(cache.clone()))), Duration::from_secs(1));
    health.register(DURABLE_BACKEND, Arc::new(DurableProbe(Arc::new(store.clone()))), Duration::from_secs(1));
    health.probe_all().await;

    let resolver = FallbackResolver::new(
        Arc::new(cache.clone()),
        Arc::new(store.clone()),
        health.clone(),
        "shorturl:",
        Duration::from_millis(500),
        Duration::from_millis(500),
    );
    Tiers { cache, store, health, resolver }
}

#[tokio::test]
async fn test_key_in_both_tiers_served_from_cache_and_counted_once() {
    let t = tiers().await;
    t.store.seed("abc123", "https://example.com/a").await;
    t.cache.set("shorturl:abc123", "https://example.com/a", Duration::from_secs(60)).await.unwrap();

    let result = t.resolver.resolve("abc123").await;
    assert!(result.found);
    assert_eq!(result.source, LookupSource::Cache);
    assert_eq!(result.value.as_deref(), Some("https://example.com/a"));

    assert!(common::eventually(|| t.store.inner.visit_count("abc123") == Some(1)).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(t.store.increments.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cache_miss_falls_back_to_durable() {
    let t = tiers().await;
    t.store.seed("abc123", "https://example.com/a").await;

    let result = t.resolver.resolve("abc123").await;
    assert_eq!(result.source, LookupSource::Durable);
    assert_eq!(result.value.as_deref(), Some("https://example.com/a"));
    assert!(result.health.cache && result.health.durable);
}

#[tokio::test]
async fn test_absent_key_is_a_normal_miss() {
    let t = tiers().await;

    let result = t.resolver.resolve("missing").await;
    assert!(!result.found);
    assert_eq!(result.source, LookupSource::None);
    assert!(result.value.is_none());
    assert_eq!(t.resolver.lookup("missing").await.unwrap(), None);
}

#[tokio::test]
async fn test_cache_error_degrades_to_durable_and_marks_cache_down() {
    let t = tiers().await;
    t.store.seed("abc123", "https://example.com/a").await;
    t.cache.fail(true);

    let result = t.resolver.resolve("abc123").await;
    assert_eq!(result.source, LookupSource::Durable);
    assert!(!result.health.cache);

    let cache_health = t.health.health(CACHE_BACKEND).unwrap();
    assert!(!cache_health.connected);
    assert_eq!(
        cache_health.last_error.as_deref(),
        Some("store unavailable: connection reset by peer")
    );
}

#[tokio::test]
async fn test_no_tier_answering_is_reported_as_unavailable() {
    let t = tiers().await;
    t.cache.fail(true);
    t.store.fail(true);

    let result = t.resolver.resolve("abc123").await;
    assert!(!result.found);
    assert_eq!(result.source, LookupSource::None);

    match t.resolver.lookup("abc123").await {
        Err(GatewayError::BackendUnavailable { cache, durable }) => {
            assert_eq!(cache, TierStatus::Disconnected);
            assert_eq!(durable, TierStatus::Disconnected);
        }
        other => panic!("expected BackendUnavailable, got {other:?}"),
    }
}

#[tokio::test]
async fn test_cache_miss_with_durable_down_is_not_a_miss() {
    let t = tiers().await;
    t.health.mark_failure(DURABLE_BACKEND, "connection refused");

    let err = t.resolver.lookup("abc123").await.unwrap_err();
    assert_eq!(err.code(), "SHORT_URL_UNAVAILABLE");
}

#[tokio::test]
async fn test_visit_increment_failure_never_reaches_caller() {
    let t = tiers().await;
    t.store.seed("abc123", "https://example.com/a").await;
    t.store.fail_increments(true);

    let result = t.resolver.resolve("abc123").await;
    assert!(result.found);
    assert_eq!(result.source, LookupSource::Durable);

    assert!(common::eventually(|| !t.health.is_connected(DURABLE_BACKEND)).await);
    assert_eq!(t.store.inner.visit_count("abc123"), Some(0));
}
