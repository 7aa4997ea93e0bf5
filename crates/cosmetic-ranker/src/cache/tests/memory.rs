use std::time::Duration;

use super::common::*;
use crate::cache::{CacheBackend, MemoryBackend, MemoryCacheConfig};

const MINUTE: Duration = Duration::from_secs(60);

#[tokio::test(start_paused = true)]
async fn entries_expire_after_their_ttl() {
    let cache = memory(10);
    assert!(cache
        .set("k", bytes("v"), Duration::from_secs(1), &[])
        .await
        .unwrap());

    tokio::time::advance(Duration::from_millis(500)).await;
    let hit = cache.get("k").await.unwrap().expect("visible before ttl");
    assert_eq!(&*hit.bytes, b"v");
    assert_eq!(hit.remaining_ttl, Duration::from_millis(500));

    tokio::time::advance(Duration::from_millis(600)).await;
    assert!(cache.get("k").await.unwrap().is_none());
    assert!(cache.is_empty(), "expired entry is removed on access");

    let stats = cache.stats().await;
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.expirations, 1);
}

#[tokio::test]
async fn inserting_past_capacity_evicts_least_recently_used() {
    let cache = memory(3);
    for key in ["a", "b", "c"] {
        cache.set(key, bytes(key), MINUTE, &[]).await.unwrap();
    }
    // refresh "a" so "b" becomes the oldest
    assert!(cache.get("a").await.unwrap().is_some());

    cache.set("d", bytes("d"), MINUTE, &[]).await.unwrap();

    assert_eq!(cache.len(), 3);
    assert!(cache.get("b").await.unwrap().is_none());
    for key in ["a", "c", "d"] {
        assert!(cache.get(key).await.unwrap().is_some(), "{key} kept");
    }
    assert_eq!(cache.stats().await.evictions, 1);
}

#[tokio::test]
async fn overwriting_a_key_does_not_evict() {
    let cache = memory(2);
    cache.set("a", bytes("1"), MINUTE, &[]).await.unwrap();
    cache.set("b", bytes("2"), MINUTE, &[]).await.unwrap();
    cache.set("a", bytes("3"), MINUTE, &[]).await.unwrap();

    assert_eq!(cache.stats().await.evictions, 0);
    assert_eq!(&*cache.get("a").await.unwrap().unwrap().bytes, b"3");
}

#[tokio::test]
async fn memory_limit_evicts_until_total_fits() {
    let cache = MemoryBackend::new(MemoryCacheConfig {
        max_entries: 100,
        max_memory_bytes: 30,
    });
    cache.set("k1", bytes("0123456789"), MINUTE, &[]).await.unwrap();
    cache.set("k2", bytes("0123456789"), MINUTE, &[]).await.unwrap();
    cache.set("k3", bytes("0123456789"), MINUTE, &[]).await.unwrap();

    let stats = cache.stats().await;
    assert!(stats.bytes <= 30, "bytes in use: {}", stats.bytes);
    assert_eq!(stats.entries, 2);
    assert!(cache.get("k1").await.unwrap().is_none());
}

#[tokio::test]
async fn oversized_values_are_refused() {
    let cache = MemoryBackend::new(MemoryCacheConfig {
        max_entries: 10,
        max_memory_bytes: 8,
    });
    let stored = cache
        .set("big", bytes("way more than eight bytes"), MINUTE, &[])
        .await
        .unwrap();

    assert!(!stored);
    assert!(cache.is_empty());
}

#[tokio::test]
async fn tag_invalidation_removes_every_tagged_key() {
    let cache = memory(10);
    cache.set("k1", bytes("v"), MINUTE, &tags(&["t"])).await.unwrap();
    cache.set("k2", bytes("v"), MINUTE, &tags(&["t", "u"])).await.unwrap();
    cache.set("k3", bytes("v"), MINUTE, &tags(&["u"])).await.unwrap();

    let removed = cache.invalidate_by_tags(&tags(&["t"])).await.unwrap();

    assert_eq!(removed, 2);
    assert!(cache.get("k1").await.unwrap().is_none());
    assert!(cache.get("k2").await.unwrap().is_none());
    assert!(cache.get("k3").await.unwrap().is_some());
    assert_eq!(cache.invalidate_by_tags(&tags(&["t"])).await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn expired_tagged_entries_still_count_as_invalidated() {
    let cache = memory(10);
    cache
        .set("k1", bytes("v"), Duration::from_secs(1), &tags(&["t"]))
        .await
        .unwrap();
    tokio::time::advance(Duration::from_secs(2)).await;

    assert_eq!(cache.invalidate_by_tags(&tags(&["t"])).await.unwrap(), 1);
}

#[tokio::test]
async fn pattern_invalidation_matches_globs() {
    let cache = memory(10);
    for key in ["score:1:abc", "score:2:abc", "rec:abc"] {
        cache.set(key, bytes("v"), MINUTE, &[]).await.unwrap();
    }

    assert_eq!(cache.invalidate_by_pattern("score:*").await.unwrap(), 2);
    assert!(cache.get("rec:abc").await.unwrap().is_some());
}

#[tokio::test(start_paused = true)]
async fn sweep_drops_only_expired_entries() {
    let cache = memory(10);
    cache
        .set("short", bytes("v"), Duration::from_secs(1), &[])
        .await
        .unwrap();
    cache.set("long", bytes("v"), MINUTE, &[]).await.unwrap();
    tokio::time::advance(Duration::from_secs(5)).await;

    assert_eq!(cache.sweep_expired().await.unwrap(), 1);
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn clear_reports_removed_count_and_resets_usage() {
    let cache = memory(10);
    cache.set("a", bytes("v"), MINUTE, &tags(&["t"])).await.unwrap();
    cache.set("b", bytes("v"), MINUTE, &[]).await.unwrap();

    assert_eq!(cache.clear().await.unwrap(), 2);
    let stats = cache.stats().await;
    assert_eq!(stats.entries, 0);
    assert_eq!(stats.bytes, 0);
    assert_eq!(cache.invalidate_by_tags(&tags(&["t"])).await.unwrap(), 0);
}
