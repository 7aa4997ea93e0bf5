use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::common::*;
use crate::cache::{
    CacheBackend, CacheConfig, MemoryBackend, MemoryCacheConfig, MultiLevelCache,
};

const MINUTE: Duration = Duration::from_secs(60);

fn two_levels() -> (Arc<MemoryBackend>, Arc<FakeServer>, MultiLevelCache) {
    let front = Arc::new(memory(10));
    let server = Arc::new(FakeServer::default());
    let cache = MultiLevelCache::new(vec![
        Arc::clone(&front) as Arc<dyn CacheBackend>,
        Arc::new(remote(&server)) as Arc<dyn CacheBackend>,
    ]);
    (front, server, cache)
}

#[tokio::test]
async fn hit_on_slower_level_is_promoted() {
    let (front, server, cache) = two_levels();
    server.insert("k", "remote value", MINUTE, &tags(&["t"]));

    let value = cache.get("k").await.expect("remote hit");
    assert_eq!(&*value, b"remote value");

    let promoted = front.get("k").await.unwrap().expect("promoted into memory");
    assert_eq!(promoted.tags, tags(&["t"]));
    assert_eq!(front.invalidate_by_tags(&tags(&["t"])).await.unwrap(), 1);
}

#[tokio::test]
async fn set_writes_through_every_level() {
    let (front, server, cache) = two_levels();

    assert!(cache.set("k", b"v".to_vec(), MINUTE, &[]).await);

    assert!(front.get("k").await.unwrap().is_some());
    assert!(server.contains("k"));
    assert!(cache.delete("k").await);
    assert!(!server.contains("k"));
}

#[tokio::test]
async fn failing_level_is_treated_as_a_miss() {
    let (_front, server, cache) = two_levels();
    server.failing.store(true, Ordering::SeqCst);

    assert!(cache.get("absent").await.is_none());
    assert!(cache.set("k", b"v".to_vec(), MINUTE, &[]).await);
    assert_eq!(cache.get("k").await.as_deref(), Some(&b"v"[..]));
}

#[tokio::test]
async fn tag_invalidation_reports_largest_level_count() {
    let (_front, _server, cache) = two_levels();
    cache.set("k1", b"v".to_vec(), MINUTE, &tags(&["t"])).await;
    cache.set("k2", b"v".to_vec(), MINUTE, &tags(&["t"])).await;

    assert_eq!(cache.invalidate_by_tags(&tags(&["t"])).await, 2);
    assert!(cache.get("k1").await.is_none());
    assert!(cache.get("k2").await.is_none());
}

#[tokio::test]
async fn pattern_invalidation_reaches_remote_level() {
    let (_front, server, cache) = two_levels();
    server.insert("score:1:x", "v", MINUTE, &[]);
    server.insert("rec:x", "v", MINUTE, &[]);

    assert_eq!(cache.invalidate_by_pattern("score:*").await, 1);
    assert!(server.contains("rec:x"));
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Payload {
    name: String,
    score: f64,
}

#[tokio::test]
async fn json_helpers_round_trip_and_drop_garbage() {
    let cache = MultiLevelCache::in_memory(&CacheConfig::default());
    let payload = Payload {
        name: "serum".to_string(),
        score: 81.5,
    };
    assert!(cache.set_json("p", &payload, MINUTE, &[]).await);
    assert_eq!(cache.get_json::<Payload>("p").await, Some(payload));

    cache.set("bad", b"not json".to_vec(), MINUTE, &[]).await;
    assert_eq!(cache.get_json::<Payload>("bad").await, None);
    assert!(cache.get("bad").await.is_none(), "undecodable entry removed");
}

#[tokio::test(start_paused = true)]
async fn sweeper_removes_expired_entries_until_closed() {
    let cache = Arc::new(MultiLevelCache::in_memory(&CacheConfig {
        memory: MemoryCacheConfig::default(),
        sweep_interval: Duration::from_secs(10),
    }));
    cache.init(Duration::from_secs(10));
    cache.set("short", b"v".to_vec(), Duration::from_secs(1), &[]).await;
    cache.set("long", b"v".to_vec(), MINUTE, &[]).await;

    tokio::time::sleep(Duration::from_secs(11)).await;

    let stats = cache.stats().await;
    assert_eq!(stats[0].entries, 1);
    assert_eq!(stats[0].expirations, 1);

    cache.close().await;
    assert_eq!(cache.stats().await[0].entries, 0);
}
