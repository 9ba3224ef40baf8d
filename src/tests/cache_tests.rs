use std::time::Duration;

use tokio::time::sleep;

use crate::cache::{CacheConfig, TtlCache};
use crate::error::WalletError;
use crate::models::Wallet;

fn small_cache(max_entries: usize) -> TtlCache {
    TtlCache::new(CacheConfig {
        max_entries,
        ..CacheConfig::default()
    })
}

#[tokio::test]
async fn set_and_get_roundtrip() {
    let cache = TtlCache::default();
    cache.set("k1", &"hello".to_string(), None);
    assert_eq!(cache.get::<String>("k1"), Some("hello".to_string()));

    let stats = cache.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 0);
    assert_eq!(stats.size, 1);
}

#[tokio::test]
async fn entries_expire_after_ttl() {
    let cache = TtlCache::default();
    cache.set("short", &42u32, Some(Duration::from_millis(50)));
    assert_eq!(cache.get::<u32>("short"), Some(42));

    sleep(Duration::from_millis(80)).await;
    assert_eq!(cache.get::<u32>("short"), None);

    let stats = cache.stats();
    assert_eq!(stats.size, 0);
    assert_eq!(stats.evictions, 1);
}

#[tokio::test]
async fn ttl_resolves_from_longest_matching_prefix() {
    let cache = TtlCache::new(CacheConfig {
        max_entries: 100,
        default_ttl: Duration::from_secs(300),
        prefix_ttls: vec![
            ("transactions".to_string(), Duration::from_secs(60)),
            ("transactions:recent".to_string(), Duration::from_millis(40)),
        ],
    });
    // The longer prefix wins for recent views; the short TTL expires it.
    cache.set("transactions:recent:u1:10", &vec![1, 2, 3], None);
    cache.set("transactions:all", &vec![4, 5], None);

    sleep(Duration::from_millis(70)).await;
    assert_eq!(cache.get::<Vec<i32>>("transactions:recent:u1:10"), None);
    assert_eq!(cache.get::<Vec<i32>>("transactions:all"), Some(vec![4, 5]));
}

#[tokio::test]
async fn oldest_entry_is_evicted_at_capacity() {
    let cache = small_cache(2);
    cache.set("a", &1u32, None);
    sleep(Duration::from_millis(10)).await;
    cache.set("b", &2u32, None);
    sleep(Duration::from_millis(10)).await;
    cache.set("c", &3u32, None);

    assert_eq!(cache.get::<u32>("a"), None);
    assert_eq!(cache.get::<u32>("b"), Some(2));
    assert_eq!(cache.get::<u32>("c"), Some(3));
    assert_eq!(cache.stats().evictions, 1);
    assert_eq!(cache.stats().size, 2);
}

#[tokio::test]
async fn overwriting_existing_key_does_not_evict() {
    let cache = small_cache(2);
    cache.set("a", &1u32, None);
    cache.set("b", &2u32, None);
    cache.set("a", &10u32, None);

    assert_eq!(cache.get::<u32>("a"), Some(10));
    assert_eq!(cache.get::<u32>("b"), Some(2));
    assert_eq!(cache.stats().evictions, 0);
}

#[tokio::test]
async fn pattern_invalidation_removes_matching_keys() {
    let cache = TtlCache::default();
    cache.set("wallet:u1", &1u32, None);
    cache.set("user_transactions:u1:sig", &2u32, None);
    cache.set("user_transactions:u2:sig", &3u32, None);

    let removed = cache.invalidate_pattern("user_transactions:u1");
    assert_eq!(removed, 1);
    assert_eq!(cache.get::<u32>("wallet:u1"), Some(1));
    assert_eq!(cache.get::<u32>("user_transactions:u2:sig"), Some(3));
    assert_eq!(cache.get::<u32>("user_transactions:u1:sig"), None);
}

#[tokio::test]
async fn undecodable_entry_counts_as_miss_and_is_dropped() {
    let cache = TtlCache::default();
    cache.set("wallet:u1", &"not a wallet".to_string(), None);

    assert!(cache.get::<Wallet>("wallet:u1").is_none());
    let stats = cache.stats();
    assert_eq!(stats.hits, 0);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.size, 0);
}

#[tokio::test]
async fn get_or_set_computes_once() {
    let cache = TtlCache::default();

    let first = cache
        .get_or_set("k", None, || async { Ok::<_, WalletError>(7u32) })
        .await
        .unwrap();
    assert_eq!(first, 7);

    // The second call must be served from cache, not the closure.
    let second = cache
        .get_or_set("k", None, || async {
            Err::<u32, WalletError>(WalletError::invalid("compute ran despite cached value"))
        })
        .await
        .unwrap();
    assert_eq!(second, 7);
}

#[tokio::test]
async fn cleanup_sweeps_only_expired_entries() {
    let cache = TtlCache::default();
    cache.set("short", &1u32, Some(Duration::from_millis(30)));
    cache.set("long", &2u32, Some(Duration::from_secs(60)));

    sleep(Duration::from_millis(60)).await;
    let removed = cache.cleanup();
    assert_eq!(removed, 1);
    assert_eq!(cache.stats().size, 1);
    assert_eq!(cache.get::<u32>("long"), Some(2));
}

#[tokio::test]
async fn hit_rate_reflects_hits_and_misses() {
    let cache = TtlCache::default();
    cache.set("k", &1u32, None);
    cache.get::<u32>("k");
    cache.get::<u32>("k");
    cache.get::<u32>("absent");
    cache.get::<u32>("absent2");

    let stats = cache.stats();
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 2);
    assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
}
