//! Runs the Redis backend against a live server.
//!
//! ```text
//! CAPPING_TEST_REDIS_URL=redis://127.0.0.1:6379/15 cargo test -p capping -- --ignored
//! ```
//!
//! Every test works under a random key prefix and removes nothing else, but
//! point it at a disposable database anyway.

use std::sync::Arc;

use capping::{
    CampaignId, CappingEngine, Expiry, Increment, KeyTtl, KeyedStore, Prefixes, RedisKeyedStore,
    SystemClock, UserId,
};

fn store() -> RedisKeyedStore {
    let url = std::env::var("CAPPING_TEST_REDIS_URL")
        .expect("CAPPING_TEST_REDIS_URL must point at a disposable redis");
    RedisKeyedStore::new(redis::Client::open(url).unwrap())
}

fn unique(name: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("capping-test:{nanos}:{name}")
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[tokio::test]
#[ignore = "needs CAPPING_TEST_REDIS_URL"]
async fn increment_sets_ttl_once_and_reports_creation() {
    let store = store();
    let key = unique("counter");

    let first = store.increment(&key, 1, Some(100)).await.unwrap();
    let second = store.increment(&key, 4, Some(5)).await.unwrap();

    assert_eq!(first, Increment { value: 1, created: true });
    assert_eq!(second, Increment { value: 5, created: false });
    match store.ttl(&key).await.unwrap() {
        KeyTtl::Expires(secs) => assert!(secs > 5 && secs <= 100),
        other => panic!("unexpected ttl {other:?}"),
    }
}

#[tokio::test]
#[ignore = "needs CAPPING_TEST_REDIS_URL"]
async fn increment_heals_malformed_counter() {
    let store = store();
    let key = unique("corrupt");
    store.set(&key, "abc", None).await.unwrap();

    let next = store.increment(&key, 2, Some(60)).await.unwrap();

    assert_eq!(next, Increment { value: 2, created: true });
}

#[tokio::test]
#[ignore = "needs CAPPING_TEST_REDIS_URL"]
async fn concurrent_increments_create_once() {
    let store = Arc::new(store());
    let key = unique("race");

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let store = store.clone();
            let key = key.clone();
            tokio::spawn(async move { store.increment(&key, 1, Some(60)).await.unwrap() })
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        if handle.await.unwrap().created {
            created += 1;
        }
    }

    assert_eq!(created, 1);
    assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("32"));
}

#[tokio::test]
#[ignore = "needs CAPPING_TEST_REDIS_URL"]
async fn range_query_evicts_past_members() {
    let store = store();
    let set = unique("set");
    let now = now();
    store.sorted_set_add(&set, "past", Expiry::At(now - 100)).await.unwrap();
    store.sorted_set_add(&set, "future", Expiry::At(now + 100)).await.unwrap();
    store.sorted_set_add(&set, "forever", Expiry::Never).await.unwrap();

    let mut live = store
        .sorted_set_range(&set, now, Expiry::Never, true)
        .await
        .unwrap();
    live.sort();
    let mut all = store
        .sorted_set_range(&set, i64::MIN, Expiry::Never, false)
        .await
        .unwrap();
    all.sort();

    assert_eq!(live, vec!["forever", "future"]);
    assert_eq!(all, vec!["forever", "future"]);
}

#[tokio::test]
#[ignore = "needs CAPPING_TEST_REDIS_URL"]
async fn engine_excludes_user_on_limit() {
    let root = unique("engine");
    let prefixes = Prefixes {
        counters: format!("{root}:counters"),
        exclude_lists: format!("{root}:exclude"),
        no_ads: format!("{root}:no_ads"),
    };
    let engine =
        CappingEngine::new(Arc::new(store()), prefixes, Arc::new(SystemClock)).unwrap();
    let uid = UserId::new("it");

    for _ in 0..2 {
        engine
            .record_user_show(Some(&uid), CampaignId(1), 1, 2)
            .await
            .unwrap();
    }

    let excluded = engine.list_combined_exclusions(Some(&uid)).await.unwrap();
    assert_eq!(excluded, vec![CampaignId(1)]);
}

#[tokio::test]
#[ignore = "needs CAPPING_TEST_REDIS_URL"]
async fn zero_ttl_is_rejected_without_writing() {
    let store = store();
    let key = unique("zero-ttl");

    assert!(store.increment(&key, 1, Some(0)).await.is_err());
    assert!(store.set(&key, "1", Some(0)).await.is_err());
    assert_eq!(store.ttl(&key).await.unwrap(), KeyTtl::Missing);
}
