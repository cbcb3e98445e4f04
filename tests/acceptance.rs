//! End-to-end flows through the facade, the bridge and the in-process
//! driver together.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use reactive_memcache::transcoder::{JsonTranscoder, StringTranscoder};
use reactive_memcache::{CacheError, CasOutcome, MemoryDriver, ReactiveMemcache};

fn client() -> (Arc<MemoryDriver>, ReactiveMemcache) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    let driver = Arc::new(MemoryDriver::new());
    let client = ReactiveMemcache::new(driver.clone());
    (driver, client)
}

#[tokio::test]
async fn test_nothing_happens_until_subscription() {
    let (driver, cache) = client();

    // Built but never subscribed: must leave no trace in the store.
    let _unsubscribed = cache.set("ghost", 60, "boo");
    let stale = cache.set("k", 60, "2");
    let fresh = cache.set("k", 60, "1");

    assert_eq!(driver.entry_count(), 0);

    stale.subscribe().await.unwrap();
    fresh.subscribe().await.unwrap();

    let value = cache.get("k").subscribe().await.unwrap();
    assert_eq!(value.as_deref(), Some(&b"1"[..]));
    assert_eq!(driver.entry_count(), 1);
}

#[tokio::test]
async fn test_miss_completes_empty() {
    let (_driver, cache) = client();
    let value = cache.get("absent").subscribe().await.unwrap();
    assert_eq!(value, None);
}

#[tokio::test]
async fn test_bulk_get_returns_only_present_keys() {
    let (_driver, cache) = client();
    cache.set("a", 60, "x").subscribe().await.unwrap();

    let values = cache
        .get_bulk(&["a", "b"])
        .subscribe()
        .await
        .unwrap()
        .unwrap();

    assert_eq!(values.len(), 1);
    assert_eq!(values["a"], &b"x"[..]);
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Profile {
    name: String,
    logins: u64,
}

#[tokio::test]
async fn test_typed_round_trip_through_json() {
    let (_driver, cache) = client();
    let profile = Profile {
        name: "ada".to_string(),
        logins: 3,
    };

    let stored = cache
        .set_with("profile", 60, profile, JsonTranscoder::new())
        .subscribe()
        .await
        .unwrap();
    assert_eq!(stored, Some(true));

    let loaded: Option<Profile> = cache
        .get_with("profile", JsonTranscoder::new())
        .subscribe()
        .await
        .unwrap();
    assert_eq!(
        loaded,
        Some(Profile {
            name: "ada".to_string(),
            logins: 3,
        })
    );
}

#[tokio::test]
async fn test_typed_decode_failure_surfaces_on_error_channel() {
    let (_driver, cache) = client();
    cache.set("blob", 60, "not json").subscribe().await.unwrap();

    let result = cache
        .get_with("blob", JsonTranscoder::<Profile>::new())
        .subscribe()
        .await;

    assert!(matches!(result, Err(CacheError::Transcode(_))));
}

#[tokio::test]
async fn test_cas_flow() {
    let (_driver, cache) = client();
    cache.set("k", 60, "v1").subscribe().await.unwrap();

    let read = cache.gets("k").subscribe().await.unwrap().unwrap();
    let outcome = cache
        .cas("k", read.cas, Some(60), "v2")
        .subscribe()
        .await
        .unwrap();
    assert_eq!(outcome, Some(CasOutcome::Stored));

    // The old token is now stale.
    let outcome = cache
        .cas("k", read.cas, Some(60), "v3")
        .subscribe()
        .await
        .unwrap();
    assert_eq!(outcome, Some(CasOutcome::Exists));

    let value = cache
        .get_with("k", StringTranscoder)
        .subscribe()
        .await
        .unwrap();
    assert_eq!(value.as_deref(), Some("v2"));
}

#[tokio::test]
async fn test_counter_flow() {
    let (_driver, cache) = client();

    // Missing key without a default completes empty.
    assert_eq!(cache.incr("hits", 1).subscribe().await.unwrap(), None);

    let seeded = cache
        .incr_with_default("hits", 1, 10, 60)
        .subscribe()
        .await
        .unwrap();
    assert_eq!(seeded, Some(10));

    assert_eq!(cache.incr("hits", 5).subscribe().await.unwrap(), Some(15));
    assert_eq!(cache.decr("hits", 20).subscribe().await.unwrap(), Some(0));
}

#[tokio::test]
async fn test_delete_and_flush() {
    let (driver, cache) = client();
    cache.set("a", 60, "1").subscribe().await.unwrap();
    cache.set("b", 60, "2").subscribe().await.unwrap();

    assert_eq!(cache.delete("a").subscribe().await.unwrap(), Some(true));
    assert_eq!(cache.delete("a").subscribe().await.unwrap(), Some(false));

    assert_eq!(cache.flush().subscribe().await.unwrap(), Some(true));
    assert_eq!(driver.entry_count(), 0);
}

#[tokio::test]
async fn test_subscription_is_a_future() {
    let (_driver, cache) = client();
    cache.set("k", 60, "v").subscribe().await.unwrap();

    // IntoFuture lets a mono be awaited directly.
    let value = cache.get("k").await.unwrap();
    assert_eq!(value.as_deref(), Some(&b"v"[..]));
}

#[tokio::test(start_paused = true)]
async fn test_delayed_flush_waits_out_its_delay() {
    let (driver, cache) = client();
    cache.set("k", 0, "v").subscribe().await.unwrap();

    let flush = tokio::spawn(
        cache
            .flush_delayed(Duration::from_secs(30))
            .subscribe(),
    );
    tokio::time::sleep(Duration::from_secs(29)).await;
    assert_eq!(driver.entry_count(), 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(flush.await.unwrap().unwrap(), Some(true));
    assert_eq!(driver.entry_count(), 0);
}
