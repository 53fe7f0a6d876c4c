use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use mapcache::{Cache, CacheError};
use tokio::task::JoinSet;
use tokio::time::sleep;

#[tokio::test(start_paused = true)]
async fn test_key_expires_after_ttl() {
    let cache = Cache::new();
    cache.set("k", "v");
    cache.set_expire("k", Duration::from_millis(10)).unwrap();
    assert_eq!(cache.get("k"), Some(Bytes::from("v")));

    sleep(Duration::from_millis(50)).await;

    assert_eq!(cache.get("k"), None);
    assert_eq!(cache.pending_expirations(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_keys_expire_at_their_own_deadlines() {
    let cache = Cache::new();
    for (key, ms) in [("c", 300), ("a", 100), ("b", 200)] {
        cache.set(key, key);
        cache.set_expire(key, Duration::from_millis(ms)).unwrap();
    }
    cache.set("keep", "forever");

    sleep(Duration::from_millis(150)).await;
    assert_eq!(cache.get("a"), None);
    assert!(cache.contains_key("b"));
    assert!(cache.contains_key("c"));

    sleep(Duration::from_millis(100)).await;
    assert_eq!(cache.get("b"), None);
    assert!(cache.contains_key("c"));

    sleep(Duration::from_millis(100)).await;
    assert_eq!(cache.get("c"), None);
    assert_eq!(cache.get("keep"), Some(Bytes::from("forever")));
}

#[tokio::test(start_paused = true)]
async fn test_earlier_deadline_wakes_armed_scheduler() {
    let cache = Cache::new();
    cache.set("slow", "1");
    cache.set_expire("slow", Duration::from_secs(3600)).unwrap();

    // Let the scheduler arm for the hour-long deadline first.
    tokio::task::yield_now().await;

    cache.set("fast", "2");
    cache.set_expire("fast", Duration::from_millis(10)).unwrap();

    sleep(Duration::from_millis(20)).await;
    assert_eq!(cache.get("fast"), None);
    assert!(cache.contains_key("slow"));
    assert!(cache.ttl("slow").is_some());
}

#[tokio::test(start_paused = true)]
async fn test_many_keys_with_same_deadline_expire_together() {
    let cache = Cache::new();
    for i in 0..100 {
        let key = format!("k{i}");
        cache.set(key.clone(), "v");
        cache.set_expire(&key, Duration::from_millis(25)).unwrap();
    }

    sleep(Duration::from_millis(30)).await;
    assert!(cache.is_empty());
    assert_eq!(cache.pending_expirations(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_overwrite_preserves_ttl() {
    let cache = Cache::new();
    cache.set("k", "v1");
    cache.set_expire("k", Duration::from_secs(3600)).unwrap();
    cache.set("k", "v2");

    assert_eq!(cache.get("k"), Some(Bytes::from("v2")));

    sleep(Duration::from_secs(1800)).await;
    assert_eq!(cache.get("k"), Some(Bytes::from("v2")));

    sleep(Duration::from_secs(1801)).await;
    assert_eq!(cache.get("k"), None);
}

#[tokio::test(start_paused = true)]
async fn test_del_cancels_pending_expiry() {
    let cache = Cache::new();
    cache.set("k", "v1");
    cache.set_expire("k", Duration::from_millis(10)).unwrap();
    assert!(cache.del("k"));

    cache.set("k", "v2");
    sleep(Duration::from_millis(50)).await;

    assert_eq!(cache.get("k"), Some(Bytes::from("v2")));
    assert_eq!(cache.ttl("k"), None);
}

#[tokio::test(start_paused = true)]
async fn test_extending_ttl_postpones_expiry() {
    let cache = Cache::new();
    cache.set("k", "v");
    cache.set_expire("k", Duration::from_millis(10)).unwrap();
    tokio::task::yield_now().await;

    cache.set_expire("k", Duration::from_millis(100)).unwrap();
    assert_eq!(cache.pending_expirations(), 1);

    sleep(Duration::from_millis(50)).await;
    assert!(cache.contains_key("k"));

    sleep(Duration::from_millis(60)).await;
    assert!(!cache.contains_key("k"));
}

#[tokio::test]
async fn test_set_expire_missing_key() {
    let cache = Cache::new();
    let err = cache.set_expire("nope", Duration::from_secs(1)).unwrap_err();
    assert_eq!(err, CacheError::KeyNotFound("nope".into()));
    assert_eq!(err.to_string(), "key not found: nope");
    assert!(cache.is_empty());
    assert_eq!(cache.pending_expirations(), 0);
}

#[test]
fn test_try_new_without_runtime() {
    let err = Cache::try_new().unwrap_err();
    assert_eq!(err, CacheError::NoRuntime);
}

#[test]
#[should_panic]
fn test_new_without_runtime_panics() {
    let _cache = Cache::new();
}

#[test]
fn test_try_new_inside_blocking_runtime() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .unwrap();

    // Synchronous callers only need to enter the runtime to build and use it.
    let _guard = runtime.enter();
    let cache = Cache::try_new().unwrap();
    cache.set("k", "v");
    cache.set_expire("k", Duration::from_millis(10)).unwrap();

    runtime.block_on(sleep(Duration::from_millis(50)));
    assert_eq!(cache.get("k"), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers() {
    let cache = Arc::new(Cache::new());
    let mut tasks = JoinSet::new();

    for worker in 0..8 {
        let cache = cache.clone();
        tasks.spawn(async move {
            for i in 0..200 {
                let key = format!("w{worker}:{i}");
                cache.set(key.clone(), Bytes::from(format!("{i}")));
                if i % 2 == 0 {
                    cache.set_expire(&key, Duration::from_millis(20)).unwrap();
                }
                if i % 3 == 0 {
                    cache.del(&key);
                }
                if i % 16 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        });
    }
    while let Some(result) = tasks.join_next().await {
        result.unwrap();
    }

    sleep(Duration::from_millis(300)).await;

    let expected: usize = (0..200).filter(|i| i % 2 != 0 && i % 3 != 0).count() * 8;
    assert_eq!(cache.len(), expected);
    assert_eq!(cache.pending_expirations(), 0);
    assert_eq!(cache.get("w0:1"), Some(Bytes::from("1")));
    assert_eq!(cache.get("w0:2"), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_set_expire_on_one_key() {
    let cache = Arc::new(Cache::new());
    cache.set("shared", "v");

    let mut tasks = JoinSet::new();
    for worker in 0..8u64 {
        let cache = cache.clone();
        tasks.spawn(async move {
            for i in 0..100u64 {
                cache
                    .set_expire("shared", Duration::from_secs(60 + worker * 100 + i))
                    .unwrap();
            }
        });
    }
    while let Some(result) = tasks.join_next().await {
        result.unwrap();
    }

    assert_eq!(cache.pending_expirations(), 1);
    assert!(cache.contains_key("shared"));
}

#[test]
fn test_soak_binary_passes() {
    let output = Command::new(env!("CARGO_BIN_EXE_mapcache"))
        .args([
            "--workers",
            "4",
            "--keys",
            "2000",
            "--ttl-ms",
            "50",
            "--settle-ms",
            "300",
        ])
        .output()
        .expect("failed to run mapcache");

    assert!(
        output.status.success(),
        "soak run failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}
