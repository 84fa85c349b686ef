//! Tests for [`ResponseCache`]: fingerprinting, immutability and the snapshot mirror.

use chrono::Utc;
use huginn::cache::{CacheConfig, CacheEntry, Fingerprint, ResponseCache, fingerprint};
use huginn::{QueryMetrics, QueryResponse};

fn response(answer: &str) -> QueryResponse {
    QueryResponse {
        message_id: "id".into(),
        answer: answer.into(),
        confidence: 0.8,
        recommended_actions: vec![],
        metrics: QueryMetrics {
            tokens: 42,
            latency_ms: 120,
            estimated_usd: 0.000042,
        },
        timestamp: Utc::now(),
    }
}

async fn read_snapshot(cache: &ResponseCache) -> Vec<CacheEntry> {
    let path = cache.snapshot_path().expect("snapshot path");
    let raw = tokio::fs::read_to_string(path).await.unwrap();
    serde_json::from_str(&raw).unwrap()
}

// =========================================================================
// Fingerprint
// =========================================================================

#[test]
fn fingerprint_ignores_case_and_surrounding_whitespace() {
    let q = "How do I transfer USDT?";
    let expected = fingerprint(q, "m1");
    for variant in [
        "how do i transfer usdt?",
        "HOW DO I TRANSFER USDT?",
        "   How do I transfer USDT?\n",
        "\tHoW Do I TrAnSfEr UsDt?  ",
    ] {
        assert_eq!(fingerprint(variant, "m1"), expected, "variant {variant:?}");
    }
    assert_eq!(fingerprint(q, "m1"), fingerprint(&q.trim().to_lowercase(), "m1"));
}

#[test]
fn fingerprint_separates_models_and_questions() {
    let q = "How do I transfer USDT?";
    assert_ne!(fingerprint(q, "m1"), fingerprint(q, "m2"));
    assert_ne!(fingerprint(q, "m1"), fingerprint("How do I transfer BTC?", "m1"));
    // Inner whitespace is significant.
    assert_ne!(fingerprint("a b", "m1"), fingerprint("a  b", "m1"));
}

#[test]
fn fingerprint_is_fixed_length_hex() {
    let long = "a much longer question ".repeat(40);
    for (q, m) in [("", ""), ("x", "m1"), (long.as_str(), "m")] {
        let fp = Fingerprint::new(q, m);
        assert_eq!(fp.as_str().len(), 64);
        assert!(fp.as_str().bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
    }
}

// =========================================================================
// In-memory behavior
// =========================================================================

#[tokio::test]
async fn miss_then_hit() {
    let cache = ResponseCache::new(&CacheConfig::default());
    let fp = fingerprint("hello", "m1");

    assert!(cache.get(&fp).await.is_none());
    assert!(cache.put(fp.clone(), response("hi")).await);

    let cached = cache.get(&fp).await.unwrap();
    assert_eq!(cached.answer, "hi");
    assert_eq!(cached, cache.entries()[0].result);
}

#[tokio::test]
async fn first_put_wins() {
    let cache = ResponseCache::new(&CacheConfig::default());
    let fp = fingerprint("hello", "m1");

    assert!(cache.put(fp.clone(), response("first")).await);
    assert!(!cache.put(fp.clone(), response("second")).await);

    assert_eq!(cache.get(&fp).await.unwrap().answer, "first");
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn memory_only_cache_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.json");
    let cache = ResponseCache::new(&CacheConfig::new().path(&path));

    cache.put(fingerprint("q", "m"), response("a")).await;
    assert!(cache.snapshot_path().is_none());
    assert!(!path.exists());
}

// =========================================================================
// Snapshot mirror
// =========================================================================

#[tokio::test]
async fn every_put_rewrites_full_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let config = CacheConfig::new().path(dir.path().join("cache").join("cache.json"));
    let cache = ResponseCache::open(&config).await;

    let first = fingerprint("first question", "m1");
    let second = fingerprint("second question", "m1");
    cache.put(first.clone(), response("one")).await;
    assert_eq!(read_snapshot(&cache).await.len(), 1);

    cache.put(second.clone(), response("two")).await;
    let snapshot = read_snapshot(&cache).await;
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[0].fingerprint, first);
    assert_eq!(snapshot[0].result.answer, "one");
    assert_eq!(snapshot[1].fingerprint, second);
}

#[tokio::test]
async fn snapshot_uses_documented_field_names() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ResponseCache::open(&CacheConfig::new().path(dir.path().join("cache.json"))).await;
    let fp = fingerprint("q", "m1");
    cache.put(fp.clone(), response("a")).await;

    let raw = tokio::fs::read_to_string(cache.snapshot_path().unwrap())
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let entry = &json.as_array().unwrap()[0];
    assert_eq!(entry["fingerprint"], fp.as_str());
    assert_eq!(entry["result"]["answer"], "a");
    assert!(entry["timestamp"].is_string());
}

#[tokio::test]
async fn restart_starts_cold_and_deletes_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let config = CacheConfig::new().path(dir.path().join("cache.json"));
    let fp = fingerprint("How do I transfer USDT?", "m1");

    {
        let cache = ResponseCache::open(&config).await;
        cache.put(fp.clone(), response("answer")).await;
        assert!(cache.get(&fp).await.is_some());
    }
    assert!(dir.path().join("cache.json").exists());

    let restarted = ResponseCache::open(&config).await;
    assert!(restarted.get(&fp).await.is_none());
    assert!(restarted.is_empty());
    assert!(!dir.path().join("cache.json").exists());
}

#[tokio::test]
async fn persistence_failure_is_swallowed() {
    let dir = tempfile::tempdir().unwrap();
    // A regular file where the snapshot's parent directory should be.
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, "x").unwrap();
    let config = CacheConfig::new().path(blocker.join("cache.json"));

    let cache = ResponseCache::open(&config).await;
    let fp = fingerprint("q", "m");
    assert!(cache.put(fp.clone(), response("a")).await);
    assert_eq!(cache.get(&fp).await.unwrap().answer, "a");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_puts_leave_consistent_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let config = CacheConfig::new().path(dir.path().join("cache.json"));
    let cache = std::sync::Arc::new(ResponseCache::open(&config).await);

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .put(fingerprint(&format!("question {i}"), "m1"), response("a"))
                    .await
            })
        })
        .collect();
    for handle in handles {
        assert!(handle.await.unwrap());
    }

    assert_eq!(cache.len(), 20);
    assert_eq!(read_snapshot(&cache).await.len(), 20);
}
