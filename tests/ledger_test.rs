//! Tests for [`MetricsLedger`] summaries, insights and persistence.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use huginn::ledger::summary::{INSIGHT_CONFIDENCE, INSIGHT_ERROR_RATE, INSIGHT_LATENCY};
use huginn::ledger::{AttemptRecord, LedgerConfig, MetricsLedger, RECENT_LIMIT, Summary};
use huginn::{HuginnError, Usage};

fn ok(latency_ms: u64) -> AttemptRecord {
    AttemptRecord::success(
        latency_ms,
        Usage {
            prompt_tokens: 30,
            completion_tokens: 20,
            total_tokens: 50,
        },
        0.00005,
    )
}

fn failed() -> AttemptRecord {
    AttemptRecord::failure(&HuginnError::RateLimited { retry_after: None })
}

// =========================================================================
// Summary arithmetic
// =========================================================================

#[test]
fn median_and_mean_even_count() {
    let records: Vec<_> = [100, 200, 300, 400].into_iter().map(ok).collect();
    let summary = Summary::from_records(&records);
    assert_eq!(summary.median_latency, 250.0);
    assert_eq!(summary.avg_latency, 250.0);
}

#[test]
fn median_odd_count() {
    let records: Vec<_> = [300, 100, 200].into_iter().map(ok).collect();
    let summary = Summary::from_records(&records);
    assert_eq!(summary.median_latency, 200.0);
    assert_eq!(summary.avg_latency, 200.0);
}

#[test]
fn totals_and_partition() {
    let records = vec![ok(100), failed(), ok(300)];
    let summary = Summary::from_records(&records);

    assert_eq!(summary.total_requests, 3);
    assert_eq!(summary.successes, 2);
    assert_eq!(summary.failures, 1);
    assert!((summary.error_rate - 1.0 / 3.0).abs() < 1e-12);
    assert_eq!(summary.total_tokens, 100);
    assert_eq!(summary.total_prompt, 60);
    assert_eq!(summary.total_completion, 40);
    assert!((summary.total_cost - 0.0001).abs() < 1e-12);
    // Failures carry zero latency and still count toward the mean.
    assert!((summary.avg_latency - 400.0 / 3.0).abs() < 1e-9);
}

#[test]
fn avg_confidence_only_over_records_with_confidence() {
    let records = vec![ok(10).with_confidence(0.9), ok(10), ok(10).with_confidence(0.7)];
    let summary = Summary::from_records(&records);
    assert!((summary.avg_confidence.unwrap() - 0.8).abs() < 1e-12);
}

#[test]
fn avg_confidence_absent_without_values() {
    let summary = Summary::from_records(&[ok(10), failed()]);
    assert!(summary.avg_confidence.is_none());
    let json = serde_json::to_value(&summary).unwrap();
    assert!(json["avgConfidence"].is_null());
}

// =========================================================================
// Insights
// =========================================================================

#[test]
fn error_rate_insight_above_five_percent() {
    // 2 failures in 20 = 10%
    let mut records: Vec<_> = (0..18).map(|_| ok(100)).collect();
    records.extend([failed(), failed()]);
    let summary = Summary::from_records(&records);
    assert!(summary.insights.iter().any(|i| i == INSIGHT_ERROR_RATE));
}

#[test]
fn error_rate_insight_absent_at_five_percent() {
    // 1 failure in 20 = exactly 5%
    let mut records: Vec<_> = (0..19).map(|_| ok(100)).collect();
    records.push(failed());
    let summary = Summary::from_records(&records);
    assert_eq!(summary.error_rate, 0.05);
    assert!(!summary.insights.iter().any(|i| i == INSIGHT_ERROR_RATE));
}

#[test]
fn latency_and_confidence_insights_in_fixed_order() {
    let records = vec![
        ok(3500).with_confidence(0.3),
        failed(),
        ok(3600).with_confidence(0.4),
    ];
    let summary = Summary::from_records(&records);
    assert_eq!(
        summary.insights,
        vec![INSIGHT_ERROR_RATE, INSIGHT_LATENCY, INSIGHT_CONFIDENCE]
    );
}

#[test]
fn healthy_ledger_has_no_insights() {
    let records: Vec<_> = (0..10).map(|_| ok(500).with_confidence(0.9)).collect();
    assert!(Summary::from_records(&records).insights.is_empty());
}

// =========================================================================
// Recent window
// =========================================================================

#[test]
fn recent_is_last_fifty_newest_first() {
    let base = Utc::now();
    let records: Vec<_> = (0..60u64)
        .map(|i| ok(i).with_timestamp(base + ChronoDuration::seconds(i as i64)))
        .collect();
    let summary = Summary::from_records(&records);

    assert_eq!(summary.recent.len(), RECENT_LIMIT);
    assert_eq!(summary.recent[0].latency_ms, 59);
    assert_eq!(summary.recent[RECENT_LIMIT - 1].latency_ms, 10);
    assert!(
        summary
            .recent
            .windows(2)
            .all(|w| w[0].timestamp > w[1].timestamp)
    );
}

#[test]
fn recent_with_fewer_records() {
    let summary = Summary::from_records(&[ok(1), ok(2)]);
    let latencies: Vec<_> = summary.recent.iter().map(|r| r.latency_ms).collect();
    assert_eq!(latencies, vec![2, 1]);
}

// =========================================================================
// Ledger store
// =========================================================================

#[tokio::test]
async fn records_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = LedgerConfig::new().path(dir.path().join("metrics").join("metrics.json"));

    {
        let ledger = MetricsLedger::open(&config).await;
        ledger.record(ok(100)).await;
        ledger.record(failed()).await;
    }

    let reopened = MetricsLedger::open(&config).await;
    assert_eq!(reopened.len(), 2);
    let summary = reopened.summarize();
    assert_eq!(summary.successes, 1);
    assert_eq!(summary.failures, 1);
}

#[tokio::test]
async fn ledger_file_is_a_json_array_of_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("metrics.json");
    let ledger = MetricsLedger::open(&LedgerConfig::new().path(&path)).await;
    ledger
        .record(ok(120).with_model("m1").with_question("How do I transfer USDT?"))
        .await;

    let json: serde_json::Value =
        serde_json::from_str(&tokio::fs::read_to_string(&path).await.unwrap()).unwrap();
    let record = &json.as_array().unwrap()[0];
    assert_eq!(record["latencyMs"], 120);
    assert_eq!(record["success"], true);
    assert_eq!(record["model"], "m1");
    assert_eq!(record["questionSnippet"], "How do I transfer USDT?");
}

#[tokio::test]
async fn reads_sparse_legacy_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("metrics.json");
    tokio::fs::write(
        &path,
        r#"[
            {"timestamp":"2024-05-01T10:00:00.000Z","latencyMs":300,"success":true,"confidence":0.9},
            {"timestamp":"2024-05-01T10:01:00.000Z","success":false,
             "error":{"message":"Rate limit exceeded","status":429}}
        ]"#,
    )
    .await
    .unwrap();

    let ledger = MetricsLedger::open(&LedgerConfig::new().path(&path)).await;
    let summary = ledger.summarize();
    assert_eq!(summary.total_requests, 2);
    assert_eq!(summary.total_tokens, 0);
    assert_eq!(summary.median_latency, 150.0);
    assert_eq!(summary.recent[0].error.as_ref().unwrap().status, Some(429));
}

#[tokio::test]
async fn corrupt_or_empty_file_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    for (name, content) in [("empty.json", ""), ("corrupt.json", "{not json")] {
        let path = dir.path().join(name);
        tokio::fs::write(&path, content).await.unwrap();
        let ledger = MetricsLedger::open(&LedgerConfig::new().path(&path)).await;
        assert!(ledger.is_empty(), "{name}");

        ledger.record(ok(1)).await;
        let reopened = MetricsLedger::open(&LedgerConfig::new().path(&path)).await;
        assert_eq!(reopened.len(), 1, "{name}");
    }
}

#[tokio::test]
async fn write_failure_is_swallowed() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("file");
    std::fs::write(&blocker, "x").unwrap();
    let ledger = MetricsLedger::open(&LedgerConfig::new().path(blocker.join("metrics.json"))).await;

    ledger.record(ok(5)).await;
    assert_eq!(ledger.summarize().total_requests, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_records_are_not_lost() {
    let dir = tempfile::tempdir().unwrap();
    let config = LedgerConfig::new().path(dir.path().join("metrics.json"));
    let ledger = Arc::new(MetricsLedger::open(&config).await);

    let handles: Vec<_> = (0..25)
        .map(|i| {
            let ledger = Arc::clone(&ledger);
            tokio::spawn(async move { ledger.record(ok(i)).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(ledger.len(), 25);
    let reopened = MetricsLedger::open(&config).await;
    assert_eq!(reopened.len(), 25);
}
