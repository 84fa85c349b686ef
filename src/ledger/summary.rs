//! Aggregate summary and insight rules over ledger records.

use serde::{Deserialize, Serialize};

use super::record::AttemptRecord;

/// Number of records returned in [`Summary::recent`].
pub const RECENT_LIMIT: usize = 50;

pub const INSIGHT_ERROR_RATE: &str =
    "Error rate over 5%: investigate upstream LLM or network issues";
pub const INSIGHT_LATENCY: &str =
    "Average latency over 2s: consider increasing timeouts or switching models";
pub const INSIGHT_CONFIDENCE: &str =
    "Low average confidence: calibrate prompt or investigate model quality";

const ERROR_RATE_LIMIT: f64 = 0.05;
const LATENCY_LIMIT_MS: f64 = 2000.0;
const CONFIDENCE_FLOOR: f64 = 0.5;

/// Aggregate view of the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_requests: usize,
    pub successes: usize,
    pub failures: usize,
    pub error_rate: f64,
    pub avg_latency: f64,
    pub median_latency: f64,
    pub total_tokens: u64,
    pub total_prompt: u64,
    pub total_completion: u64,
    pub total_cost: f64,
    /// `None` (serialized as `null`) when no record carries a confidence.
    pub avg_confidence: Option<f64>,
    pub insights: Vec<String>,
    /// Most recent records first.
    pub recent: Vec<AttemptRecord>,
}

impl Summary {
    /// Summarize `records`, given in append order.
    pub fn from_records(records: &[AttemptRecord]) -> Self {
        let total = records.len();
        let successes = records.iter().filter(|r| r.success).count();
        let failures = total - successes;
        let error_rate = ratio(failures as f64, total);

        let mut latencies: Vec<u64> = records.iter().map(|r| r.latency_ms).collect();
        let avg_latency = ratio(latencies.iter().map(|&l| l as f64).sum(), total);
        let median_latency = median(&mut latencies);

        let confidences: Vec<f64> = records.iter().filter_map(|r| r.confidence).collect();
        let avg_confidence = (!confidences.is_empty())
            .then(|| confidences.iter().sum::<f64>() / confidences.len() as f64);

        let insights = insights(error_rate, avg_latency, avg_confidence);

        Self {
            total_requests: total,
            successes,
            failures,
            error_rate,
            avg_latency,
            median_latency,
            total_tokens: records.iter().map(|r| r.tokens).sum(),
            total_prompt: records.iter().map(|r| r.tokens_prompt).sum(),
            total_completion: records.iter().map(|r| r.tokens_completion).sum(),
            total_cost: records.iter().map(|r| r.cost_usd).sum(),
            avg_confidence,
            insights,
            recent: records.iter().rev().take(RECENT_LIMIT).cloned().collect(),
        }
    }
}

fn ratio(numerator: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        numerator / count as f64
    }
}

/// Median of `values`; the mean of the two middle values for an even count,
/// 0 when empty. Sorts in place.
pub fn median(values: &mut [u64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_unstable();
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] as f64 + values[mid] as f64) / 2.0
    } else {
        values[mid] as f64
    }
}

/// Advisory strings, in fixed order, for the aggregates that cross a limit.
pub fn insights(error_rate: f64, avg_latency: f64, avg_confidence: Option<f64>) -> Vec<String> {
    let mut out = Vec::new();
    if error_rate > ERROR_RATE_LIMIT {
        out.push(INSIGHT_ERROR_RATE.to_string());
    }
    if avg_latency > LATENCY_LIMIT_MS {
        out.push(INSIGHT_LATENCY.to_string());
    }
    if avg_confidence.is_some_and(|c| c < CONFIDENCE_FLOOR) {
        out.push(INSIGHT_CONFIDENCE.to_string());
    }
    out
}
