//! Assistant reply and query response types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{HuginnError, Result};

/// Confidence assumed when the model does not report one.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// An action the downstream UI or agent can present or invoke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedAction {
    /// Short identifier, e.g. `"reply"` or `"escalate"`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

/// Structured reply the model is prompted to produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantReply {
    pub answer: String,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub recommended_actions: Vec<RecommendedAction>,
}

impl AssistantReply {
    /// Parse the upstream message content.
    ///
    /// The content must be a JSON object with at least an `answer` string.
    pub fn parse(content: &str) -> Result<Self> {
        serde_json::from_str(content.trim())
            .map_err(|e| HuginnError::MalformedResponse(format!("reply is not valid JSON: {e}")))
    }

    /// Reported confidence clamped to `[0, 1]`, or [`DEFAULT_CONFIDENCE`].
    pub fn confidence(&self) -> f64 {
        self.confidence
            .filter(|c| c.is_finite())
            .map(|c| c.clamp(0.0, 1.0))
            .unwrap_or(DEFAULT_CONFIDENCE)
    }
}

/// Per-query usage metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryMetrics {
    pub tokens: u32,
    pub latency_ms: u64,
    pub estimated_usd: f64,
}

/// Response returned for an assistant query. This is the cached payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    /// Fingerprint of the (question, model) pair.
    pub message_id: String,
    pub answer: String,
    pub confidence: f64,
    pub recommended_actions: Vec<RecommendedAction>,
    pub metrics: QueryMetrics,
    pub timestamp: DateTime<Utc>,
}

/// Liveness report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    /// Seconds since the executor was constructed.
    pub uptime: f64,
}
