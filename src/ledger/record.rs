//! Ledger record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::HuginnError;
use crate::types::Usage;

/// Characters of the question kept in [`AttemptRecord::question_snippet`].
pub const SNIPPET_CHARS: usize = 120;

/// Error details stored on a failed attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl From<&HuginnError> for AttemptError {
    fn from(err: &HuginnError) -> Self {
        Self {
            message: err.to_string(),
            status: err.status_code(),
        }
    }
}

/// One completed upstream attempt sequence (all retries included).
///
/// Field names match the on-disk ledger format. Numeric fields missing from
/// older files deserialize as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub latency_ms: u64,
    #[serde(default)]
    pub tokens: u64,
    #[serde(default, rename = "tokens_prompt")]
    pub tokens_prompt: u64,
    #[serde(default, rename = "tokens_completion")]
    pub tokens_completion: u64,
    #[serde(default)]
    pub cost_usd: f64,
    pub success: bool,
    #[serde(default)]
    pub error: Option<AttemptError>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub question_snippet: Option<String>,
}

impl AttemptRecord {
    /// A successful attempt.
    pub fn success(latency_ms: u64, usage: Usage, cost_usd: f64) -> Self {
        Self {
            timestamp: Utc::now(),
            latency_ms,
            tokens: u64::from(usage.total_tokens),
            tokens_prompt: u64::from(usage.prompt_tokens),
            tokens_completion: u64::from(usage.completion_tokens),
            cost_usd,
            success: true,
            error: None,
            confidence: None,
            model: None,
            question_snippet: None,
        }
    }

    /// A failed attempt. Latency, tokens and cost are zero.
    pub fn failure(err: &HuginnError) -> Self {
        Self {
            timestamp: Utc::now(),
            latency_ms: 0,
            tokens: 0,
            tokens_prompt: 0,
            tokens_completion: 0,
            cost_usd: 0.0,
            success: false,
            error: Some(err.into()),
            confidence: None,
            model: None,
            question_snippet: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Attach the first [`SNIPPET_CHARS`] characters of `question`.
    pub fn with_question(mut self, question: &str) -> Self {
        self.question_snippet = Some(question.chars().take(SNIPPET_CHARS).collect());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_zeroes_accounting() {
        let err = HuginnError::Api {
            status: 503,
            message: "down".into(),
        };
        let record = AttemptRecord::failure(&err);
        assert!(!record.success);
        assert_eq!(record.latency_ms, 0);
        assert_eq!(record.tokens, 0);
        assert_eq!(record.cost_usd, 0.0);
        let error = record.error.unwrap();
        assert_eq!(error.status, Some(503));
        assert!(error.message.contains("down"));
    }

    #[test]
    fn snippet_is_truncated_by_chars() {
        let question = "é".repeat(300);
        let record = AttemptRecord::failure(&HuginnError::AuthenticationFailed)
            .with_question(&question);
        assert_eq!(
            record.question_snippet.unwrap().chars().count(),
            SNIPPET_CHARS
        );
    }

    #[test]
    fn wire_field_names() {
        let usage = Usage {
            prompt_tokens: 7,
            completion_tokens: 3,
            total_tokens: 10,
        };
        let json = serde_json::to_value(AttemptRecord::success(42, usage, 0.00001)).unwrap();
        assert_eq!(json["latencyMs"], 42);
        assert_eq!(json["tokens"], 10);
        assert_eq!(json["tokens_prompt"], 7);
        assert_eq!(json["tokens_completion"], 3);
        assert!(json.get("costUsd").is_some());
        assert!(json.get("questionSnippet").is_some());
    }

    #[test]
    fn sparse_records_deserialize() {
        let record: AttemptRecord =
            serde_json::from_str(r#"{"timestamp":"2024-05-01T10:00:00.000Z","success":true}"#)
                .unwrap();
        assert_eq!(record.tokens, 0);
        assert_eq!(record.cost_usd, 0.0);
        assert!(record.confidence.is_none());
    }
}
