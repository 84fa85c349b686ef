//! Huginn - resilient request execution for an upstream LLM API
//!
//! Every assistant query runs through the same core:
//!
//! - a fingerprint-keyed [`ResponseCache`] that answers repeated questions
//!   without going upstream
//! - a named [`CircuitBreaker`] that fails fast while the upstream is unhealthy
//! - a [`BackoffRetrier`] that retries rate limits and 5xx responses with
//!   exponential backoff and jitter
//! - a [`MetricsLedger`] that records every upstream attempt and produces
//!   aggregate [`Summary`] views with advisory insights
//!
//! [`RequestExecutor`] wires them together around a [`CompletionProvider`]
//! ([`OpenRouterClient`] in production).
//!
//! # Example
//!
//! ```rust,no_run
//! use huginn::{CacheConfig, Huginn, LedgerConfig};
//!
//! #[tokio::main]
//! async fn main() -> huginn::Result<()> {
//!     let executor = Huginn::builder()
//!         .openrouter("sk-or-your-key")
//!         .prompt_dir("prompts")
//!         .cache(CacheConfig::new().path("cache/cache.json"))
//!         .ledger(LedgerConfig::new().path("metrics/metrics.json"))
//!         .build()
//!         .await?;
//!
//!     let response = executor.run("How do I transfer USDT?", "openai/gpt-4o-mini").await?;
//!     println!("{} (confidence {:.2})", response.answer, response.confidence);
//!
//!     let summary = executor.summary();
//!     println!("{} requests, error rate {:.1}%", summary.total_requests, summary.error_rate * 100.0);
//!     Ok(())
//! }
//! ```
//!
//! # Telemetry
//!
//! Logs go through `tracing`; counters and histograms through the `metrics`
//! facade (names in [`telemetry`]). Install a subscriber and a recorder to
//! collect them.

pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod ledger;
pub mod prompt;
pub mod providers;
pub mod resilience;
mod storage;
pub mod telemetry;
pub mod types;
pub mod version;

// Re-export main types at crate root
pub use cache::{CacheConfig, CacheEntry, Fingerprint, ResponseCache, fingerprint};
pub use config::{Config, Secrets};
pub use error::{ErrorClass, HuginnError, Result};
pub use gateway::{Huginn, HuginnBuilder, MAX_QUESTION_CHARS, RequestExecutor};
pub use ledger::{AttemptError, AttemptRecord, LedgerConfig, MetricsLedger, Summary};
pub use prompt::{DirPromptSource, PromptSource, StaticPrompt};
pub use providers::{CompletionProvider, OpenRouterClient};
pub use resilience::{
    BackoffRetrier, BreakerConfig, BreakerRegistry, BreakerStats, CircuitBreaker, CircuitState,
    RetryConfig, UPSTREAM_BREAKER,
};
pub use version::{PKG_VERSION, version_string};

// Re-export all types
pub use types::{
    AssistantReply, Completion, CompletionOptions, DEFAULT_CONFIDENCE, DEFAULT_MODEL, Health,
    Message, QueryMetrics, QueryResponse, RecommendedAction, Role, Usage,
};
