//! RequestExecutor: cache, breaker, retrier and ledger around one upstream call.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, error, info, instrument};

use crate::cache::{Fingerprint, ResponseCache};
use crate::ledger::{AttemptRecord, MetricsLedger, Summary};
use crate::prompt::PromptSource;
use crate::providers::CompletionProvider;
use crate::resilience::{BackoffRetrier, BreakerRegistry, CircuitState};
use crate::telemetry;
use crate::types::{
    AssistantReply, Completion, CompletionOptions, Health, Message, QueryMetrics, QueryResponse,
    Usage,
};
use crate::{HuginnError, Result};

/// Longest accepted question, in characters.
pub const MAX_QUESTION_CHARS: usize = 1000;

/// Default price per token used for cost estimates.
pub const DEFAULT_USD_PER_TOKEN: f64 = 0.000_001;

/// Runs assistant queries end to end.
///
/// On a cache hit the stored response is returned and nothing else is
/// touched; the ledger only ever sees upstream attempts. On a miss the
/// upstream call runs as `breaker.fire(retrier.execute(provider.complete))`,
/// the outcome is recorded in the ledger, and successful responses are
/// cached. Construct with [`Huginn::builder()`](super::Huginn::builder).
pub struct RequestExecutor {
    pub(crate) provider: Arc<dyn CompletionProvider>,
    pub(crate) prompts: Arc<dyn PromptSource>,
    pub(crate) prompt_name: String,
    pub(crate) options: CompletionOptions,
    pub(crate) retrier: BackoffRetrier,
    pub(crate) breakers: Arc<BreakerRegistry>,
    pub(crate) breaker_name: String,
    pub(crate) cache: Arc<ResponseCache>,
    pub(crate) ledger: Arc<MetricsLedger>,
    pub(crate) usd_per_token: f64,
    pub(crate) started: Instant,
}

impl RequestExecutor {
    /// Answer `question` with the configured default model.
    pub async fn ask(&self, question: &str) -> Result<QueryResponse> {
        self.run(question, &self.options.model).await
    }

    /// Answer `question` with `model`.
    #[instrument(skip_all, fields(model = %model))]
    pub async fn run(&self, question: &str, model: &str) -> Result<QueryResponse> {
        validate_question(question)?;

        let fingerprint = Fingerprint::new(question, model);
        if let Some(cached) = self.cache.get(&fingerprint).await {
            return Ok(cached);
        }

        let system = self.prompts.load(&self.prompt_name).await?;
        let messages = [Message::system(system), Message::user(question)];
        let options = self.options.clone().model(model);

        let start = Instant::now();
        let outcome = self.call_upstream(&messages, &options).await;
        self.record_request(start, outcome.is_ok());

        let (completion, reply) = match outcome {
            Ok(done) => done,
            Err(e) => {
                error!(class = e.class().as_str(), error = %e, "assistant query failed");
                let record = AttemptRecord::failure(&e)
                    .with_model(model)
                    .with_question(question);
                self.ledger.record(record).await;
                return Err(e);
            }
        };

        let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        let usage = completion.usage;
        let estimated_usd = self.estimate_cost(&usage);
        let confidence = reply.confidence();
        self.record_tokens(&usage);

        let record = AttemptRecord::success(latency_ms, usage, estimated_usd)
            .with_confidence(confidence)
            .with_model(model)
            .with_question(question);
        self.ledger.record(record).await;

        let response = QueryResponse {
            message_id: fingerprint.to_string(),
            answer: reply.answer,
            confidence,
            recommended_actions: reply.recommended_actions,
            metrics: QueryMetrics {
                tokens: usage.total_tokens,
                latency_ms,
                estimated_usd,
            },
            timestamp: Utc::now(),
        };
        self.cache.put(fingerprint, response.clone()).await;

        info!(
            latency_ms,
            tokens = usage.total_tokens,
            confidence,
            "assistant query answered"
        );
        Ok(response)
    }

    /// One breaker-guarded, retried upstream call, with the reply parsed.
    ///
    /// Parsing happens after the breaker settles: a malformed reply is a
    /// failed query but not an upstream fault.
    async fn call_upstream(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<(Completion, AssistantReply)> {
        let breaker = self.breakers.get(&self.breaker_name);
        let completion = breaker
            .fire(|| {
                self.retrier
                    .execute(|| self.provider.complete(messages, options))
            })
            .await?;
        debug!(
            provider = self.provider.name(),
            tokens = completion.usage.total_tokens,
            "upstream completion received"
        );
        let reply = AssistantReply::parse(&completion.content)?;
        Ok((completion, reply))
    }

    /// Aggregate ledger summary.
    pub fn summary(&self) -> Summary {
        self.ledger.summarize()
    }

    /// Liveness report.
    pub fn health(&self) -> Health {
        Health {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            uptime: self.started.elapsed().as_secs_f64(),
        }
    }

    /// Current state of the upstream breaker.
    pub fn breaker_state(&self) -> CircuitState {
        self.breakers.get(&self.breaker_name).state()
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn ledger(&self) -> &MetricsLedger {
        &self.ledger
    }

    pub fn breakers(&self) -> &BreakerRegistry {
        &self.breakers
    }

    /// Default completion options (model, temperature, max tokens).
    pub fn options(&self) -> &CompletionOptions {
        &self.options
    }

    fn estimate_cost(&self, usage: &Usage) -> f64 {
        f64::from(usage.total_tokens) * self.usd_per_token
    }

    fn record_request(&self, start: Instant, ok: bool) {
        let provider = self.provider.name().to_owned();
        let status = if ok { "ok" } else { "error" };
        metrics::counter!(telemetry::REQUESTS_TOTAL,
            "provider" => provider.clone(),
            "status" => status,
        )
        .increment(1);
        metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS,
            "provider" => provider,
        )
        .record(start.elapsed().as_secs_f64());
    }

    fn record_tokens(&self, usage: &Usage) {
        let provider = self.provider.name().to_owned();
        metrics::counter!(telemetry::TOKENS_TOTAL,
            "provider" => provider.clone(),
            "direction" => "prompt",
        )
        .increment(u64::from(usage.prompt_tokens));
        metrics::counter!(telemetry::TOKENS_TOTAL,
            "provider" => provider,
            "direction" => "completion",
        )
        .increment(u64::from(usage.completion_tokens));
    }
}

impl std::fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("provider", &self.provider.name())
            .field("prompt", &self.prompt_name)
            .field("model", &self.options.model)
            .field("breaker", &self.breaker_name)
            .finish_non_exhaustive()
    }
}

/// Reject blank questions and questions over [`MAX_QUESTION_CHARS`].
pub fn validate_question(question: &str) -> Result<()> {
    if question.trim().is_empty() {
        return Err(HuginnError::InvalidInput("question must not be empty".into()));
    }
    let len = question.chars().count();
    if len > MAX_QUESTION_CHARS {
        return Err(HuginnError::InvalidInput(format!(
            "question is {len} characters, limit is {MAX_QUESTION_CHARS}"
        )));
    }
    Ok(())
}
