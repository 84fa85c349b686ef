//! Telemetry metric name constants.
//!
//! Centralised metric names for huginn operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `huginn_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `provider`: upstream provider name (e.g. "openrouter")
//! - `breaker`: circuit breaker name (e.g. "llm-service")
//! - `status`: "ok" or "error"
//! - `direction`: "prompt" or "completion"

/// Total upstream request sequences executed (cache misses only).
///
/// Labels: `provider`, `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "huginn_requests_total";

/// Upstream request duration in seconds, retries and breaker included.
///
/// Labels: `provider`.
pub const REQUEST_DURATION_SECONDS: &str = "huginn_request_duration_seconds";

/// Total retry attempts (not counting the initial request).
///
/// Labels: `operation`.
pub const RETRIES_TOTAL: &str = "huginn_retries_total";

/// Circuit breaker state transitions.
///
/// Labels: `breaker`, `to` ("open" | "half_open" | "closed").
pub const BREAKER_TRANSITIONS_TOTAL: &str = "huginn_breaker_transitions_total";

/// Calls rejected without invoking the wrapped operation.
///
/// Labels: `breaker`.
pub const BREAKER_REJECTIONS_TOTAL: &str = "huginn_breaker_rejections_total";

/// Total response cache hits.
pub const CACHE_HITS_TOTAL: &str = "huginn_cache_hits_total";

/// Total response cache misses.
pub const CACHE_MISSES_TOTAL: &str = "huginn_cache_misses_total";

/// Total tokens consumed.
///
/// Labels: `provider`, `direction` ("prompt" | "completion").
pub const TOKENS_TOTAL: &str = "huginn_tokens_total";
