//! Fault tolerance for upstream calls.
//!
//! - [`BackoffRetrier`] re-runs transient failures with exponential backoff
//!   and jitter.
//! - [`CircuitBreaker`] fails fast while an upstream is unhealthy, probing
//!   for recovery after a cool-down. Breakers are shared per dependency
//!   through a [`BreakerRegistry`].

pub mod circuit;
pub mod retry;

pub use circuit::{
    BreakerConfig, BreakerRegistry, BreakerStats, CircuitBreaker, CircuitState, UPSTREAM_BREAKER,
};
pub use retry::{BackoffRetrier, RetryConfig};
