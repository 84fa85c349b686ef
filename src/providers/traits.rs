//! Upstream completion provider trait.
//!
//! The executor talks to the upstream model only through
//! [`CompletionProvider`]; [`OpenRouterClient`](super::OpenRouterClient) is
//! the production implementation and tests substitute scripted providers.
//!
//! # Error contract
//!
//! Implementations report failures with the variants the retrier and the
//! executor classify on:
//! - `RateLimited` or `Api` with a 5xx status: transient, retried
//! - `Http`: transport failure, treated as upstream-unavailable and retried
//! - `MalformedResponse`, `AuthenticationFailed`, other `Api`: permanent

use async_trait::async_trait;

use crate::Result;
use crate::types::{Completion, CompletionOptions, Message};

/// One-shot chat completion against an upstream model.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Provider name for logging and metric labels.
    fn name(&self) -> &str;

    /// Complete `messages` with `options`.
    ///
    /// A single attempt: retries and timeouts belong to the caller.
    async fn complete(&self, messages: &[Message], options: &CompletionOptions)
    -> Result<Completion>;
}
