//! Huginn error types and classification.

use std::time::Duration;

/// Huginn error types
#[derive(Debug, thiserror::Error)]
pub enum HuginnError {
    // Upstream/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("malformed upstream response: {0}")]
    MalformedResponse(String),

    // Circuit breaker errors
    #[error("circuit breaker '{breaker}' is open")]
    CircuitOpen { breaker: String },

    #[error("circuit breaker '{breaker}' timed out after {timeout:?}")]
    CircuitTimeout { breaker: String, timeout: Duration },

    // Input errors
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("prompt not found: {0}")]
    PromptNotFound(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    // Data/persistence errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Externally visible failure class.
///
/// Rate limiting and upstream unavailability surface distinctly; everything
/// else collapses into [`ErrorClass::Failed`] so internals are not leaked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    RateLimited,
    Unavailable,
    Failed,
}

impl ErrorClass {
    /// HTTP status a transport layer should answer with.
    pub fn http_status(self) -> u16 {
        match self {
            ErrorClass::RateLimited => 429,
            ErrorClass::Unavailable => 503,
            ErrorClass::Failed => 500,
        }
    }

    /// Caller-facing message.
    pub fn public_message(self) -> &'static str {
        match self {
            ErrorClass::RateLimited => "Rate limit exceeded. Please try again later.",
            ErrorClass::Unavailable => {
                "Upstream service temporarily unavailable. Please try again later."
            }
            ErrorClass::Failed => "Failed to process request. Please try again.",
        }
    }

    /// Short label for logs and metric tags.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorClass::RateLimited => "rate_limited",
            ErrorClass::Unavailable => "unavailable",
            ErrorClass::Failed => "failed",
        }
    }
}

impl HuginnError {
    /// Whether the retrier may try again.
    ///
    /// Rate limits, 5xx responses and transport failures (no response at all)
    /// are transient. Breaker errors are not: an open breaker must not burn
    /// retry budget, and the breaker owns its own timeout.
    pub fn is_transient(&self) -> bool {
        match self {
            HuginnError::RateLimited { .. } | HuginnError::Http(_) => true,
            HuginnError::Api { status, .. } => (500..600).contains(status),
            _ => false,
        }
    }

    /// Upstream HTTP status associated with this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            HuginnError::Api { status, .. } => Some(*status),
            HuginnError::RateLimited { .. } => Some(429),
            HuginnError::AuthenticationFailed => Some(401),
            _ => None,
        }
    }

    /// `retry-after` hint from a rate-limit response.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            HuginnError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Classify for the caller.
    pub fn class(&self) -> ErrorClass {
        match self {
            HuginnError::RateLimited { .. } => ErrorClass::RateLimited,
            HuginnError::Http(_)
            | HuginnError::CircuitOpen { .. }
            | HuginnError::CircuitTimeout { .. } => ErrorClass::Unavailable,
            HuginnError::Api { status, .. } if *status == 429 => ErrorClass::RateLimited,
            HuginnError::Api { status, .. } if (500..600).contains(status) => {
                ErrorClass::Unavailable
            }
            _ => ErrorClass::Failed,
        }
    }
}

/// Result type alias for Huginn operations
pub type Result<T> = std::result::Result<T, HuginnError>;
