//! Error types for language-model operations.

use thiserror::Error;

/// Errors from the language-model capability.
#[derive(Error, Debug)]
pub enum LlmError {
    /// Invalid provider configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport-level failure talking to the service.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The call exceeded its deadline.
    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    /// The service asked us to slow down.
    #[error("Rate limited by the service")]
    RateLimited,

    /// The service answered but the payload was unusable.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The service reported an internal failure.
    #[error("Service error (status {status}): {message}")]
    Service { status: u16, message: String },
}

impl LlmError {
    /// Whether a retry with backoff can plausibly succeed.
    ///
    /// Timeouts, rate limits, transport failures, and 5xx responses are
    /// transient; configuration and malformed-payload errors are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::RateLimited | Self::Http(_) => true,
            Self::Service { status, .. } => *status >= 500,
            Self::Config(_) | Self::InvalidResponse(_) => false,
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(0)
        } else {
            Self::Http(err.to_string())
        }
    }
}

/// Result type for language-model operations.
pub type LlmResult<T> = std::result::Result<T, LlmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(LlmError::Timeout(30_000).is_transient());
        assert!(LlmError::RateLimited.is_transient());
        assert!(LlmError::Service {
            status: 503,
            message: "overloaded".into()
        }
        .is_transient());
        assert!(!LlmError::Service {
            status: 400,
            message: "bad request".into()
        }
        .is_transient());
        assert!(!LlmError::InvalidResponse("not json".into()).is_transient());
        assert!(!LlmError::Config("missing key".into()).is_transient());
    }
}
