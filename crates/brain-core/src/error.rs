//! Error types for AI provider calls.

use std::time::Duration;

use thiserror::Error;

/// Errors an AI provider can report from [`Brain::generate`](crate::Brain::generate).
#[derive(Debug, Clone, Error)]
pub enum BrainError {
    /// The provider did not answer in time.
    #[error("provider timed out")]
    Timeout,

    /// The provider rejected the call because of its own rate limits.
    #[error("provider rate limited (retry after {retry_after:?})")]
    RateLimited {
        /// How long the provider asked us to wait, if it said.
        retry_after: Option<Duration>,
    },

    /// The provider is down or unreachable.
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// The provider answered with output that could not be used.
    #[error("malformed provider output: {0}")]
    Malformed(String),

    /// The provider is misconfigured (missing key, bad URL, ...).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Transport-level failure talking to the provider.
    #[error("network error: {0}")]
    Network(String),
}

impl BrainError {
    /// Whether this failure should count against the provider's circuit breaker.
    ///
    /// Rate limiting is the provider working as intended and configuration
    /// errors will not heal by waiting, so neither trips the breaker.
    pub fn is_health_failure(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::Unavailable(_) | Self::Malformed(_) | Self::Network(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_failure_classification() {
        assert!(BrainError::Timeout.is_health_failure());
        assert!(BrainError::Unavailable("down".into()).is_health_failure());
        assert!(BrainError::Malformed("empty".into()).is_health_failure());
        assert!(!BrainError::RateLimited { retry_after: None }.is_health_failure());
        assert!(!BrainError::Configuration("no key".into()).is_health_failure());
    }

    #[test]
    fn test_display() {
        let err = BrainError::RateLimited {
            retry_after: Some(Duration::from_secs(2)),
        };
        assert_eq!(err.to_string(), "provider rate limited (retry after Some(2s))");
    }
}
