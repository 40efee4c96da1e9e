//! Error types for tool operations.

use std::time::Duration;

use resilience::{BreakerError, RateLimitError};
use thiserror::Error;

/// Errors that can occur during tool execution.
///
/// Cloneable so that a single failed computation can be handed to every
/// caller waiting on the same cache key.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    /// Tool not found in registry.
    #[error("Tool not found: {0}")]
    NotFound(String),

    /// Missing required parameter.
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    /// Invalid parameter value.
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// The call did not finish within its time limit.
    #[error("Tool '{tool}' timed out after {after:?}")]
    Timeout { tool: String, after: Duration },

    /// The tool's rate limit is exhausted.
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// The dependency behind the tool is unavailable (breaker open, unreachable).
    #[error("Dependency unavailable: {0}")]
    DependencyUnavailable(String),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// JSON parsing failed.
    #[error("JSON error: {0}")]
    JsonError(String),

    /// General execution error.
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

impl ToolError {
    /// Short machine-readable label for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::MissingParameter(_) => "missing_parameter",
            Self::InvalidParameter { .. } => "invalid_parameter",
            Self::Timeout { .. } => "timeout",
            Self::RateLimited { .. } => "rate_limited",
            Self::DependencyUnavailable(_) => "dependency_unavailable",
            Self::HttpError(_) => "http",
            Self::JsonError(_) => "json",
            Self::ExecutionFailed(_) => "execution_failed",
        }
    }

    /// Whether this error says something about the dependency's health.
    ///
    /// Bad input and local throttling must not trip a circuit breaker.
    pub fn is_health_failure(&self) -> bool {
        !matches!(
            self,
            Self::NotFound(_)
                | Self::MissingParameter(_)
                | Self::InvalidParameter { .. }
                | Self::RateLimited { .. }
        )
    }
}

impl From<reqwest::Error> for ToolError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                tool: err
                    .url()
                    .and_then(|u| u.host_str())
                    .unwrap_or("http")
                    .to_string(),
                after: Duration::ZERO,
            }
        } else if err.is_connect() {
            Self::DependencyUnavailable(err.to_string())
        } else {
            Self::HttpError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err.to_string())
    }
}

impl From<RateLimitError> for ToolError {
    fn from(err: RateLimitError) -> Self {
        Self::RateLimited {
            retry_after: err.retry_after,
        }
    }
}

impl From<BreakerError> for ToolError {
    fn from(err: BreakerError) -> Self {
        Self::DependencyUnavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_failures() {
        assert!(ToolError::ExecutionFailed("boom".into()).is_health_failure());
        assert!(ToolError::Timeout {
            tool: "x".into(),
            after: Duration::from_secs(1)
        }
        .is_health_failure());
        assert!(!ToolError::MissingParameter("symbol".into()).is_health_failure());
        assert!(!ToolError::RateLimited {
            retry_after: Duration::from_secs(1)
        }
        .is_health_failure());
    }

    #[test]
    fn test_from_resilience_errors() {
        let err: ToolError = RateLimitError {
            actor: "tool:crypto_price".into(),
            retry_after: Duration::from_secs(2),
        }
        .into();
        assert_eq!(err.kind(), "rate_limited");

        let err: ToolError = BreakerError::Open {
            name: "tool:crypto_price".into(),
            retry_after: Duration::from_secs(30),
        }
        .into();
        assert_eq!(err.kind(), "dependency_unavailable");
        assert!(err.to_string().contains("tool:crypto_price"));
    }
}
