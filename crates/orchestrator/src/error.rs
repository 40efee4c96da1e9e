//! Error types for orchestrator operations.

use std::time::Duration;

use agent_tools::ToolError;
use brain_core::BrainError;
use thiserror::Error;

/// Errors that can occur while serving a request.
///
/// Every variant maps to a user-safe explanation via
/// [`OrchestratorError::user_message`]; the `Display` text is for logs.
#[derive(Debug, Clone, Error)]
pub enum OrchestratorError {
    /// No intent scored above the minimum confidence.
    #[error("classification ambiguous (best confidence {confidence:.2})")]
    ClassificationAmbiguous { confidence: f64 },

    /// A dependency refused the call (circuit open, unreachable).
    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),

    /// A rate limit was hit.
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    /// A call or the whole request ran out of time.
    #[error("timed out")]
    Timeout,

    /// A required tool failed.
    #[error("tool failure: {0}")]
    ToolFailure(String),

    /// A provider returned unusable output.
    #[error("provider returned malformed output: {0}")]
    ProviderMalformed(String),

    /// Every execution path failed.
    #[error("all execution paths failed: {}", attempts.join(", "))]
    Exhausted { attempts: Vec<String> },

    /// The orchestrator is misconfigured.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl OrchestratorError {
    /// Human-readable explanation safe to show the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::ClassificationAmbiguous { .. } => {
                "I'm not sure what you mean. Could you rephrase that?".to_string()
            }
            Self::DependencyUnavailable(_) => {
                "That service is temporarily unavailable. Please try again shortly.".to_string()
            }
            Self::RateLimited {
                retry_after: Some(after),
            } => format!(
                "You're sending requests faster than I can answer. Please try again in {} second(s).",
                after.as_secs().max(1)
            ),
            Self::RateLimited { retry_after: None } => {
                "You're sending requests faster than I can answer. Please try again shortly."
                    .to_string()
            }
            Self::Timeout => "That took too long to answer. Please try again in a moment.".to_string(),
            Self::ToolFailure(_) => "I couldn't fetch that information right now.".to_string(),
            Self::ProviderMalformed(_) => {
                "I got an unusable answer. Please try again.".to_string()
            }
            Self::Exhausted { attempts } if !attempts.is_empty() => format!(
                "I couldn't answer that right now. I tried: {}.",
                attempts.join(", ")
            ),
            Self::Exhausted { .. } => "I couldn't answer that right now.".to_string(),
            Self::Configuration(_) => "I'm not set up to answer that yet.".to_string(),
        }
    }

    /// Short label for logs and response metadata.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ClassificationAmbiguous { .. } => "classification_ambiguous",
            Self::DependencyUnavailable(_) => "dependency_unavailable",
            Self::RateLimited { .. } => "rate_limited",
            Self::Timeout => "timeout",
            Self::ToolFailure(_) => "tool_failure",
            Self::ProviderMalformed(_) => "provider_malformed",
            Self::Exhausted { .. } => "exhausted",
            Self::Configuration(_) => "configuration",
        }
    }
}

impl From<BrainError> for OrchestratorError {
    fn from(err: BrainError) -> Self {
        match err {
            BrainError::Timeout => Self::Timeout,
            BrainError::RateLimited { retry_after } => Self::RateLimited { retry_after },
            BrainError::Unavailable(msg) | BrainError::Network(msg) => {
                Self::DependencyUnavailable(msg)
            }
            BrainError::Malformed(msg) => Self::ProviderMalformed(msg),
            BrainError::Configuration(msg) => Self::Configuration(msg),
        }
    }
}

impl From<ToolError> for OrchestratorError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::Timeout { .. } => Self::Timeout,
            ToolError::RateLimited { retry_after } => Self::RateLimited {
                retry_after: Some(retry_after),
            },
            ToolError::DependencyUnavailable(msg) => Self::DependencyUnavailable(msg),
            other => Self::ToolFailure(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages_hide_internals() {
        let err = OrchestratorError::ToolFailure("HTTP error: connection reset by peer".into());
        assert!(!err.user_message().contains("connection reset"));

        let err = OrchestratorError::ProviderMalformed("expected value at line 1".into());
        assert!(!err.user_message().contains("line 1"));
    }

    #[test]
    fn test_exhausted_names_attempts() {
        let err = OrchestratorError::Exhausted {
            attempts: vec!["tool:crypto_price".into(), "provider:grok".into()],
        };
        let text = err.user_message();
        assert!(text.contains("tool:crypto_price"));
        assert!(text.contains("provider:grok"));
        assert_eq!(err.kind(), "exhausted");
    }

    #[test]
    fn test_rate_limit_message_includes_retry_after() {
        let err = OrchestratorError::RateLimited {
            retry_after: Some(Duration::from_secs(7)),
        };
        assert!(err.user_message().contains("7 second"));
    }

    #[test]
    fn test_from_brain_error() {
        assert!(matches!(
            OrchestratorError::from(BrainError::Malformed("x".into())),
            OrchestratorError::ProviderMalformed(_)
        ));
        assert!(matches!(
            OrchestratorError::from(BrainError::Network("x".into())),
            OrchestratorError::DependencyUnavailable(_)
        ));
    }

    #[test]
    fn test_from_tool_error() {
        assert!(matches!(
            OrchestratorError::from(ToolError::Timeout {
                tool: "x".into(),
                after: Duration::from_secs(1)
            }),
            OrchestratorError::Timeout
        ));
        assert!(matches!(
            OrchestratorError::from(ToolError::ExecutionFailed("x".into())),
            OrchestratorError::ToolFailure(_)
        ));
    }
}
