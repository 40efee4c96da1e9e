//! Error types for the protective layer.

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by [`Cache`](crate::Cache).
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// The computation behind `get_or_compute` failed.
    ///
    /// Every waiter on the same key receives a clone of the same error.
    #[error("computation failed: {0}")]
    ComputeFailed(Arc<dyn StdError + Send + Sync>),

    /// The backend itself failed (remote store unreachable, ...).
    #[error("cache backend error: {0}")]
    Backend(String),
}

impl CacheError {
    /// Borrow the original computation error as a concrete type.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        match self {
            Self::ComputeFailed(inner) => inner.as_ref().downcast_ref::<E>(),
            Self::Backend(_) => None,
        }
    }
}

/// A call was refused by a circuit breaker.
#[derive(Debug, Clone, Error)]
pub enum BreakerError {
    /// The breaker is open; the dependency is not called.
    #[error("dependency '{name}' unavailable (circuit open, retry in {retry_after:?})")]
    Open { name: String, retry_after: Duration },

    /// The breaker is half-open and its single trial call is already in flight.
    #[error("dependency '{name}' unavailable (recovery trial in progress)")]
    TrialInFlight { name: String },
}

impl BreakerError {
    /// Name of the dependency that refused the call.
    pub fn dependency(&self) -> &str {
        match self {
            Self::Open { name, .. } | Self::TrialInFlight { name } => name,
        }
    }
}

/// A token could not be acquired for an actor.
#[derive(Debug, Clone, Error)]
#[error("rate limited: '{actor}' may retry after {retry_after:?}")]
pub struct RateLimitError {
    /// The actor that ran out of tokens.
    pub actor: String,
    /// Time until a token is available again.
    pub retry_after: Duration,
}
