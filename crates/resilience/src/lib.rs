//! Shared protective state for downstream dependencies.
//!
//! Everything in this crate is process-wide, shared across requests, and
//! internally synchronized so callers never hold external locks:
//!
//! - [`Cache`] - TTL + tag-invalidated key/value cache over a pluggable
//!   [`CacheBackend`], with single-flight [`Cache::get_or_compute`]
//! - [`CircuitBreaker`] / [`BreakerRegistry`] - per-dependency failure
//!   tracking with a Closed / Open / HalfOpen state machine
//! - [`RateLimiter`] - token buckets keyed by actor (user or dependency)
//!
//! # Example
//!
//! ```rust,ignore
//! use resilience::{BreakerRegistry, Cache, RateLimiter};
//! use std::time::Duration;
//!
//! let cache = Cache::in_memory(5_000);
//! let value = cache
//!     .get_or_compute("price:BTC", Some(Duration::from_secs(30)), &["price"], || async {
//!         fetch_price("BTC").await
//!     })
//!     .await?;
//! ```

mod backend;
mod cache;
mod circuit_breaker;
mod error;
mod rate_limiter;

pub use backend::{CacheBackend, CacheEntry, MemoryBackend};
pub use cache::Cache;
pub use circuit_breaker::{
    BreakerPermit, BreakerRegistry, BreakerState, CircuitBreaker, CircuitBreakerConfig,
    CircuitState,
};
pub use error::{BreakerError, CacheError, RateLimitError};
pub use rate_limiter::{RateLimitConfig, RateLimitDecision, RateLimiter};
