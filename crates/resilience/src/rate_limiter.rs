//! Token-bucket rate limiting per actor.
//!
//! Actors are plain strings such as `user:+15551234567`,
//! `tool:crypto_price` or `provider:grok`. Each actor gets its own bucket;
//! buckets for different actors never contend on a shared lock.

use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

use crate::error::RateLimitError;

/// Default maximum number of tracked actors before idle buckets are dropped.
const DEFAULT_MAX_ACTORS: usize = 10_000;

/// Retry-after reported when a bucket never refills.
const NEVER_REFILLS: Duration = Duration::from_secs(3600);

/// Token bucket configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitConfig {
    /// Steady-state bucket size.
    pub capacity: u32,
    /// Tokens added per second.
    pub refill_per_sec: f64,
    /// Extra tokens above `capacity` an idle actor may spend at once.
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            refill_per_sec: 1.0,
            burst: 0,
        }
    }
}

impl RateLimitConfig {
    /// Create a config with no burst allowance.
    pub fn new(capacity: u32, refill_per_sec: f64) -> Self {
        Self {
            capacity,
            refill_per_sec,
            burst: 0,
        }
    }

    /// Set the burst allowance.
    pub fn with_burst(mut self, burst: u32) -> Self {
        self.burst = burst;
        self
    }

    /// Maximum tokens a bucket can hold.
    pub fn max_tokens(&self) -> f64 {
        f64::from(self.capacity.saturating_add(self.burst))
    }
}

/// Outcome of [`RateLimiter::acquire`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateLimitDecision {
    /// A token was taken.
    Allowed {
        /// Whole tokens left after this call.
        remaining: u32,
    },
    /// No token available.
    Denied {
        /// Time until the next token is available.
        retry_after: Duration,
    },
}

impl RateLimitDecision {
    /// Whether the call may proceed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
    config: RateLimitConfig,
}

impl Bucket {
    fn new(config: RateLimitConfig, now: Instant) -> Self {
        Self {
            tokens: config.max_tokens(),
            last_refill: now,
            config,
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.config.refill_per_sec).min(self.config.max_tokens());
        self.last_refill = now;
    }

    fn is_full(&self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens + elapsed * self.config.refill_per_sec >= self.config.max_tokens()
    }

    fn retry_after(&self) -> Duration {
        if self.config.refill_per_sec <= 0.0 {
            return NEVER_REFILLS;
        }
        let missing = (1.0 - self.tokens).max(0.0);
        Duration::from_secs_f64(missing / self.config.refill_per_sec)
    }
}

/// Per-actor token-bucket limiter.
///
/// Actor configuration is chosen by the longest matching prefix registered
/// with [`RateLimiter::with_actor_config`], else the default.
#[derive(Debug)]
pub struct RateLimiter {
    default_config: RateLimitConfig,
    prefixed: Vec<(String, RateLimitConfig)>,
    buckets: DashMap<String, Bucket>,
    max_actors: usize,
}

impl RateLimiter {
    /// Create a limiter applying `default_config` to every actor.
    pub fn new(default_config: RateLimitConfig) -> Self {
        Self {
            default_config,
            prefixed: Vec::new(),
            buckets: DashMap::new(),
            max_actors: DEFAULT_MAX_ACTORS,
        }
    }

    /// Use `config` for actors starting with `prefix`.
    pub fn with_actor_config(mut self, prefix: impl Into<String>, config: RateLimitConfig) -> Self {
        self.prefixed.push((prefix.into(), config));
        // Longest prefix first so the most specific rule wins
        self.prefixed.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        self
    }

    /// Bound the number of tracked actors.
    pub fn with_max_actors(mut self, max_actors: usize) -> Self {
        self.max_actors = max_actors.max(1);
        self
    }

    /// Configuration that applies to `actor`.
    pub fn config_for(&self, actor: &str) -> RateLimitConfig {
        self.prefixed
            .iter()
            .find(|(prefix, _)| actor.starts_with(prefix.as_str()))
            .map(|(_, config)| *config)
            .unwrap_or(self.default_config)
    }

    /// Take one token for `actor` if available.
    pub fn acquire(&self, actor: &str) -> RateLimitDecision {
        let now = Instant::now();
        let decision = {
            let mut bucket = self
                .buckets
                .entry(actor.to_string())
                .or_insert_with(|| Bucket::new(self.config_for(actor), now));
            bucket.refill(now);

            if bucket.tokens >= 1.0 {
                bucket.tokens -= 1.0;
                RateLimitDecision::Allowed {
                    remaining: bucket.tokens.floor() as u32,
                }
            } else {
                RateLimitDecision::Denied {
                    retry_after: bucket.retry_after(),
                }
            }
        };

        if let RateLimitDecision::Denied { retry_after } = decision {
            debug!(actor = %actor, retry_after_ms = retry_after.as_millis() as u64, "Rate limit denied");
        }

        self.evict_idle(now);
        decision
    }

    /// Like [`acquire`](Self::acquire) but as a `Result`.
    pub fn try_acquire(&self, actor: &str) -> Result<(), RateLimitError> {
        match self.acquire(actor) {
            RateLimitDecision::Allowed { .. } => Ok(()),
            RateLimitDecision::Denied { retry_after } => Err(RateLimitError {
                actor: actor.to_string(),
                retry_after,
            }),
        }
    }

    /// Whole tokens currently available to `actor`, without taking one.
    pub fn remaining(&self, actor: &str) -> u32 {
        let now = Instant::now();
        match self.buckets.get_mut(actor) {
            Some(mut bucket) => {
                bucket.refill(now);
                bucket.tokens.floor() as u32
            }
            None => self.config_for(actor).max_tokens() as u32,
        }
    }

    /// Number of actors currently tracked.
    pub fn tracked_actors(&self) -> usize {
        self.buckets.len()
    }

    /// Drop buckets that have fully refilled; a fresh bucket is identical.
    fn evict_idle(&self, now: Instant) {
        if self.buckets.len() <= self.max_actors {
            return;
        }
        self.buckets.retain(|_, bucket| !bucket.is_full(now));
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_allows_up_to_capacity_then_denies() {
        let limiter = RateLimiter::new(RateLimitConfig::new(3, 1.0));

        for expected_remaining in [2, 1, 0] {
            assert_eq!(
                limiter.acquire("user:alice"),
                RateLimitDecision::Allowed {
                    remaining: expected_remaining
                }
            );
        }

        match limiter.acquire("user:alice") {
            RateLimitDecision::Denied { retry_after } => {
                assert_eq!(retry_after, Duration::from_secs(1));
            }
            other => panic!("expected denial, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_refills_over_time() {
        let limiter = RateLimiter::new(RateLimitConfig::new(1, 2.0));

        assert!(limiter.acquire("tool:x").is_allowed());
        assert!(!limiter.acquire("tool:x").is_allowed());

        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(limiter.acquire("tool:x").is_allowed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_adds_headroom() {
        let limiter = RateLimiter::new(RateLimitConfig::new(2, 0.1).with_burst(3));
        let allowed = (0..10).filter(|_| limiter.acquire("user:bob").is_allowed()).count();
        assert_eq!(allowed, 5);
    }

    #[test]
    fn test_actors_are_independent() {
        let limiter = RateLimiter::new(RateLimitConfig::new(1, 0.0));
        assert!(limiter.try_acquire("user:a").is_ok());
        assert!(limiter.try_acquire("user:b").is_ok());

        let err = limiter.try_acquire("user:a").unwrap_err();
        assert_eq!(err.actor, "user:a");
        assert_eq!(err.retry_after, NEVER_REFILLS);
    }

    #[test]
    fn test_prefix_configuration() {
        let limiter = RateLimiter::new(RateLimitConfig::new(100, 10.0))
            .with_actor_config("user:", RateLimitConfig::new(2, 1.0))
            .with_actor_config("user:vip:", RateLimitConfig::new(50, 5.0));

        assert_eq!(limiter.config_for("user:alice").capacity, 2);
        assert_eq!(limiter.config_for("user:vip:carol").capacity, 50);
        assert_eq!(limiter.config_for("provider:grok").capacity, 100);
        assert_eq!(limiter.remaining("user:alice"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_buckets_are_evicted() {
        let limiter = RateLimiter::new(RateLimitConfig::new(1, 1.0)).with_max_actors(2);
        limiter.acquire("a");
        limiter.acquire("b");
        tokio::time::advance(Duration::from_secs(5)).await;
        limiter.acquire("c");

        // a and b refilled and were dropped; c is still draining.
        assert_eq!(limiter.tracked_actors(), 1);
    }
}
