//! Orchestrator configuration.

use std::str::FromStr;
use std::time::Duration;

use resilience::{CircuitBreakerConfig, RateLimitConfig};

/// Tunables for the request pipeline.
///
/// Defaults are starting points; production values belong in the
/// environment (see [`OrchestratorConfig::from_env`]).
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Minimum confidence for a tool-backed intent to be served by its tool.
    pub confidence_threshold: f64,
    /// Below this the classifier falls back to generic classification.
    pub min_confidence: f64,
    /// Additional attempts after the first execution path fails.
    pub retry_budget: u32,
    /// Overall deadline per request.
    pub request_timeout: Duration,
    /// Per-call timeout for AI providers.
    pub provider_timeout: Duration,
    /// Per-call timeout for tools.
    pub tool_timeout: Duration,
    /// Lifetime of cached responses; `None` disables the response cache.
    pub response_cache_ttl: Option<Duration>,
    /// Maximum entries in the in-memory cache.
    pub cache_max_entries: usize,
    /// Breaker configuration shared by every dependency.
    pub breaker: CircuitBreakerConfig,
    /// Token bucket for `user:` actors.
    pub user_rate_limit: RateLimitConfig,
    /// Token bucket for `tool:` and `provider:` actors.
    pub dependency_rate_limit: RateLimitConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.6,
            min_confidence: 0.3,
            retry_budget: 2,
            request_timeout: Duration::from_millis(8000),
            provider_timeout: Duration::from_millis(5000),
            tool_timeout: Duration::from_millis(3000),
            response_cache_ttl: Some(Duration::from_secs(30)),
            cache_max_entries: 5000,
            breaker: CircuitBreakerConfig::default(),
            user_rate_limit: RateLimitConfig::new(10, 0.5).with_burst(5),
            dependency_rate_limit: RateLimitConfig::new(30, 5.0),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl OrchestratorConfig {
    /// Create configuration from environment variables.
    ///
    /// Missing or unparseable values fall back to the defaults.
    ///
    /// - `ORCH_CONFIDENCE_THRESHOLD` (0.6)
    /// - `ORCH_MIN_CONFIDENCE` (0.3)
    /// - `ORCH_RETRY_BUDGET` (2)
    /// - `ORCH_REQUEST_TIMEOUT_MS` (8000)
    /// - `ORCH_PROVIDER_TIMEOUT_MS` (5000)
    /// - `ORCH_TOOL_TIMEOUT_MS` (3000)
    /// - `ORCH_RESPONSE_CACHE_TTL_SECS` (30, 0 disables)
    /// - `ORCH_CACHE_MAX_ENTRIES` (5000)
    /// - `BREAKER_FAILURE_THRESHOLD` (5)
    /// - `BREAKER_FAILURE_WINDOW_SECS` (60)
    /// - `BREAKER_COOLDOWN_SECS` (30)
    /// - `RATE_LIMIT_USER_CAPACITY` (10)
    /// - `RATE_LIMIT_USER_REFILL_PER_SEC` (0.5)
    /// - `RATE_LIMIT_USER_BURST` (5)
    /// - `RATE_LIMIT_DEPENDENCY_CAPACITY` (30)
    /// - `RATE_LIMIT_DEPENDENCY_REFILL_PER_SEC` (5.0)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let cache_ttl_secs: u64 = env_or(
            "ORCH_RESPONSE_CACHE_TTL_SECS",
            defaults.response_cache_ttl.map_or(0, |d| d.as_secs()),
        );

        let breaker = CircuitBreakerConfig::new()
            .with_failure_threshold(env_or(
                "BREAKER_FAILURE_THRESHOLD",
                defaults.breaker.failure_threshold,
            ))
            .with_failure_window(Duration::from_secs(env_or(
                "BREAKER_FAILURE_WINDOW_SECS",
                defaults.breaker.failure_window.as_secs(),
            )))
            .with_cooldown(Duration::from_secs(env_or(
                "BREAKER_COOLDOWN_SECS",
                defaults.breaker.cooldown.as_secs(),
            )));

        let user_rate_limit = RateLimitConfig::new(
            env_or("RATE_LIMIT_USER_CAPACITY", defaults.user_rate_limit.capacity),
            env_or(
                "RATE_LIMIT_USER_REFILL_PER_SEC",
                defaults.user_rate_limit.refill_per_sec,
            ),
        )
        .with_burst(env_or("RATE_LIMIT_USER_BURST", defaults.user_rate_limit.burst));

        let dependency_rate_limit = RateLimitConfig::new(
            env_or(
                "RATE_LIMIT_DEPENDENCY_CAPACITY",
                defaults.dependency_rate_limit.capacity,
            ),
            env_or(
                "RATE_LIMIT_DEPENDENCY_REFILL_PER_SEC",
                defaults.dependency_rate_limit.refill_per_sec,
            ),
        );

        Self {
            confidence_threshold: env_or("ORCH_CONFIDENCE_THRESHOLD", defaults.confidence_threshold)
                .clamp(0.0, 1.0),
            min_confidence: env_or("ORCH_MIN_CONFIDENCE", defaults.min_confidence).clamp(0.0, 1.0),
            retry_budget: env_or("ORCH_RETRY_BUDGET", defaults.retry_budget),
            request_timeout: Duration::from_millis(env_or(
                "ORCH_REQUEST_TIMEOUT_MS",
                defaults.request_timeout.as_millis() as u64,
            )),
            provider_timeout: Duration::from_millis(env_or(
                "ORCH_PROVIDER_TIMEOUT_MS",
                defaults.provider_timeout.as_millis() as u64,
            )),
            tool_timeout: Duration::from_millis(env_or(
                "ORCH_TOOL_TIMEOUT_MS",
                defaults.tool_timeout.as_millis() as u64,
            )),
            response_cache_ttl: (cache_ttl_secs > 0).then(|| Duration::from_secs(cache_ttl_secs)),
            cache_max_entries: env_or("ORCH_CACHE_MAX_ENTRIES", defaults.cache_max_entries),
            breaker,
            user_rate_limit,
            dependency_rate_limit,
        }
    }

    /// Set the tool confidence threshold.
    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Set the retry budget.
    pub fn with_retry_budget(mut self, budget: u32) -> Self {
        self.retry_budget = budget;
        self
    }

    /// Set the overall request deadline.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the per-call provider timeout.
    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    /// Set the per-call tool timeout.
    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    /// Set (or disable with `None`) the response cache lifetime.
    pub fn with_response_cache_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.response_cache_ttl = ttl;
        self
    }

    /// Set the breaker configuration.
    pub fn with_breaker(mut self, breaker: CircuitBreakerConfig) -> Self {
        self.breaker = breaker;
        self
    }

    /// Set the per-user token bucket.
    pub fn with_user_rate_limit(mut self, limit: RateLimitConfig) -> Self {
        self.user_rate_limit = limit;
        self
    }

    /// Set the per-dependency token bucket.
    pub fn with_dependency_rate_limit(mut self, limit: RateLimitConfig) -> Self {
        self.dependency_rate_limit = limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.confidence_threshold, 0.6);
        assert_eq!(config.min_confidence, 0.3);
        assert_eq!(config.retry_budget, 2);
        assert_eq!(config.request_timeout, Duration::from_secs(8));
        assert_eq!(config.response_cache_ttl, Some(Duration::from_secs(30)));
        assert_eq!(config.user_rate_limit.burst, 5);
    }

    // Environment-based scenarios live in one test because env vars are process-global.
    #[test]
    fn test_from_env_scenarios() {
        const VARS: [&str; 5] = [
            "ORCH_CONFIDENCE_THRESHOLD",
            "ORCH_RETRY_BUDGET",
            "ORCH_RESPONSE_CACHE_TTL_SECS",
            "BREAKER_COOLDOWN_SECS",
            "RATE_LIMIT_USER_CAPACITY",
        ];
        fn clear_all() {
            for var in VARS {
                std::env::remove_var(var);
            }
        }

        clear_all();
        let config = OrchestratorConfig::from_env();
        assert_eq!(config.retry_budget, 2);
        assert_eq!(config.breaker.cooldown, Duration::from_secs(30));

        std::env::set_var("ORCH_CONFIDENCE_THRESHOLD", "0.75");
        std::env::set_var("ORCH_RETRY_BUDGET", "not-a-number");
        std::env::set_var("ORCH_RESPONSE_CACHE_TTL_SECS", "0");
        std::env::set_var("BREAKER_COOLDOWN_SECS", "5");
        std::env::set_var("RATE_LIMIT_USER_CAPACITY", "3");

        let config = OrchestratorConfig::from_env();
        assert_eq!(config.confidence_threshold, 0.75);
        assert_eq!(config.retry_budget, 2);
        assert_eq!(config.response_cache_ttl, None);
        assert_eq!(config.breaker.cooldown, Duration::from_secs(5));
        assert_eq!(config.user_rate_limit.capacity, 3);

        clear_all();
    }
}
