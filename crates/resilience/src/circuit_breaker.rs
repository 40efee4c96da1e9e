//! Circuit breaker pattern implementation
//!
//! Provides fault tolerance by preventing calls to a failing dependency.
//! The circuit breaker has three states:
//! - Closed: Normal operation, failures are counted in a rolling window
//! - Open: Failures exceeded threshold, requests fail fast
//! - HalfOpen: Cooldown elapsed, exactly one trial request is admitted

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::BreakerError;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation - requests pass through
    Closed,
    /// Failures exceeded threshold - requests are rejected
    Open,
    /// Testing recovery - a single trial request passes through
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Open => write!(f, "Open"),
            Self::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}

/// Configuration for circuit breaker
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of failures within the window before opening the circuit
    pub failure_threshold: u32,
    /// Rolling window failures are counted in
    pub failure_window: Duration,
    /// Duration to wait before transitioning from open to half-open
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            failure_window: Duration::from_secs(60),
            cooldown: Duration::from_secs(30),
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set failure threshold
    #[must_use]
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    /// Set failure window
    #[must_use]
    pub fn with_failure_window(mut self, window: Duration) -> Self {
        self.failure_window = window;
        self
    }

    /// Set cooldown before the half-open trial
    #[must_use]
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }
}

/// Point-in-time view of one breaker.
#[derive(Debug, Clone)]
pub struct BreakerState {
    /// Dependency name.
    pub name: String,
    /// Current state.
    pub state: CircuitState,
    /// Failures counted in the current window.
    pub failure_count: u32,
    /// Most recent failure, if any.
    pub last_failure_at: Option<Instant>,
    /// End of the current cooldown while open.
    pub opened_until: Option<Instant>,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failures: VecDeque<Instant>,
    last_failure_at: Option<Instant>,
    opened_until: Option<Instant>,
    trial_in_flight: bool,
}

/// Circuit breaker guarding one dependency
///
/// All transitions happen under a per-breaker lock, so the HalfOpen trial
/// slot is handed to exactly one caller.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker
    #[must_use]
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failures: VecDeque::new(),
                last_failure_at: None,
                opened_until: None,
                trial_in_flight: false,
            }),
        }
    }

    /// Create with default configuration
    #[must_use]
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, CircuitBreakerConfig::default())
    }

    /// Get the circuit breaker name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get the current state, applying a due Open -> HalfOpen transition
    #[must_use]
    pub fn state(&self) -> CircuitState {
        let mut inner = self.lock();
        self.check_cooldown(&mut inner, Instant::now());
        inner.state
    }

    /// Whether a call would currently be rejected outright
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    /// Whether [`try_acquire`](Self::try_acquire) would currently grant a permit.
    ///
    /// False while Open, and while HalfOpen with the trial already taken.
    #[must_use]
    pub fn admits(&self) -> bool {
        let mut inner = self.lock();
        self.check_cooldown(&mut inner, Instant::now());
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => false,
            CircuitState::HalfOpen => !inner.trial_in_flight,
        }
    }

    /// Snapshot of the breaker's bookkeeping
    #[must_use]
    pub fn snapshot(&self) -> BreakerState {
        let now = Instant::now();
        let mut inner = self.lock();
        self.check_cooldown(&mut inner, now);
        self.prune(&mut inner, now);
        BreakerState {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failures.len() as u32,
            last_failure_at: inner.last_failure_at,
            opened_until: inner.opened_until,
        }
    }

    /// Ask permission to call the dependency.
    ///
    /// Returns a permit that must be settled with
    /// [`BreakerPermit::success`] or [`BreakerPermit::failure`].
    pub fn try_acquire(self: &Arc<Self>) -> Result<BreakerPermit, BreakerError> {
        let now = Instant::now();
        let mut inner = self.lock();
        self.check_cooldown(&mut inner, now);

        match inner.state {
            CircuitState::Closed => Ok(BreakerPermit::new(self.clone(), false)),
            CircuitState::Open => {
                let retry_after = inner
                    .opened_until
                    .map(|until| until.saturating_duration_since(now))
                    .unwrap_or(self.config.cooldown);
                Err(BreakerError::Open {
                    name: self.name.clone(),
                    retry_after,
                })
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    return Err(BreakerError::TrialInFlight {
                        name: self.name.clone(),
                    });
                }
                inner.trial_in_flight = true;
                debug!(name = %self.name, "Circuit breaker admitted trial request");
                Ok(BreakerPermit::new(self.clone(), true))
            }
        }
    }

    fn record_success(&self, trial: bool) {
        let mut inner = self.lock();
        if trial {
            inner.trial_in_flight = false;
            if inner.state == CircuitState::HalfOpen {
                info!(name = %self.name, "Circuit breaker closed after successful trial");
                inner.state = CircuitState::Closed;
                inner.failures.clear();
                inner.opened_until = None;
            }
        } else if inner.state == CircuitState::Closed {
            // Failures must be consecutive to trip the breaker
            inner.failures.clear();
        }
    }

    fn record_failure(&self, trial: bool) {
        let now = Instant::now();
        let mut inner = self.lock();
        inner.last_failure_at = Some(now);

        if trial {
            inner.trial_in_flight = false;
            if inner.state == CircuitState::HalfOpen {
                warn!(name = %self.name, "Circuit breaker trial failed, reopening");
                self.open(&mut inner, now);
            }
            return;
        }

        if inner.state != CircuitState::Closed {
            return;
        }

        self.prune(&mut inner, now);
        inner.failures.push_back(now);
        let failures = inner.failures.len() as u32;

        debug!(
            name = %self.name,
            failures = failures,
            threshold = self.config.failure_threshold,
            "Circuit breaker failure recorded"
        );

        if failures >= self.config.failure_threshold {
            info!(name = %self.name, failures = failures, "Circuit breaker opened");
            self.open(&mut inner, now);
        }
    }

    fn release_trial(&self) {
        let mut inner = self.lock();
        if inner.trial_in_flight {
            debug!(name = %self.name, "Circuit breaker trial abandoned");
            inner.trial_in_flight = false;
        }
    }

    fn open(&self, inner: &mut Inner, now: Instant) {
        inner.state = CircuitState::Open;
        inner.opened_until = Some(now + self.config.cooldown);
        inner.failures.clear();
    }

    fn check_cooldown(&self, inner: &mut Inner, now: Instant) {
        if inner.state != CircuitState::Open {
            return;
        }
        if inner.opened_until.map_or(true, |until| now >= until) {
            info!(name = %self.name, "Circuit breaker entering half-open state");
            inner.state = CircuitState::HalfOpen;
            inner.trial_in_flight = false;
        }
    }

    fn prune(&self, inner: &mut Inner, now: Instant) {
        while let Some(oldest) = inner.failures.front() {
            if now.saturating_duration_since(*oldest) > self.config.failure_window {
                inner.failures.pop_front();
            } else {
                break;
            }
        }
    }

    /// Reset the circuit breaker to closed state
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.state = CircuitState::Closed;
        inner.failures.clear();
        inner.opened_until = None;
        inner.trial_in_flight = false;
    }
}

/// Permission to make one call through a breaker.
///
/// Dropping an unsettled permit (for example when the call is cancelled)
/// frees the half-open trial slot without changing state.
#[derive(Debug)]
#[must_use = "settle the permit with success() or failure()"]
pub struct BreakerPermit {
    breaker: Arc<CircuitBreaker>,
    trial: bool,
    settled: bool,
}

impl BreakerPermit {
    fn new(breaker: Arc<CircuitBreaker>, trial: bool) -> Self {
        Self {
            breaker,
            trial,
            settled: false,
        }
    }

    /// Whether this permit is the half-open trial.
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    /// Report that the call succeeded.
    pub fn success(mut self) {
        self.settled = true;
        self.breaker.record_success(self.trial);
    }

    /// Report that the call failed.
    pub fn failure(mut self) {
        self.settled = true;
        self.breaker.record_failure(self.trial);
    }
}

impl Drop for BreakerPermit {
    fn drop(&mut self) {
        if !self.settled && self.trial {
            self.breaker.release_trial();
        }
    }
}

/// One breaker per downstream dependency, created on first use.
#[derive(Debug, Default)]
pub struct BreakerRegistry {
    default_config: CircuitBreakerConfig,
    overrides: HashMap<String, CircuitBreakerConfig>,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    /// Create a registry with a default per-dependency configuration.
    pub fn new(default_config: CircuitBreakerConfig) -> Self {
        Self {
            default_config,
            overrides: HashMap::new(),
            breakers: DashMap::new(),
        }
    }

    /// Use a specific configuration for one dependency.
    pub fn with_override(mut self, name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        self.overrides.insert(name.into(), config);
        self
    }

    /// Get (or create) the breaker for a dependency.
    pub fn get(&self, name: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(name) {
            return existing.clone();
        }
        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                let config = self
                    .overrides
                    .get(name)
                    .cloned()
                    .unwrap_or_else(|| self.default_config.clone());
                Arc::new(CircuitBreaker::new(name, config))
            })
            .clone()
    }

    /// State of a dependency's breaker; unknown dependencies are Closed.
    pub fn state(&self, name: &str) -> CircuitState {
        self.breakers
            .get(name)
            .map(|breaker| breaker.state())
            .unwrap_or(CircuitState::Closed)
    }

    /// Whether a dependency's breaker would admit a call now; unknown
    /// dependencies always do.
    pub fn admits(&self, name: &str) -> bool {
        self.breakers
            .get(name)
            .map(|breaker| breaker.admits())
            .unwrap_or(true)
    }

    /// Snapshot of every known breaker, sorted by name.
    pub fn snapshot(&self) -> Vec<BreakerState> {
        let mut states: Vec<BreakerState> = self
            .breakers
            .iter()
            .map(|entry| entry.value().snapshot())
            .collect();
        states.sort_by(|a, b| a.name.cmp(&b.name));
        states
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, cooldown_secs: u64) -> Arc<CircuitBreaker> {
        Arc::new(CircuitBreaker::new(
            "test",
            CircuitBreakerConfig::new()
                .with_failure_threshold(threshold)
                .with_cooldown(Duration::from_secs(cooldown_secs)),
        ))
    }

    fn fail(cb: &Arc<CircuitBreaker>) {
        cb.try_acquire().unwrap().failure();
    }

    #[test]
    fn test_circuit_breaker_config_builder() {
        let config = CircuitBreakerConfig::new()
            .with_failure_threshold(10)
            .with_failure_window(Duration::from_secs(120))
            .with_cooldown(Duration::from_secs(45));

        assert_eq!(config.failure_threshold, 10);
        assert_eq!(config.failure_window, Duration::from_secs(120));
        assert_eq!(config.cooldown, Duration::from_secs(45));
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_after_threshold_failures() {
        let cb = breaker(3, 30);

        fail(&cb);
        fail(&cb);
        assert_eq!(cb.state(), CircuitState::Closed);
        fail(&cb);
        assert_eq!(cb.state(), CircuitState::Open);

        match cb.try_acquire() {
            Err(BreakerError::Open { retry_after, .. }) => {
                assert_eq!(retry_after, Duration::from_secs(30))
            }
            other => panic!("expected open error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_consecutive_failures() {
        let cb = breaker(3, 30);

        fail(&cb);
        fail(&cb);
        cb.try_acquire().unwrap().success();
        fail(&cb);
        fail(&cb);
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.snapshot().failure_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_outside_window_do_not_count() {
        let cb = Arc::new(CircuitBreaker::new(
            "windowed",
            CircuitBreakerConfig::new()
                .with_failure_threshold(2)
                .with_failure_window(Duration::from_secs(10)),
        ));

        fail(&cb);
        tokio::time::advance(Duration::from_secs(11)).await;
        fail(&cb);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_trial_success_closes() {
        let cb = breaker(1, 30);
        fail(&cb);
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        let permit = cb.try_acquire().unwrap();
        assert!(permit.is_trial());
        assert!(matches!(cb.try_acquire(), Err(BreakerError::TrialInFlight { .. })));

        permit.success();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(!cb.try_acquire().unwrap().is_trial());
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_trial_failure_reopens() {
        let cb = breaker(1, 30);
        fail(&cb);
        tokio::time::advance(Duration::from_secs(31)).await;

        cb.try_acquire().unwrap().failure();
        assert_eq!(cb.state(), CircuitState::Open);

        let snapshot = cb.snapshot();
        assert!(snapshot.opened_until.is_some());
        assert!(snapshot.last_failure_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_trial_frees_slot() {
        let cb = breaker(1, 5);
        fail(&cb);
        tokio::time::advance(Duration::from_secs(5)).await;

        let permit = cb.try_acquire().unwrap();
        drop(permit);
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(cb.try_acquire().unwrap().is_trial());
    }

    #[tokio::test(start_paused = true)]
    async fn test_admits_follows_trial_slot() {
        let cb = breaker(1, 10);
        assert!(cb.admits());

        fail(&cb);
        assert!(!cb.admits());

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(cb.admits());

        let permit = cb.try_acquire().unwrap();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(!cb.admits());

        drop(permit);
        assert!(cb.admits());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_exactly_one_concurrent_trial() {
        let cb = Arc::new(CircuitBreaker::new(
            "race",
            CircuitBreakerConfig::new()
                .with_failure_threshold(1)
                .with_cooldown(Duration::from_millis(20)),
        ));
        cb.try_acquire().unwrap().failure();
        tokio::time::sleep(Duration::from_millis(40)).await;

        let mut handles = Vec::new();
        for _ in 0..32 {
            let cb = cb.clone();
            handles.push(tokio::spawn(async move { cb.try_acquire().ok() }));
        }

        let mut permits = Vec::new();
        for handle in handles {
            if let Some(permit) = handle.await.unwrap() {
                permits.push(permit);
            }
        }
        assert_eq!(permits.len(), 1);
        assert!(permits[0].is_trial());
    }

    #[test]
    fn test_registry_creates_independent_breakers() {
        let registry = BreakerRegistry::new(CircuitBreakerConfig::new().with_failure_threshold(1))
            .with_override("sturdy", CircuitBreakerConfig::new().with_failure_threshold(5));

        registry.get("fragile").try_acquire().unwrap().failure();
        registry.get("sturdy").try_acquire().unwrap().failure();

        assert_eq!(registry.state("fragile"), CircuitState::Open);
        assert_eq!(registry.state("sturdy"), CircuitState::Closed);
        assert_eq!(registry.state("unknown"), CircuitState::Closed);
        assert!(Arc::ptr_eq(&registry.get("fragile"), &registry.get("fragile")));

        let names: Vec<String> = registry.snapshot().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["fragile", "sturdy"]);
    }

    #[test]
    fn test_circuit_state_display() {
        assert_eq!(CircuitState::Closed.to_string(), "Closed");
        assert_eq!(CircuitState::Open.to_string(), "Open");
        assert_eq!(CircuitState::HalfOpen.to_string(), "HalfOpen");
    }
}
