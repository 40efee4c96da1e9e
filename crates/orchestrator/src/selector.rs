//! Provider selection and execution planning.
//!
//! The selector turns a classification into an [`ExecutionPlan`]. Tools win
//! when the intent is tool-backed and confidently classified; otherwise
//! registered AI providers are ranked by a weighted score of declared
//! quality, breaker health and observed latency. Providers whose breaker is
//! open never appear in a plan.

use std::sync::Arc;
use std::time::Duration;

use agent_tools::ToolExecutor;
use dashmap::DashMap;
use resilience::{BreakerRegistry, CircuitState};
use tracing::debug;

use crate::classifier::IntentResult;
use crate::error::OrchestratorError;
use crate::plan::{ExecutionPath, ExecutionPlan};

const LATENCY_ALPHA: f64 = 0.3;
const UNMEASURED_LATENCY_SCORE: f64 = 0.5;
const DEFAULT_LATENCY_CEILING: Duration = Duration::from_secs(5);

/// Breaker and limiter key for a provider.
pub fn provider_key(name: &str) -> String {
    format!("provider:{}", name)
}

/// A registered provider and its declared quality in `[0.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderProfile {
    pub name: String,
    pub quality: f64,
}

impl ProviderProfile {
    pub fn new(name: impl Into<String>, quality: f64) -> Self {
        Self {
            name: name.into(),
            quality: quality.clamp(0.0, 1.0),
        }
    }
}

/// Weights of the provider score.
#[derive(Debug, Clone, Copy)]
pub struct SelectionWeights {
    pub quality: f64,
    pub health: f64,
    pub latency: f64,
    /// Added when the user prefers the provider.
    pub preference_bonus: f64,
}

impl Default for SelectionWeights {
    fn default() -> Self {
        Self {
            quality: 0.5,
            health: 0.3,
            latency: 0.2,
            preference_bonus: 0.25,
        }
    }
}

/// Ranks providers and builds execution plans.
pub struct ProviderSelector {
    providers: Vec<ProviderProfile>,
    weights: SelectionWeights,
    threshold: f64,
    breakers: Arc<BreakerRegistry>,
    latency_ms: DashMap<String, f64>,
    latency_ceiling: Duration,
}

impl ProviderSelector {
    /// Create a selector using `threshold` as the tool confidence cut-off.
    pub fn new(threshold: f64, breakers: Arc<BreakerRegistry>) -> Self {
        Self {
            providers: Vec::new(),
            weights: SelectionWeights::default(),
            threshold,
            breakers,
            latency_ms: DashMap::new(),
            latency_ceiling: DEFAULT_LATENCY_CEILING,
        }
    }

    pub fn with_weights(mut self, weights: SelectionWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Latency at or above which the latency score bottoms out.
    pub fn with_latency_ceiling(mut self, ceiling: Duration) -> Self {
        self.latency_ceiling = ceiling;
        self
    }

    /// Register a provider, replacing any profile with the same name.
    pub fn register(&mut self, profile: ProviderProfile) {
        self.providers.retain(|p| p.name != profile.name);
        self.providers.push(profile);
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn has_provider(&self, name: &str) -> bool {
        self.providers.iter().any(|p| p.name == name)
    }

    /// Registered provider names, sorted.
    pub fn list_providers(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.iter().map(|p| p.name.as_str()).collect();
        names.sort();
        names
    }

    /// Fold an observed call latency into the provider's moving average.
    pub fn record_latency(&self, name: &str, elapsed: Duration) {
        let sample = elapsed.as_secs_f64() * 1000.0;
        self.latency_ms
            .entry(name.to_string())
            .and_modify(|avg| *avg = LATENCY_ALPHA * sample + (1.0 - LATENCY_ALPHA) * *avg)
            .or_insert(sample);
    }

    /// Moving-average latency, if any call has been observed.
    pub fn average_latency(&self, name: &str) -> Option<Duration> {
        self.latency_ms
            .get(name)
            .map(|ms| Duration::from_secs_f64(*ms / 1000.0))
    }

    /// Score a provider; `None` when its breaker is open.
    pub fn score(&self, profile: &ProviderProfile, preferred: Option<&str>) -> Option<f64> {
        let breaker = self.breakers.get(&provider_key(&profile.name));
        let snapshot = breaker.snapshot();
        let health = match snapshot.state {
            CircuitState::Open => return None,
            CircuitState::HalfOpen => 0.5,
            CircuitState::Closed => {
                let threshold = breaker.config().failure_threshold.max(1) as f64;
                1.0 - (snapshot.failure_count as f64 / threshold).min(1.0)
            }
        };

        let latency = match self.latency_ms.get(&profile.name) {
            Some(ms) => {
                let ceiling = self.latency_ceiling.as_secs_f64() * 1000.0;
                1.0 - (*ms / ceiling).min(1.0)
            }
            None => UNMEASURED_LATENCY_SCORE,
        };

        let bonus = if preferred == Some(profile.name.as_str()) {
            self.weights.preference_bonus
        } else {
            0.0
        };

        Some(
            self.weights.quality * profile.quality
                + self.weights.health * health
                + self.weights.latency * latency
                + bonus,
        )
    }

    /// Viable providers, best first. Ties go to the name that sorts first.
    pub fn ranked(&self, preferred: Option<&str>) -> Vec<(String, f64)> {
        let mut ranked: Vec<(String, f64)> = self
            .providers
            .iter()
            .filter_map(|p| self.score(p, preferred).map(|score| (p.name.clone(), score)))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked
    }

    /// Build the plan for a classified message.
    ///
    /// Path order:
    /// 1. the cached response, when `cached_key` is given
    /// 2. the intent's tools, when tool-backed, viable and at or above the threshold
    /// 3. viable providers by descending score
    /// 4. the intent's tools, when viable but below the threshold
    pub fn plan(
        &self,
        intent: &IntentResult,
        tools: &ToolExecutor,
        cached_key: Option<&str>,
        preferred: Option<&str>,
    ) -> Result<ExecutionPlan, OrchestratorError> {
        let mut paths = Vec::new();

        if let Some(key) = cached_key {
            paths.push(ExecutionPath::cached(key));
        }

        let tool_viable = tools.is_viable(&intent.intent);
        let confident = intent.confidence >= self.threshold;
        if tool_viable && confident {
            paths.push(ExecutionPath::tool(&intent.intent));
        }

        paths.extend(
            self.ranked(preferred)
                .into_iter()
                .map(|(name, _)| ExecutionPath::provider(name)),
        );

        if tool_viable && !confident {
            paths.push(ExecutionPath::tool(&intent.intent));
        }

        let plan = ExecutionPlan::from_paths(paths).ok_or_else(|| {
            OrchestratorError::DependencyUnavailable(format!(
                "no viable path for intent '{}'",
                intent.intent
            ))
        })?;

        debug!(
            "Plan for '{}' ({:.2}): {}",
            intent.intent,
            intent.confidence,
            plan.paths().map(|p| p.to_string()).collect::<Vec<_>>().join(" -> ")
        );

        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use agent_tools::{default_registry, StaticPrices};
    use resilience::{Cache, CircuitBreakerConfig, RateLimiter};

    use super::*;
    use crate::classifier::MatchSource;

    fn intent(name: &str, confidence: f64) -> IntentResult {
        IntentResult {
            intent: name.to_string(),
            confidence,
            entities: BTreeMap::new(),
            source: MatchSource::Phrase,
        }
    }

    fn setup() -> (ProviderSelector, ToolExecutor, Arc<BreakerRegistry>) {
        let breakers = Arc::new(BreakerRegistry::new(
            CircuitBreakerConfig::new().with_failure_threshold(2),
        ));
        let executor = ToolExecutor::new(
            Arc::new(default_registry(Arc::new(StaticPrices::new()))),
            Cache::in_memory(100),
            breakers.clone(),
            Arc::new(RateLimiter::default()),
        );
        let mut selector = ProviderSelector::new(0.6, breakers.clone());
        selector.register(ProviderProfile::new("grok", 0.9));
        selector.register(ProviderProfile::new("local", 0.5));
        (selector, executor, breakers)
    }

    fn trip(breakers: &BreakerRegistry, key: &str) {
        let breaker = breakers.get(key);
        for _ in 0..2 {
            breaker.try_acquire().unwrap().failure();
        }
    }

    #[tokio::test]
    async fn test_confident_tool_intent_selects_tool() {
        let (selector, executor, _) = setup();
        let plan = selector
            .plan(&intent("crypto_price", 0.95), &executor, None, None)
            .unwrap();
        assert_eq!(plan.selected, ExecutionPath::tool("crypto_price"));
        assert_eq!(
            plan.fallback_chain,
            vec![ExecutionPath::provider("grok"), ExecutionPath::provider("local")]
        );
    }

    #[tokio::test]
    async fn test_low_confidence_prefers_providers() {
        let (selector, executor, _) = setup();
        let plan = selector
            .plan(&intent("crypto_price", 0.4), &executor, None, None)
            .unwrap();
        assert_eq!(plan.selected, ExecutionPath::provider("grok"));
        assert_eq!(plan.fallback_chain.last(), Some(&ExecutionPath::tool("crypto_price")));
    }

    #[tokio::test]
    async fn test_generative_intent_never_uses_tools() {
        let (selector, executor, _) = setup();
        let plan = selector
            .plan(&intent("research", 0.95), &executor, None, None)
            .unwrap();
        assert!(plan.paths().all(ExecutionPath::is_provider));
    }

    #[tokio::test]
    async fn test_open_breaker_excluded() {
        let (selector, executor, breakers) = setup();
        trip(&breakers, &provider_key("grok"));

        let plan = selector
            .plan(&intent("research", 0.4), &executor, None, None)
            .unwrap();
        assert_eq!(plan.selected, ExecutionPath::provider("local"));
        assert!(plan.fallback_chain.is_empty());
    }

    #[tokio::test]
    async fn test_open_tool_breaker_falls_to_providers() {
        let (selector, executor, breakers) = setup();
        trip(&breakers, "price_source:static");

        let plan = selector
            .plan(&intent("crypto_price", 0.95), &executor, None, None)
            .unwrap();
        assert_eq!(plan.selected, ExecutionPath::provider("grok"));
        assert!(!plan.paths().any(|p| *p == ExecutionPath::tool("crypto_price")));
    }

    #[tokio::test]
    async fn test_no_viable_path() {
        let (selector, executor, breakers) = setup();
        trip(&breakers, &provider_key("grok"));
        trip(&breakers, &provider_key("local"));

        let err = selector
            .plan(&intent("research", 0.9), &executor, None, None)
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::DependencyUnavailable(_)));
    }

    #[tokio::test]
    async fn test_cached_value_first() {
        let (selector, executor, _) = setup();
        let plan = selector
            .plan(&intent("crypto_price", 0.95), &executor, Some("response:abc"), None)
            .unwrap();
        assert_eq!(plan.selected, ExecutionPath::cached("response:abc"));
        assert_eq!(plan.fallback_chain[0], ExecutionPath::tool("crypto_price"));
    }

    #[tokio::test]
    async fn test_preference_and_latency_shift_ranking() {
        let (selector, _, _) = setup();
        assert_eq!(selector.ranked(None)[0].0, "grok");
        assert_eq!(selector.ranked(Some("local"))[0].0, "local");

        let profile = ProviderProfile::new("grok", 0.9);
        let unmeasured = selector.score(&profile, None).unwrap();
        selector.record_latency("grok", Duration::from_secs(5));
        let slow = selector.score(&profile, None).unwrap();
        assert!(slow < unmeasured);
        assert_eq!(selector.average_latency("grok"), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_latency_ewma() {
        let selector = ProviderSelector::new(0.6, Arc::new(BreakerRegistry::default()));
        selector.record_latency("grok", Duration::from_millis(100));
        selector.record_latency("grok", Duration::from_millis(200));
        let avg = selector.average_latency("grok").unwrap().as_secs_f64() * 1000.0;
        assert!((avg - 130.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_failures_lower_health_score() {
        let (selector, _, breakers) = setup();
        let before = selector.score(&ProviderProfile::new("grok", 0.9), None).unwrap();
        breakers.get(&provider_key("grok")).try_acquire().unwrap().failure();
        let after = selector.score(&ProviderProfile::new("grok", 0.9), None).unwrap();
        assert!(after < before);
    }
}
