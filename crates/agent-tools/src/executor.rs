//! Guarded, concurrent tool execution for an intent.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use resilience::{BreakerRegistry, Cache, CircuitBreaker, RateLimiter};
use tracing::{debug, info, warn};

use crate::error::ToolError;
use crate::registry::{ToolBinding, ToolRegistry};
use crate::result::{CombinedResult, ToolResult};
use crate::tool::{Tool, ToolArgs, ToolOutput};

/// Default per-call timeout.
const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(3);

/// Runs every tool bound to an intent concurrently and merges the results.
///
/// Each call is wrapped individually: cached results are served first, then
/// the tool's breaker and rate limiter are consulted, then the call runs
/// under a timeout. One tool failing never aborts its siblings.
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    cache: Cache,
    breakers: Arc<BreakerRegistry>,
    limiter: Arc<RateLimiter>,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(
        registry: Arc<ToolRegistry>,
        cache: Cache,
        breakers: Arc<BreakerRegistry>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            registry,
            cache,
            breakers,
            limiter,
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Set the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        self.registry.as_ref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether any tool serves `intent`.
    pub fn serves(&self, intent: &str) -> bool {
        self.registry.serves(intent)
    }

    /// Whether the tools `intent` cannot do without are currently callable.
    ///
    /// False when no tool serves the intent or a required tool's breaker
    /// would reject the call (open, or half-open with its trial taken).
    pub fn is_viable(&self, intent: &str) -> bool {
        let Some(bindings) = self.registry.bindings(intent) else {
            return false;
        };
        bindings.iter().filter(|b| b.required).all(|binding| {
            match self.registry.get(&binding.tool) {
                Some(tool) => self.breakers.admits(&tool.breaker_key()),
                None => false,
            }
        })
    }

    /// Execute every tool bound to `intent` and merge the results.
    pub async fn execute_intent(
        &self,
        intent: &str,
        args: &ToolArgs,
    ) -> Result<CombinedResult, ToolError> {
        let bindings = self
            .registry
            .bindings(intent)
            .ok_or_else(|| ToolError::NotFound(format!("no tool serves intent '{}'", intent)))?;

        debug!("Executing {} tool(s) for intent '{}'", bindings.len(), intent);

        let calls = bindings.iter().map(|binding| self.run_binding(binding, args));
        let results = join_all(calls).await;
        let combined = CombinedResult::merge(intent, results);

        info!(
            "Tools for '{}' finished: status={:?}, fields={}, errors={}",
            intent,
            combined.status,
            combined.data.len(),
            combined.errors.len()
        );

        Ok(combined)
    }

    async fn run_binding(&self, binding: &ToolBinding, args: &ToolArgs) -> ToolResult {
        let outcome = match self.registry.get(&binding.tool) {
            Some(tool) => self.call(tool.clone(), args.clone()).await,
            None => Err(ToolError::NotFound(binding.tool.clone())),
        };

        if let Err(ref e) = outcome {
            warn!(tool = %binding.tool, required = binding.required, error = %e, "TOOL_CALL_FAILED");
        }

        ToolResult::from_outcome(binding, outcome)
    }

    /// One protected call, served from the cache when the tool allows it.
    async fn call(&self, tool: Arc<dyn Tool>, args: ToolArgs) -> Result<ToolOutput, ToolError> {
        let breaker = self.breakers.get(&tool.breaker_key());
        let limiter = self.limiter.clone();
        let timeout = self.timeout;

        let Some(key) = tool.cache_key(&args) else {
            return guarded_call(tool, breaker, limiter, timeout, args).await;
        };

        let ttl = tool.cache_ttl();
        let tags = tool.cache_tags(&args);
        let tag_refs: Vec<&str> = tags.iter().map(String::as_str).collect();

        let value = self
            .cache
            .get_or_compute(&key, Some(ttl), &tag_refs, move || async move {
                let output = guarded_call(tool, breaker, limiter, timeout, args).await?;
                serde_json::to_value(&output).map_err(ToolError::from)
            })
            .await
            .map_err(|e| {
                e.downcast_ref::<ToolError>()
                    .cloned()
                    .unwrap_or_else(|| ToolError::ExecutionFailed(e.to_string()))
            })?;

        Ok(serde_json::from_value(value)?)
    }
}

/// Breaker, then limiter, then the call itself under a timeout.
async fn guarded_call(
    tool: Arc<dyn Tool>,
    breaker: Arc<CircuitBreaker>,
    limiter: Arc<RateLimiter>,
    timeout: Duration,
    args: ToolArgs,
) -> Result<ToolOutput, ToolError> {
    let permit = breaker.try_acquire()?;
    limiter.try_acquire(&tool.limiter_key())?;

    match tokio::time::timeout(timeout, tool.execute(args)).await {
        Ok(Ok(output)) => {
            permit.success();
            Ok(output)
        }
        Ok(Err(e)) => {
            if e.is_health_failure() {
                permit.failure();
            }
            Err(e)
        }
        Err(_) => {
            permit.failure();
            Err(ToolError::Timeout {
                tool: tool.name().to_string(),
                after: timeout,
            })
        }
    }
}
