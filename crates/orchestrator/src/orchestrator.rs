//! Main orchestrator implementation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use agent_tools::{CombinedResult, ToolArgs, ToolExecutor, ToolRegistry};
use brain_core::{
    fingerprint, Brain, BrainError, BrainParams, InboundMessage, OutboundMessage,
    ResponseMetadata, ResponseStatus,
};
use resilience::{BreakerRegistry, Cache, RateLimiter};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::classifier::{intents, IntentClassifier, IntentResult};
use crate::config::OrchestratorConfig;
use crate::context::PromptContext;
use crate::error::OrchestratorError;
use crate::plan::{ExecutionPath, ExecutionPlan};
use crate::preferences::{PreferenceStore, UserPreference};
use crate::selector::{provider_key, ProviderProfile, ProviderSelector};
use crate::state::{RequestState, RequestTrace};

/// Help text shown for the `help` command.
pub const HELP_TEXT: &str = r#"I'm a crypto assistant. I can answer directly from live data or ask an AI model.

Things I can do:
• "What's the price of BTC?" - Spot prices (add "in EUR" for other currencies)
• "Analyze my portfolio: 0.5 BTC, 2 ETH" - Value, allocation and concentration risk
• "Alert me when ETH drops below $2,000" - Price alerts
• Anything else - Research and general questions answered by an AI model

Commands:
• "use <provider>" - Prefer a specific AI provider
• "reset preferences" - Let me pick the provider again
• "help" - Show this message"#;

/// Intents whose responses must never be served from the response cache.
const UNCACHEABLE_INTENTS: &[&str] = &[intents::PRICE_ALERT, intents::HELP, intents::SET_PREFERENCE];

const RESPONSE_TAG: &str = "response";

/// A response stored for the `CachedValue` path.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedResponse {
    text: String,
    structured_data: Option<Map<String, Value>>,
    served_by: String,
}

/// Content produced by one successful execution path.
#[derive(Debug)]
struct PathOutcome {
    text: String,
    data: Option<Map<String, Value>>,
    status: ResponseStatus,
    served_by: String,
    /// User-safe notes on failures the path survived.
    notes: Vec<String>,
    from_cache: bool,
}

/// Bookkeeping shared across the attempts of one request.
#[derive(Debug, Default)]
struct Attempts {
    attempted: Vec<String>,
    errors: Vec<(String, OrchestratorError)>,
    skipped: Vec<String>,
}

impl Attempts {
    fn error_notes(&self) -> Vec<String> {
        let mut notes: Vec<String> = self
            .errors
            .iter()
            .map(|(path, err)| format!("{}: {}", path, err.kind()))
            .collect();
        notes.extend(
            self.skipped
                .iter()
                .map(|path| format!("{}: circuit_open", path)),
        );
        notes
    }

    /// The terminal error once every path has been tried.
    fn terminal_error(&self) -> OrchestratorError {
        let all_rate_limited = !self.errors.is_empty()
            && self
                .errors
                .iter()
                .all(|(_, e)| matches!(e, OrchestratorError::RateLimited { .. }));

        if all_rate_limited {
            let retry_after = self
                .errors
                .iter()
                .filter_map(|(_, e)| match e {
                    OrchestratorError::RateLimited { retry_after } => *retry_after,
                    _ => None,
                })
                .min();
            return OrchestratorError::RateLimited { retry_after };
        }

        let mut attempts = self.attempted.clone();
        attempts.extend(self.skipped.iter().cloned());
        OrchestratorError::Exhausted { attempts }
    }
}

/// Coordinates classification, planning, execution and fallback for each message.
///
/// The orchestrator:
/// - Admits each sender through a per-user token bucket
/// - Classifies the message into a ranked list of intents
/// - Answers commands (`help`, `use <provider>`) directly
/// - Builds an execution plan: cached response, tools, then AI providers
/// - Walks the plan within the retry budget and the request deadline
/// - Caches fully successful responses for repeat questions
pub struct Orchestrator {
    config: OrchestratorConfig,
    classifier: IntentClassifier,
    selector: ProviderSelector,
    providers: HashMap<String, Arc<dyn Brain>>,
    tools: ToolExecutor,
    cache: Cache,
    breakers: Arc<BreakerRegistry>,
    limiter: Arc<RateLimiter>,
    preferences: PreferenceStore,
}

/// Builder for [`Orchestrator`].
pub struct OrchestratorBuilder {
    config: OrchestratorConfig,
    classifier: Option<IntentClassifier>,
    providers: Vec<(Arc<dyn Brain>, f64)>,
    tools: Option<ToolRegistry>,
    cache: Option<Cache>,
    breakers: Option<Arc<BreakerRegistry>>,
    limiter: Option<Arc<RateLimiter>>,
}

impl OrchestratorBuilder {
    /// Register an AI provider with a declared quality in `[0.0, 1.0]`.
    pub fn with_provider(mut self, brain: Arc<dyn Brain>, quality: f64) -> Self {
        self.providers.push((brain, quality));
        self
    }

    pub fn with_tools(mut self, registry: ToolRegistry) -> Self {
        self.tools = Some(registry);
        self
    }

    pub fn with_classifier(mut self, classifier: IntentClassifier) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Share a cache instead of creating an in-memory one.
    pub fn with_cache(mut self, cache: Cache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Share breakers instead of creating them from the config.
    pub fn with_breakers(mut self, breakers: Arc<BreakerRegistry>) -> Self {
        self.breakers = Some(breakers);
        self
    }

    /// Share a rate limiter instead of creating one from the config.
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Assemble the orchestrator.
    ///
    /// Fails when nothing could ever answer (no providers and no tools) or
    /// when two providers share a name.
    pub fn build(self) -> Result<Orchestrator, OrchestratorError> {
        let config = self.config;
        let registry = self.tools.unwrap_or_default();

        if self.providers.is_empty() && registry.intents().is_empty() {
            return Err(OrchestratorError::Configuration(
                "at least one provider or tool binding is required".to_string(),
            ));
        }

        let cache = self
            .cache
            .unwrap_or_else(|| Cache::in_memory(config.cache_max_entries));
        let breakers = self
            .breakers
            .unwrap_or_else(|| Arc::new(BreakerRegistry::new(config.breaker.clone())));
        let limiter = self.limiter.unwrap_or_else(|| {
            Arc::new(
                RateLimiter::new(config.dependency_rate_limit)
                    .with_actor_config("user:", config.user_rate_limit),
            )
        });

        let classifier = self
            .classifier
            .unwrap_or_else(|| IntentClassifier::new().with_min_confidence(config.min_confidence));

        let mut selector = ProviderSelector::new(config.confidence_threshold, breakers.clone());
        let mut providers = HashMap::new();
        for (brain, quality) in self.providers {
            let name = brain.name().to_string();
            if providers.contains_key(&name) {
                return Err(OrchestratorError::Configuration(format!(
                    "provider '{}' registered twice",
                    name
                )));
            }
            selector.register(ProviderProfile::new(&name, quality));
            providers.insert(name, brain);
        }

        let tools = ToolExecutor::new(
            Arc::new(registry),
            cache.clone(),
            breakers.clone(),
            limiter.clone(),
        )
        .with_timeout(config.tool_timeout);

        info!(
            "Orchestrator ready: providers={:?}, tool intents={:?}",
            selector.list_providers(),
            tools.registry().intents()
        );

        Ok(Orchestrator {
            config,
            classifier,
            selector,
            providers,
            tools,
            cache,
            breakers,
            limiter,
            preferences: PreferenceStore::new(),
        })
    }
}

impl Orchestrator {
    pub fn builder(config: OrchestratorConfig) -> OrchestratorBuilder {
        OrchestratorBuilder {
            config,
            classifier: None,
            providers: Vec::new(),
            tools: None,
            cache: None,
            breakers: None,
            limiter: None,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn classifier(&self) -> &IntentClassifier {
        &self.classifier
    }

    pub fn selector(&self) -> &ProviderSelector {
        &self.selector
    }

    pub fn tools(&self) -> &ToolExecutor {
        &self.tools
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn breakers(&self) -> &Arc<BreakerRegistry> {
        &self.breakers
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn preferences(&self) -> &PreferenceStore {
        &self.preferences
    }

    /// Drop every cached entry carrying `tag` (`response`, an intent name,
    /// `price`, `symbol:BTC`, ...).
    pub async fn invalidate_tag(&self, tag: &str) -> Result<usize, OrchestratorError> {
        let removed = self
            .cache
            .invalidate(tag)
            .await
            .map_err(|e| OrchestratorError::DependencyUnavailable(e.to_string()))?;
        info!("Invalidated {} cache entries tagged '{}'", removed, tag);
        Ok(removed)
    }

    /// Start background expiry of cached entries.
    pub fn spawn_cache_janitor(&self, interval: Duration) -> JoinHandle<()> {
        self.cache.spawn_janitor(interval)
    }

    /// Handle a message with no prior conversation context.
    pub async fn handle_message(&self, message: InboundMessage) -> OutboundMessage {
        self.handle_message_with_context(message, None).await
    }

    /// Handle a message end-to-end.
    ///
    /// Never fails: every error becomes a response with status `Failed` and
    /// a user-safe explanation.
    pub async fn handle_message_with_context(
        &self,
        message: InboundMessage,
        context: Option<&str>,
    ) -> OutboundMessage {
        let mut trace = RequestTrace::start(&message.sender);
        let deadline = trace.started() + self.config.request_timeout;
        let mut metadata = ResponseMetadata::default();

        info!("Processing message from {}", message.sender);

        // 1. Per-user admission
        if let Err(denied) = self.limiter.try_acquire(&format!("user:{}", message.sender)) {
            warn!(
                sender = %message.sender,
                retry_after_ms = denied.retry_after.as_millis() as u64,
                "USER_RATE_LIMITED"
            );
            let err = OrchestratorError::RateLimited {
                retry_after: Some(denied.retry_after),
            };
            metadata.errors.push(err.kind().to_string());
            return self.fail(&message, err, metadata, &mut trace);
        }

        // 2. Classify
        let ranked = self.classifier.classify(&message.text, context);
        let Some(top) = ranked.into_iter().next() else {
            let err = OrchestratorError::ClassificationAmbiguous { confidence: 0.0 };
            return self.fail(&message, err, metadata, &mut trace);
        };
        metadata.intent = Some(top.intent.clone());
        trace.advance(RequestState::Classified);

        if top.confidence < self.classifier.min_confidence() {
            debug!(
                intent = %top.intent,
                confidence = top.confidence,
                "CLASSIFICATION_AMBIGUOUS"
            );
        } else {
            debug!(
                "Classified as {} ({:.2}, {:?})",
                top.intent, top.confidence, top.source
            );
        }

        // 3. Commands
        match top.intent.as_str() {
            intents::HELP => {
                metadata.served_by = Some("command".to_string());
                let reply = OutboundMessage::reply_to(&message, HELP_TEXT);
                return self.succeed(&message, reply, metadata, &mut trace);
            }
            intents::SET_PREFERENCE => {
                return self.apply_preference(&message, &top, metadata, &mut trace).await;
            }
            _ => {}
        }

        // 4. Plan
        let cache_key = self.response_cache_key(&top, &message.text);
        let mut cached_key = None;
        if let Some(key) = &cache_key {
            if let Ok(Some(_)) = self.cache.get(key).await {
                cached_key = Some(key.as_str());
            }
        }
        let preference = self.preferences.get(&message.sender).await;

        let plan = match self
            .selector
            .plan(&top, &self.tools, cached_key, preference.provider())
        {
            Ok(plan) => plan,
            Err(err) => {
                warn!(intent = %top.intent, error = %err, "NO_VIABLE_PATH");
                metadata.errors.push(err.kind().to_string());
                return self.fail(&message, err, metadata, &mut trace);
            }
        };
        trace.advance(RequestState::PlanBuilt);

        // 5. Execute within the deadline
        trace.advance(RequestState::Executing);
        let mut attempts = Attempts::default();
        let executed = timeout_at(
            deadline,
            self.execute_plan(&plan, &message, &top, context, &mut attempts),
        )
        .await;

        metadata.attempted = attempts.attempted.clone();
        metadata.errors.extend(attempts.error_notes());

        let outcome = match executed {
            Ok(Some(outcome)) => outcome,
            Ok(None) => {
                let err = attempts.terminal_error();
                return self.fail(&message, err, metadata, &mut trace);
            }
            Err(_) => {
                warn!(
                    attempted = ?attempts.attempted,
                    timeout_ms = self.config.request_timeout.as_millis() as u64,
                    "REQUEST_DEADLINE_EXCEEDED"
                );
                metadata.errors.push(OrchestratorError::Timeout.kind().to_string());
                return self.fail(&message, OrchestratorError::Timeout, metadata, &mut trace);
            }
        };

        // 6. Cache and respond
        if outcome.status == ResponseStatus::Ok && !outcome.from_cache {
            if let Some(key) = &cache_key {
                self.store_response(key, &top.intent, &outcome).await;
            }
        }

        metadata.served_by = Some(outcome.served_by.clone());
        metadata.errors.extend(outcome.notes);

        let mut response =
            OutboundMessage::reply_to(&message, outcome.text).with_status(outcome.status);
        if let Some(data) = outcome.data.filter(|d| !d.is_empty()) {
            response = response.with_data(data);
        }
        self.succeed(&message, response, metadata, &mut trace)
    }

    /// Try the plan's paths in order until one succeeds.
    ///
    /// Paths whose breaker would reject the call (opened since planning, or
    /// half-open with the trial taken) are skipped without using the retry
    /// budget. A cached response that expired meanwhile is skipped
    /// the same way.
    async fn execute_plan(
        &self,
        plan: &ExecutionPlan,
        message: &InboundMessage,
        intent: &IntentResult,
        context: Option<&str>,
        attempts: &mut Attempts,
    ) -> Option<PathOutcome> {
        let max_attempts = 1 + self.config.retry_budget as usize;
        let mut prompt = PromptContext::new()
            .with_conversation(context)
            .with_intent(intent);

        for path in plan.paths() {
            if attempts.attempted.len() >= max_attempts {
                debug!("Retry budget exhausted after {} attempt(s)", attempts.attempted.len());
                break;
            }

            if let ExecutionPath::CachedValue { key } = path {
                match self.cached_response(key).await {
                    Some(outcome) => {
                        attempts.attempted.push(path.to_string());
                        return Some(outcome);
                    }
                    None => continue,
                }
            }

            if !self.is_viable(path) {
                debug!("Skipping {}: circuit open", path);
                attempts.skipped.push(path.to_string());
                continue;
            }

            attempts.attempted.push(path.to_string());
            let result = match path {
                ExecutionPath::Tool { intent: name } => {
                    self.run_tools(name, intent, message, context, &mut prompt).await
                }
                ExecutionPath::AiProvider { name } => {
                    self.call_provider(name, &prompt.build(&message.text)).await
                }
                ExecutionPath::CachedValue { .. } => continue,
            };

            match result {
                Ok(outcome) => {
                    info!("{} served the request ({:?})", path, outcome.status);
                    return Some(outcome);
                }
                Err(err) => {
                    warn!(path = %path, error = %err, "PATH_FAILED");
                    attempts.errors.push((path.to_string(), err));
                }
            }
        }

        None
    }

    fn is_viable(&self, path: &ExecutionPath) -> bool {
        match path {
            ExecutionPath::Tool { intent } => self.tools.is_viable(intent),
            ExecutionPath::AiProvider { name } => self.breakers.admits(&provider_key(name)),
            ExecutionPath::CachedValue { .. } => true,
        }
    }

    async fn run_tools(
        &self,
        tool_intent: &str,
        intent: &IntentResult,
        message: &InboundMessage,
        context: Option<&str>,
        prompt: &mut PromptContext,
    ) -> Result<PathOutcome, OrchestratorError> {
        let mut args = ToolArgs::new(intent.entity_map()).with_sender(&message.sender);
        if let Some(context) = context {
            args = args.with_context(context);
        }

        let combined = self.tools.execute_intent(tool_intent, &args).await?;
        let notes: Vec<String> = combined
            .errors
            .iter()
            .map(|f| format!("tool:{}: {}", f.tool, f.error.kind()))
            .collect();

        if combined.is_failure() {
            // Whatever optional tools produced can still help a provider answer.
            for summary in combined.summaries() {
                prompt.add_tool_note(summary);
            }
            return Err(match combined.first_required_error() {
                Some(err) => err.clone().into(),
                None => OrchestratorError::ToolFailure(format!(
                    "every tool for '{}' failed",
                    tool_intent
                )),
            });
        }

        Ok(PathOutcome {
            text: render_tools(&combined),
            data: Some(combined.data.clone()),
            status: combined.status,
            served_by: ExecutionPath::tool(tool_intent).to_string(),
            notes,
            from_cache: false,
        })
    }

    async fn call_provider(
        &self,
        name: &str,
        prompt: &str,
    ) -> Result<PathOutcome, OrchestratorError> {
        let brain = self.providers.get(name).ok_or_else(|| {
            OrchestratorError::Configuration(format!("unknown provider '{}'", name))
        })?;
        let key = provider_key(name);

        let permit = self
            .breakers
            .get(&key)
            .try_acquire()
            .map_err(|e| OrchestratorError::DependencyUnavailable(e.to_string()))?;
        self.limiter
            .try_acquire(&key)
            .map_err(|e| OrchestratorError::RateLimited {
                retry_after: Some(e.retry_after),
            })?;

        let started = Instant::now();
        let params = BrainParams::new();
        let result = match timeout(self.config.provider_timeout, brain.generate(prompt, &params)).await
        {
            Ok(result) => result,
            Err(_) => Err(BrainError::Timeout),
        };

        match result {
            Ok(text) if !text.trim().is_empty() => {
                permit.success();
                self.selector.record_latency(name, started.elapsed());
                Ok(PathOutcome {
                    text,
                    data: None,
                    status: ResponseStatus::Ok,
                    served_by: ExecutionPath::provider(name).to_string(),
                    notes: Vec::new(),
                    from_cache: false,
                })
            }
            Ok(_) => {
                permit.failure();
                Err(OrchestratorError::ProviderMalformed(format!(
                    "{} returned an empty completion",
                    name
                )))
            }
            Err(err) => {
                if matches!(err, BrainError::Timeout) {
                    self.selector.record_latency(name, started.elapsed());
                }
                if err.is_health_failure() {
                    permit.failure();
                } else {
                    drop(permit);
                }
                Err(err.into())
            }
        }
    }

    /// Key for the response cache, or `None` when this request must not be cached.
    fn response_cache_key(&self, intent: &IntentResult, text: &str) -> Option<String> {
        if self.config.response_cache_ttl.is_none() {
            return None;
        }
        if UNCACHEABLE_INTENTS.contains(&intent.intent.as_str()) {
            return None;
        }

        let normalized = text
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        let entities = intent
            .entities
            .iter()
            .map(|(k, v)| format!("{}={}", k, v));
        let parts = [intent.intent.clone(), normalized].into_iter().chain(entities);
        Some(format!("{}:{}", RESPONSE_TAG, fingerprint(parts)))
    }

    async fn cached_response(&self, key: &str) -> Option<PathOutcome> {
        let value = match self.cache.get(key).await {
            Ok(Some(value)) => value,
            Ok(None) => return None,
            Err(err) => {
                warn!(key = %key, error = %err, "RESPONSE_CACHE_READ_FAILED");
                return None;
            }
        };
        let cached: CachedResponse = match serde_json::from_value(value) {
            Ok(cached) => cached,
            Err(err) => {
                warn!(key = %key, error = %err, "RESPONSE_CACHE_CORRUPT");
                return None;
            }
        };
        debug!("Serving cached response originally from {}", cached.served_by);
        Some(PathOutcome {
            text: cached.text,
            data: cached.structured_data,
            status: ResponseStatus::Ok,
            served_by: ExecutionPath::cached(key).to_string(),
            notes: Vec::new(),
            from_cache: true,
        })
    }

    async fn store_response(&self, key: &str, intent: &str, outcome: &PathOutcome) {
        let cached = CachedResponse {
            text: outcome.text.clone(),
            structured_data: outcome.data.clone(),
            served_by: outcome.served_by.clone(),
        };
        let value = match serde_json::to_value(&cached) {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, "RESPONSE_CACHE_ENCODE_FAILED");
                return;
            }
        };
        if let Err(err) = self
            .cache
            .set(key, value, self.config.response_cache_ttl, &[RESPONSE_TAG, intent])
            .await
        {
            warn!(key = %key, error = %err, "RESPONSE_CACHE_WRITE_FAILED");
        }
    }

    async fn apply_preference(
        &self,
        message: &InboundMessage,
        intent: &IntentResult,
        mut metadata: ResponseMetadata,
        trace: &mut RequestTrace,
    ) -> OutboundMessage {
        metadata.served_by = Some("command".to_string());

        if intent.entity("reset").is_some() {
            self.preferences.clear(&message.sender).await;
            info!("Preference reset for {}", message.sender);
            let reply = OutboundMessage::reply_to(
                message,
                "Preferences reset. I'll pick the best available provider for each message.",
            );
            return self.succeed(message, reply, metadata, trace);
        }

        let Some(name) = intent.entity("provider") else {
            let err = OrchestratorError::ClassificationAmbiguous {
                confidence: intent.confidence,
            };
            return self.fail(message, err, metadata, trace);
        };

        if !self.selector.has_provider(name) {
            let available = self.selector.list_providers().join(", ");
            let text = if available.is_empty() {
                format!("I don't know a provider called '{}'.", name)
            } else {
                format!(
                    "I don't know a provider called '{}'. Available: {}.",
                    name, available
                )
            };
            trace.advance(RequestState::Failed);
            metadata.latency_ms = trace.elapsed_ms();
            let mut response = OutboundMessage::failed(message, text);
            response.metadata = metadata;
            return response;
        }

        self.preferences
            .set(&message.sender, UserPreference::Provider(name.to_string()))
            .await;
        info!("Preference set for {}: {}", message.sender, name);
        let reply = OutboundMessage::reply_to(
            message,
            format!("Got it. I'll prefer {} when it's available.", name),
        );
        self.succeed(message, reply, metadata, trace)
    }

    fn succeed(
        &self,
        message: &InboundMessage,
        mut response: OutboundMessage,
        mut metadata: ResponseMetadata,
        trace: &mut RequestTrace,
    ) -> OutboundMessage {
        let terminal = if response.status == ResponseStatus::PartialFailure {
            RequestState::PartiallyFailed
        } else {
            RequestState::Succeeded
        };
        trace.advance(terminal);
        metadata.latency_ms = trace.elapsed_ms();

        info!(
            sender = %message.sender,
            intent = metadata.intent.as_deref().unwrap_or("-"),
            served_by = metadata.served_by.as_deref().unwrap_or("-"),
            status = ?response.status,
            latency_ms = metadata.latency_ms,
            "REQUEST_COMPLETE"
        );

        response.metadata = metadata;
        response
    }

    fn fail(
        &self,
        message: &InboundMessage,
        err: OrchestratorError,
        mut metadata: ResponseMetadata,
        trace: &mut RequestTrace,
    ) -> OutboundMessage {
        trace.advance(RequestState::Failed);
        metadata.latency_ms = trace.elapsed_ms();

        let mut text = err.user_message();
        if matches!(err, OrchestratorError::Timeout) && !metadata.attempted.is_empty() {
            text = format!("{} I tried: {}.", text, metadata.attempted.join(", "));
        }

        warn!(
            sender = %message.sender,
            intent = metadata.intent.as_deref().unwrap_or("-"),
            error = %err,
            attempted = ?metadata.attempted,
            latency_ms = metadata.latency_ms,
            "REQUEST_FAILED"
        );

        let mut response = OutboundMessage::failed(message, text);
        response.metadata = metadata;
        response
    }
}

/// Human-readable text for merged tool output.
fn render_tools(combined: &CombinedResult) -> String {
    let mut text = combined.summaries().join("\n");
    if combined.status == ResponseStatus::PartialFailure {
        let missing: Vec<&str> = combined.errors.iter().map(|f| f.tool.as_str()).collect();
        if !text.is_empty() {
            text.push_str("\n\n");
        }
        text.push_str(&format!(
            "(Partial result: {} unavailable right now.)",
            missing.join(", ")
        ));
    }
    text
}
