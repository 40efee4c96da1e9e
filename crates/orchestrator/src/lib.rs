//! Request orchestration for the assistant.
//!
//! This crate provides the [`Orchestrator`] type, the single entry point a
//! transport calls with each inbound message. It classifies the message,
//! plans how to answer it, executes the plan with fallbacks and assembles
//! the response.
//!
//! # Features
//!
//! - Rule-based intent classification with fuzzy matching and entity recognizers
//! - Provider selection scored on quality, breaker health and observed latency
//! - Concurrent tool execution guarded by breakers, rate limits and the cache
//! - Fallback through alternative paths within a retry budget and a deadline
//! - Response caching with tag-based invalidation
//!
//! # Architecture
//!
//! ```text
//! InboundMessage (from a transport)
//!          ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ORCHESTRATOR                           │
//! │                                                             │
//! │  1. Admit sender (rate limiter, user:<sender>)              │
//! │         ↓                                                   │
//! │  2. Classify (rules → keywords/fuzzy → fallback)            │
//! │     • entities extracted on every message                   │
//! │     • help / use <provider> answered directly               │
//! │         ↓                                                   │
//! │  3. Plan: cached response → tools → AI providers            │
//! │     • open breakers excluded                                │
//! │         ↓                                                   │
//! │  4. Execute within the deadline:                            │
//! │     • tools run concurrently, results merged                │
//! │     • on failure, next path (retry budget)                  │
//! │         ↓                                                   │
//! │  5. Cache and return OutboundMessage                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use agent_tools::{default_registry, CoinGecko};
//! use http_brain::HttpBrain;
//! use orchestrator::{InboundMessage, Orchestrator, OrchestratorConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let orchestrator = Orchestrator::builder(OrchestratorConfig::from_env())
//!         .with_tools(default_registry(Arc::new(CoinGecko::new())))
//!         .with_provider(Arc::new(HttpBrain::from_env("GROK")?), 0.8)
//!         .build()?;
//!
//!     let message = InboundMessage::direct("+1234567890", "What's the price of BTC?", 123);
//!     let response = orchestrator.handle_message(message).await;
//!
//!     println!("{:?}: {}", response.status, response.text);
//!     Ok(())
//! }
//! ```

mod classifier;
mod config;
mod context;
mod entities;
mod error;
mod orchestrator;
mod plan;
mod preferences;
mod selector;
mod state;

pub use classifier::{
    intents, Backing, IntentClassifier, IntentResult, IntentRule, MatchSource, HIGH_CONFIDENCE,
};
pub use config::OrchestratorConfig;
pub use context::PromptContext;
pub use entities::{extract as extract_entities, resolve_symbol};
pub use error::OrchestratorError;
pub use orchestrator::{Orchestrator, OrchestratorBuilder, HELP_TEXT};
pub use plan::{ExecutionPath, ExecutionPlan};
pub use preferences::{PreferenceStore, UserPreference};
pub use selector::{provider_key, ProviderProfile, ProviderSelector, SelectionWeights};
pub use state::{RequestState, RequestTrace};

// Re-export core types for convenience
pub use brain_core::{InboundMessage, OutboundMessage, ResponseMetadata, ResponseStatus};
