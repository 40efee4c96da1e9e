//! HTTP-backed AI provider.
//!
//! This crate provides a provider that speaks the OpenAI-compatible chat
//! completions protocol (xAI, OpenAI, local gateways). Several instances
//! can be registered side by side, each configured from its own
//! environment variable prefix.
//!
//! # Usage
//!
//! ```rust,no_run
//! use http_brain::HttpBrain;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads GROK_API_KEY, GROK_MODEL, ...
//!     let brain = HttpBrain::from_env("GROK")?;
//!     // Register the brain with the orchestrator...
//!     Ok(())
//! }
//! ```
//!
//! Failures are reported as [`BrainError`]: HTTP 429 becomes `RateLimited`
//! (honouring `Retry-After`), 5xx and connection failures `Unavailable`,
//! timeouts `Timeout`, and empty or unparseable completions `Malformed`.

mod api_types;
mod brain;
mod config;

pub use brain::HttpBrain;
pub use config::HttpBrainConfig;

// Re-export brain-core types for convenience
pub use brain_core::{async_trait, Brain, BrainError, BrainParams};
