//! Core traits and types shared by every part of the assistant.
//!
//! This crate defines the narrow contracts the orchestration core consumes
//! and exposes:
//!
//! - [`InboundMessage`] - An immutable chat message received from a transport
//! - [`OutboundMessage`] / [`ResponseStatus`] - The response handed back
//! - [`Brain`] - The generative AI provider contract
//! - [`BrainError`] - The failure modes a provider may report
//!
//! # Example
//!
//! ```rust
//! use brain_core::{async_trait, Brain, BrainError, BrainParams};
//!
//! struct ShoutBrain;
//!
//! #[async_trait]
//! impl Brain for ShoutBrain {
//!     async fn generate(&self, prompt: &str, _params: &BrainParams) -> Result<String, BrainError> {
//!         Ok(prompt.to_uppercase())
//!     }
//!
//!     fn name(&self) -> &str {
//!         "shout"
//!     }
//! }
//! ```

mod error;
mod message;
mod prompt;
mod trait_def;

pub use error::BrainError;
pub use message::{InboundMessage, OutboundMessage, ResponseMetadata, ResponseStatus};
pub use prompt::{fingerprint, hash_prompt};
pub use trait_def::{Brain, BrainParams};

// Re-export async_trait for convenience
pub use async_trait::async_trait;
