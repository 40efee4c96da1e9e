//! The Brain trait definition.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::BrainError;

/// Free-form generation parameters (model override, temperature, ...).
pub type BrainParams = HashMap<String, Value>;

/// A generative AI provider.
///
/// Providers are interchangeable behind this trait and are registered by
/// name. This trait is object-safe and can be used as `Arc<dyn Brain>`.
#[async_trait]
pub trait Brain: Send + Sync {
    /// Generate a completion for the given prompt.
    ///
    /// # Arguments
    ///
    /// * `prompt` - The fully assembled prompt text.
    /// * `params` - Provider-specific knobs; unknown keys are ignored.
    async fn generate(&self, prompt: &str, params: &BrainParams) -> Result<String, BrainError>;

    /// Registry name of this provider. Also used as its breaker identity.
    fn name(&self) -> &str;

    /// Check if the provider is ready to serve requests.
    ///
    /// Default implementation always returns true.
    async fn is_ready(&self) -> bool {
        true
    }
}
