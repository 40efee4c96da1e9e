//! Echo brain implementation - echoes the prompt back.

use async_trait::async_trait;
use brain_core::{Brain, BrainError, BrainParams};

/// A simple provider that echoes the prompt back.
///
/// Useful for testing the request flow without any AI processing.
#[derive(Debug, Clone)]
pub struct EchoBrain {
    name: String,
    /// Optional prefix to add before the echo.
    prefix: Option<String>,
}

impl EchoBrain {
    /// Create a new EchoBrain named `echo` with no prefix.
    pub fn new() -> Self {
        Self::named("echo")
    }

    /// Create an EchoBrain registered under `name`.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: None,
        }
    }

    /// Add a custom prefix.
    ///
    /// # Example
    ///
    /// ```rust
    /// use mock_brain::EchoBrain;
    ///
    /// let brain = EchoBrain::new().with_prefix("Echo: ");
    /// // Will respond with "Echo: <prompt>"
    /// ```
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }
}

impl Default for EchoBrain {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Brain for EchoBrain {
    async fn generate(&self, prompt: &str, _params: &BrainParams) -> Result<String, BrainError> {
        Ok(match &self.prefix {
            Some(prefix) => format!("{}{}", prefix, prompt),
            None => prompt.to_string(),
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}
