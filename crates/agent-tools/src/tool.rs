//! Tool trait definition and types.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ToolError;

/// Arguments passed to a tool for execution.
///
/// Entities come straight from the intent classifier (`symbol`, `holdings`,
/// `amount`, ...). The context is opaque to tools that don't need it.
#[derive(Debug, Clone, Default)]
pub struct ToolArgs {
    /// Extracted entities as key-value pairs.
    pub entities: HashMap<String, String>,
    /// Opaque conversation context.
    pub context: Option<String>,
    /// Who the call is made for, if known.
    pub sender: Option<String>,
}

impl ToolArgs {
    /// Create new tool arguments with the given entities.
    pub fn new(entities: HashMap<String, String>) -> Self {
        Self {
            entities,
            context: None,
            sender: None,
        }
    }

    /// Attach conversation context.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Attach the requesting sender.
    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    /// Add a single entity.
    pub fn with_entity(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entities.insert(key.into(), value.into());
        self
    }

    /// Get a string entity, returning an error if missing.
    pub fn get_string(&self, key: &str) -> Result<String, ToolError> {
        self.entities
            .get(key)
            .cloned()
            .ok_or_else(|| ToolError::MissingParameter(key.to_string()))
    }

    /// Get an optional string entity.
    pub fn get_string_opt(&self, key: &str) -> Option<String> {
        self.entities.get(key).cloned()
    }

    /// Get a numeric entity, returning an error if missing or not a number.
    pub fn get_f64(&self, key: &str) -> Result<f64, ToolError> {
        let raw = self.get_string(key)?;
        raw.replace(',', "")
            .parse::<f64>()
            .map_err(|_| ToolError::InvalidParameter {
                name: key.to_string(),
                reason: format!("expected number, got '{}'", raw),
            })
    }

    /// Get an optional numeric entity.
    pub fn get_f64_opt(&self, key: &str) -> Result<Option<f64>, ToolError> {
        match self.entities.get(key) {
            Some(_) => self.get_f64(key).map(Some),
            None => Ok(None),
        }
    }
}

/// Output from a successful tool execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Structured payload merged into the combined result.
    pub data: Map<String, Value>,
    /// Short human-readable rendering of the payload.
    pub summary: String,
}

impl ToolOutput {
    /// Create an output with a summary and no data.
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            data: Map::new(),
            summary: summary.into(),
        }
    }

    /// Add a structured field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

/// Trait for tools that can be executed by the orchestrator.
///
/// Tools are non-generative capabilities dispatched by intent. Each tool
/// declares the identity of the breaker and limiter that guard it so the
/// executor can wrap every call. Implementations must be safe to retry.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The tool's unique name (used for dispatch).
    fn name(&self) -> &str;

    /// Human-readable description of what the tool does.
    fn description(&self) -> &str;

    /// Circuit breaker guarding this tool's dependency.
    fn breaker_key(&self) -> String {
        format!("tool:{}", self.name())
    }

    /// Rate limiter actor charged for each call.
    fn limiter_key(&self) -> String {
        format!("tool:{}", self.name())
    }

    /// Cache key for a call, or `None` if results must not be cached.
    fn cache_key(&self, _args: &ToolArgs) -> Option<String> {
        None
    }

    /// How long a cached result stays fresh.
    fn cache_ttl(&self) -> Duration {
        Duration::from_secs(30)
    }

    /// Tags attached to a cached result for invalidation.
    fn cache_tags(&self, _args: &ToolArgs) -> Vec<String> {
        Vec::new()
    }

    /// Execute the tool with the given arguments.
    async fn execute(&self, args: ToolArgs) -> Result<ToolOutput, ToolError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_accessors() {
        let args = ToolArgs::default()
            .with_entity("symbol", "BTC")
            .with_entity("amount", "70,000")
            .with_sender("+15550001");

        assert_eq!(args.get_string("symbol").unwrap(), "BTC");
        assert_eq!(args.get_f64("amount").unwrap(), 70_000.0);
        assert_eq!(args.get_f64_opt("missing").unwrap(), None);
        assert_eq!(args.sender.as_deref(), Some("+15550001"));
        assert!(matches!(
            args.get_string("missing"),
            Err(ToolError::MissingParameter(_))
        ));
    }

    #[test]
    fn test_invalid_number() {
        let args = ToolArgs::default().with_entity("amount", "lots");
        assert!(matches!(
            args.get_f64("amount"),
            Err(ToolError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_output_builder() {
        let output = ToolOutput::new("BTC: $1.00")
            .with_field("symbol", "BTC")
            .with_field("price", 1.0);
        assert_eq!(output.data["symbol"], "BTC");
        assert_eq!(output.summary, "BTC: $1.00");
    }
}
