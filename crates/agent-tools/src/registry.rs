//! Tool registry: tools by name plus the intents they serve.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::ToolError;
use crate::tool::{Tool, ToolArgs, ToolOutput};

/// How a tool participates in serving an intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolBinding {
    /// Registered tool name.
    pub tool: String,
    /// Merge priority; on key collisions the higher priority wins.
    pub priority: u32,
    /// Whether the intent fails when this tool fails.
    pub required: bool,
}

impl ToolBinding {
    /// A tool the intent cannot be served without.
    pub fn required(tool: impl Into<String>, priority: u32) -> Self {
        Self {
            tool: tool.into(),
            priority,
            required: true,
        }
    }

    /// An enrichment tool whose failure only degrades the result.
    pub fn optional(tool: impl Into<String>, priority: u32) -> Self {
        Self {
            tool: tool.into(),
            priority,
            required: false,
        }
    }
}

/// Registry for managing tools.
///
/// The registry holds a collection of tools and the per-intent bindings the
/// executor fans out over.
#[derive(Default)]
pub struct ToolRegistry {
    /// Registered tools by name.
    tools: HashMap<String, Arc<dyn Tool>>,
    /// Tool bindings by intent name, in declaration order.
    bindings: HashMap<String, Vec<ToolBinding>>,
}

impl ToolRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool.
    ///
    /// If a tool with the same name already exists, it will be replaced.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.register_shared(Arc::new(tool));
    }

    /// Register a shared tool.
    pub fn register_shared(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        info!("Registering tool: {}", name);
        self.tools.insert(name, tool);
    }

    /// Declare that `intent` is served by `binding`.
    pub fn bind(&mut self, intent: impl Into<String>, binding: ToolBinding) {
        let intent = intent.into();
        debug!(
            "Binding tool '{}' to intent '{}' (priority={}, required={})",
            binding.tool, intent, binding.priority, binding.required
        );
        let entry = self.bindings.entry(intent).or_default();
        entry.retain(|b| b.tool != binding.tool);
        entry.push(binding);
    }

    /// Bindings for an intent, if any tool serves it.
    pub fn bindings(&self, intent: &str) -> Option<&[ToolBinding]> {
        self.bindings
            .get(intent)
            .map(Vec::as_slice)
            .filter(|b| !b.is_empty())
    }

    /// Whether any tool serves `intent`.
    pub fn serves(&self, intent: &str) -> bool {
        self.bindings(intent).is_some()
    }

    /// Intents with at least one bound tool, sorted.
    pub fn intents(&self) -> Vec<&str> {
        let mut intents: Vec<&str> = self
            .bindings
            .iter()
            .filter(|(_, b)| !b.is_empty())
            .map(|(i, _)| i.as_str())
            .collect();
        intents.sort_unstable();
        intents
    }

    /// Get a sorted list of registered tool names.
    pub fn list_tools(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Check if a tool is registered.
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Get tool descriptions for help text, sorted by name.
    pub fn get_descriptions(&self) -> Vec<(&str, &str)> {
        let mut descriptions: Vec<(&str, &str)> = self
            .tools
            .values()
            .map(|t| (t.name(), t.description()))
            .collect();
        descriptions.sort_unstable_by_key(|(name, _)| *name);
        descriptions
    }

    /// Execute a tool by name without any protection.
    ///
    /// The [`ToolExecutor`](crate::ToolExecutor) is the guarded path; this is
    /// for direct use and tests.
    pub async fn execute(&self, name: &str, args: ToolArgs) -> Result<ToolOutput, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        debug!("Executing tool '{}' with {} entities", name, args.entities.len());
        let result = tool.execute(args).await?;
        debug!("Tool '{}' completed: {} data fields", name, result.data.len());

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes back the input"
        }

        async fn execute(&self, args: ToolArgs) -> Result<ToolOutput, ToolError> {
            let message = args.get_string("message")?;
            Ok(ToolOutput::new(message.clone()).with_field("message", message))
        }
    }

    #[test]
    fn test_registry_basic() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);

        assert!(registry.has_tool("echo"));
        assert!(!registry.has_tool("nonexistent"));
        assert_eq!(registry.list_tools(), vec!["echo"]);
        assert_eq!(registry.get_descriptions(), vec![("echo", "Echoes back the input")]);
    }

    #[test]
    fn test_bindings() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        registry.bind("chat", ToolBinding::required("echo", 1));
        registry.bind("chat", ToolBinding::optional("echo", 5));

        let bindings = registry.bindings("chat").unwrap();
        assert_eq!(bindings, &[ToolBinding::optional("echo", 5)]);
        assert!(registry.serves("chat"));
        assert!(!registry.serves("research"));
        assert_eq!(registry.intents(), vec!["chat"]);
    }

    #[tokio::test]
    async fn test_registry_execute() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);

        let args = ToolArgs::default().with_entity("message", "hello");
        let result = registry.execute("echo", args).await.unwrap();
        assert_eq!(result.summary, "hello");
        assert_eq!(result.data["message"], "hello");
    }

    #[tokio::test]
    async fn test_registry_not_found() {
        let registry = ToolRegistry::new();
        let result = registry.execute("nonexistent", ToolArgs::default()).await;
        assert!(matches!(result, Err(ToolError::NotFound(_))));
    }
}
