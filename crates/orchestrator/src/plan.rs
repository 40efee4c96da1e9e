//! Execution plans.

use std::fmt;

use serde::Serialize;

/// One way of producing an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionPath {
    /// Run the tools bound to an intent.
    Tool { intent: String },
    /// Serve a previously cached response.
    CachedValue { key: String },
    /// Ask a generative provider.
    AiProvider { name: String },
}

impl ExecutionPath {
    pub fn tool(intent: impl Into<String>) -> Self {
        Self::Tool {
            intent: intent.into(),
        }
    }

    pub fn cached(key: impl Into<String>) -> Self {
        Self::CachedValue { key: key.into() }
    }

    pub fn provider(name: impl Into<String>) -> Self {
        Self::AiProvider { name: name.into() }
    }

    pub fn is_provider(&self) -> bool {
        matches!(self, Self::AiProvider { .. })
    }
}

impl fmt::Display for ExecutionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tool { intent } => write!(f, "tool:{}", intent),
            Self::CachedValue { .. } => write!(f, "cache"),
            Self::AiProvider { name } => write!(f, "provider:{}", name),
        }
    }
}

/// The selected path plus the ordered alternatives tried when it fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionPlan {
    pub selected: ExecutionPath,
    pub fallback_chain: Vec<ExecutionPath>,
}

impl ExecutionPlan {
    /// Build a plan from paths in preference order.
    ///
    /// Returns `None` when `paths` is empty.
    pub fn from_paths(paths: Vec<ExecutionPath>) -> Option<Self> {
        let mut paths = paths.into_iter();
        let selected = paths.next()?;
        Some(Self {
            selected,
            fallback_chain: paths.collect(),
        })
    }

    /// Every path in order, selected first.
    pub fn paths(&self) -> impl Iterator<Item = &ExecutionPath> {
        std::iter::once(&self.selected).chain(self.fallback_chain.iter())
    }
}
