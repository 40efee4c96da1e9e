//! Per-tool results and the deterministic merge into one combined result.

use brain_core::ResponseStatus;
use serde_json::{Map, Value};

use crate::error::ToolError;
use crate::registry::ToolBinding;
use crate::tool::ToolOutput;

/// Outcome of a single guarded tool call.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub tool_name: String,
    pub priority: u32,
    pub required: bool,
    pub success: bool,
    pub data: Map<String, Value>,
    pub summary: Option<String>,
    pub error: Option<ToolError>,
}

impl ToolResult {
    /// Build a result from a binding and the call's outcome.
    pub fn from_outcome(binding: &ToolBinding, outcome: Result<ToolOutput, ToolError>) -> Self {
        match outcome {
            Ok(output) => Self {
                tool_name: binding.tool.clone(),
                priority: binding.priority,
                required: binding.required,
                success: true,
                data: output.data,
                summary: Some(output.summary),
                error: None,
            },
            Err(error) => Self {
                tool_name: binding.tool.clone(),
                priority: binding.priority,
                required: binding.required,
                success: false,
                data: Map::new(),
                summary: None,
                error: Some(error),
            },
        }
    }
}

/// A failed tool call as recorded in the combined result.
#[derive(Debug, Clone)]
pub struct ToolFailure {
    pub tool: String,
    pub required: bool,
    pub error: ToolError,
}

/// The merged output of every tool call made for one request.
#[derive(Debug, Clone)]
pub struct CombinedResult {
    pub intent: String,
    /// Merged structured data from every successful call.
    pub data: Map<String, Value>,
    /// Individual results in merge order.
    pub results: Vec<ToolResult>,
    /// Every failed call, in merge order. Never dropped.
    pub errors: Vec<ToolFailure>,
    pub status: ResponseStatus,
}

impl CombinedResult {
    /// Merge results in a fixed order independent of completion order.
    ///
    /// Results are ordered by ascending priority then tool name and folded
    /// key by key, so on a collision the highest-priority tool wins.
    ///
    /// Status is `Failed` when every required tool failed (or every tool,
    /// when none is required), `PartialFailure` when anything else failed,
    /// and `Ok` otherwise.
    pub fn merge(intent: impl Into<String>, mut results: Vec<ToolResult>) -> Self {
        results.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| a.tool_name.cmp(&b.tool_name))
        });

        let mut data = Map::new();
        let mut errors = Vec::new();
        for result in &results {
            if result.success {
                for (key, value) in &result.data {
                    data.insert(key.clone(), value.clone());
                }
            } else if let Some(error) = &result.error {
                errors.push(ToolFailure {
                    tool: result.tool_name.clone(),
                    required: result.required,
                    error: error.clone(),
                });
            }
        }

        let status = Self::status_of(&results);
        Self {
            intent: intent.into(),
            data,
            results,
            errors,
            status,
        }
    }

    fn status_of(results: &[ToolResult]) -> ResponseStatus {
        let any_failed = results.iter().any(|r| !r.success);
        if !any_failed {
            return ResponseStatus::Ok;
        }

        let has_required = results.iter().any(|r| r.required);
        let all_essential_failed = results
            .iter()
            .filter(|r| r.required || !has_required)
            .all(|r| !r.success);

        if all_essential_failed {
            ResponseStatus::Failed
        } else {
            ResponseStatus::PartialFailure
        }
    }

    /// Whether the intent could not be served at all.
    pub fn is_failure(&self) -> bool {
        self.status == ResponseStatus::Failed
    }

    /// Summaries of the successful calls, in merge order.
    pub fn summaries(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter_map(|r| r.summary.as_deref())
            .collect()
    }

    /// The first failure of a required tool, if any.
    pub fn first_required_error(&self) -> Option<&ToolError> {
        self.errors.iter().find(|f| f.required).map(|f| &f.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ok(tool: &str, priority: u32, required: bool, data: Value) -> ToolResult {
        let binding = ToolBinding {
            tool: tool.into(),
            priority,
            required,
        };
        let mut output = ToolOutput::new(format!("{} ok", tool));
        if let Value::Object(map) = data {
            output.data = map;
        }
        ToolResult::from_outcome(&binding, Ok(output))
    }

    fn failed(tool: &str, priority: u32, required: bool) -> ToolResult {
        let binding = ToolBinding {
            tool: tool.into(),
            priority,
            required,
        };
        ToolResult::from_outcome(&binding, Err(ToolError::ExecutionFailed("boom".into())))
    }

    #[test]
    fn test_merge_is_order_independent() {
        let a = ok("metrics", 1, true, json!({"total": 10, "shared": "metrics"}));
        let b = ok("risk", 2, true, json!({"risk": "low", "shared": "risk"}));
        let c = failed("alerts", 0, false);

        let forward = CombinedResult::merge("x", vec![a.clone(), b.clone(), c.clone()]);
        let backward = CombinedResult::merge("x", vec![c, b, a]);

        assert_eq!(forward.data, backward.data);
        assert_eq!(forward.status, backward.status);
        assert_eq!(forward.summaries(), backward.summaries());
        assert_eq!(forward.data["shared"], "risk");
    }

    #[test]
    fn test_equal_priority_breaks_ties_by_name() {
        let a = ok("alpha", 1, true, json!({"k": "alpha"}));
        let b = ok("beta", 1, true, json!({"k": "beta"}));
        let merged = CombinedResult::merge("x", vec![b, a]);
        assert_eq!(merged.data["k"], "beta");
    }

    #[test]
    fn test_status_rules() {
        let all_ok = CombinedResult::merge("x", vec![ok("a", 1, true, json!({}))]);
        assert_eq!(all_ok.status, ResponseStatus::Ok);

        let optional_failed = CombinedResult::merge(
            "x",
            vec![ok("a", 1, true, json!({})), failed("b", 0, false)],
        );
        assert_eq!(optional_failed.status, ResponseStatus::PartialFailure);
        assert_eq!(optional_failed.errors.len(), 1);
        assert!(optional_failed.first_required_error().is_none());

        let one_required_failed = CombinedResult::merge(
            "x",
            vec![ok("a", 1, true, json!({})), failed("b", 2, true)],
        );
        assert_eq!(one_required_failed.status, ResponseStatus::PartialFailure);

        let required_failed = CombinedResult::merge(
            "x",
            vec![failed("a", 1, true), ok("b", 0, false, json!({"x": 1}))],
        );
        assert!(required_failed.is_failure());
        assert!(required_failed.first_required_error().is_some());

        let only_optional_failed = CombinedResult::merge("x", vec![failed("b", 0, false)]);
        assert!(only_optional_failed.is_failure());
    }
}
