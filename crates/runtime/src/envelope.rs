//! What a chat request returns.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tools::Execution;

/// Text used when the model produced nothing usable.
pub const NO_RESPONSE: &str = "No response from the model.";

/// Text used when the tool-call budget ran out before a final answer.
pub const BUDGET_EXHAUSTED: &str =
    "Stopped after reaching the tool-call limit before a final answer was produced.";

/// One entry of the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallTrace {
    pub name: String,
    pub args: Value,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Execution> for ToolCallTrace {
    fn from(execution: &Execution) -> Self {
        Self {
            name: execution.name.clone(),
            args: execution.arguments.clone(),
            ok: execution.outcome.is_success(),
            error: execution.outcome.error_message().map(str::to_string),
        }
    }
}

/// Final text plus every capability call made on the way, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub text: String,
    pub calls: Vec<ToolCallTrace>,
}

impl ResponseEnvelope {
    /// Trim `text`, substituting `fallback` when nothing is left.
    pub(crate) fn new(text: &str, calls: Vec<ToolCallTrace>, fallback: &str) -> Self {
        let text = match text.trim() {
            "" => fallback,
            trimmed => trimmed,
        };
        Self {
            text: text.to_string(),
            calls,
        }
    }
}
