//! Tool-related types.

use super::ToolError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What came out of running a capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcome {
    Success { output: Value },
    Error { message: String },
}

impl ToolOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Error { message } => Some(message),
        }
    }
}

impl From<ToolError> for ToolOutcome {
    fn from(error: ToolError) -> Self {
        Self::Error {
            message: error.to_string(),
        }
    }
}

/// One execution attempt: the capability name, the arguments that were
/// actually used, and the outcome.
///
/// `arguments` holds the validated (defaulted and clamped) arguments when
/// binding succeeded, and the raw model arguments otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub name: String,
    pub arguments: Value,
    pub outcome: ToolOutcome,
}

impl Execution {
    pub(crate) fn failed(name: impl Into<String>, arguments: Value, error: ToolError) -> Self {
        Self {
            name: name.into(),
            arguments,
            outcome: error.into(),
        }
    }
}
