use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a capability call did not produce an output.
///
/// Always recoverable: the message becomes the error payload sent back to
/// the model and the `error` field of the trace entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum ToolError {
    #[error("tool not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("timeout after {0}ms")]
    Timeout(u64),
    #[error("execution failed: {0}")]
    Execution(String),
    #[error("executor panicked")]
    Panicked,
    /// Proposed alongside another call in the same turn and skipped.
    #[error("not executed: only one tool call is honored per round")]
    NotExecuted,
}
