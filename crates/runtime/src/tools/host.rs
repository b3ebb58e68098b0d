//! Tool host trait.

use crate::model::{ToolCall, ToolSpec};
use crate::tools::Execution;
use std::future::Future;

/// Trait for tool execution hosts.
///
/// Implementations provide tool specifications and execute tool calls.
/// This is the boundary between the model loop and data access. Execution
/// never fails outright: every problem is reported in the returned
/// [`Execution`]'s outcome.
pub trait ToolHost: Send + Sync {
    /// Declarations forwarded to the model.
    fn specs(&self) -> &[ToolSpec];

    /// Execute a tool call.
    fn execute(&self, call: &ToolCall) -> impl Future<Output = Execution> + Send;
}
