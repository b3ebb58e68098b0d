//! Tool execution against the capability registry.

pub mod errors;
mod executor;
mod host;
mod types;

pub use errors::ToolError;
pub use executor::{DEFAULT_TOOL_TIMEOUT, Executor};
pub use host::ToolHost;
pub use types::{Execution, ToolOutcome};
