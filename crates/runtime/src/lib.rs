//! CloudLens runtime: the model-driven conversation loop.
//!
//! # Overview
//!
//! The runtime is organized around these concepts:
//!
//! - **Backend**: a trait abstracting LLM providers ([`GeminiBackend`]).
//! - **Gateway**: turns a backend into a turn-by-turn conversation that
//!   yields either final text or exactly one requested call.
//! - **ToolHost**: runs requested calls. [`Executor`] runs them against a
//!   [`capability::Registry`] with argument clamping and a per-call timeout.
//! - **Agent**: the bounded loop tying them together, producing a
//!   [`ResponseEnvelope`] with the answer and an audit trail of calls.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use runtime::{Agent, Executor, GeminiBackend};
//!
//! # async fn example(registry: capability::Registry) -> runtime::Result<()> {
//! let backend = GeminiBackend::builder("AIza...").build();
//! let agent = Agent::new(backend, Executor::new(Arc::new(registry)));
//!
//! let envelope = agent.handle_chat("What's my GCP spend this month?").await?;
//! println!("{}", envelope.text);
//! # Ok(())
//! # }
//! ```

mod agent;
mod envelope;
mod error;
pub mod gateway;
pub mod model;
mod providers;
pub mod tools;

pub use agent::{Agent, AgentConfig, DEFAULT_MAX_ROUNDS, DEFAULT_SYSTEM_PROMPT};
pub use envelope::{BUDGET_EXHAUSTED, NO_RESPONSE, ResponseEnvelope, ToolCallTrace};
pub use error::{Error, Result};
pub use gateway::{Conversation, Gateway, GatewayError, GatewayResponse, Input};
pub use model::{Backend, Message, ModelError, ModelRequest, ModelResponse, Part, Role, ToolCall};
pub use providers::{DEFAULT_MODEL, GeminiBackend, GeminiBackendBuilder};
pub use tools::{Execution, Executor, ToolHost, ToolOutcome};
