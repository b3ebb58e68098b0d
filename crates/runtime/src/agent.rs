//! The bounded conversation loop.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::envelope::{BUDGET_EXHAUSTED, NO_RESPONSE, ResponseEnvelope, ToolCallTrace};
use crate::gateway::{DEFAULT_MODEL_TIMEOUT, Gateway, GatewayResponse, Input};
use crate::model::{Backend, ToolResult};
use crate::tools::ToolHost;
use crate::{Error, Result};

pub const DEFAULT_MAX_ROUNDS: usize = 6;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are CloudLens, a Google Cloud cost and \
infrastructure health assistant. Answer using only data returned by the available \
tools; call a tool whenever the question needs numbers. Keep answers short: at most \
five concise bullet points. When asked about spend, include the total and the most \
expensive services, and suggest one or two optimizations. If a tool fails, say which \
data is unavailable instead of guessing. Never invent figures.";

/// Loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Maximum number of tool executions per query.
    pub max_rounds: usize,
    /// Per-call limit for a model round-trip.
    #[serde(with = "secs")]
    pub model_timeout: Duration,
    pub system_prompt: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            model_timeout: DEFAULT_MODEL_TIMEOUT,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

/// Answers natural-language questions by letting the model call read-only
/// capabilities.
///
/// Holds no per-request state: each [`Agent::handle_chat`] call gets its own
/// conversation, so one agent can serve concurrent requests.
pub struct Agent<B, H> {
    gateway: Gateway<B>,
    tools: H,
    config: AgentConfig,
}

impl<B: Backend, H: ToolHost> Agent<B, H> {
    pub fn new(backend: B, tools: H) -> Self {
        Self::with_config(backend, tools, AgentConfig::default())
    }

    pub fn with_config(backend: B, tools: H, config: AgentConfig) -> Self {
        Self {
            gateway: Gateway::new(backend).with_timeout(config.model_timeout),
            tools,
            config,
        }
    }

    /// Answer one query.
    ///
    /// Only an empty query is an error. Model failures, tool failures and an
    /// exhausted round budget all still produce an envelope carrying the
    /// trace so far.
    pub async fn handle_chat(&self, query: &str) -> Result<ResponseEnvelope> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::EmptyQuery);
        }

        let span = info_span!("chat", id = %Uuid::new_v4());
        Ok(self.run(query).instrument(span).await)
    }

    async fn run(&self, query: &str) -> ResponseEnvelope {
        let mut conversation = self
            .gateway
            .begin(self.config.system_prompt.as_str(), self.tools.specs().to_vec());
        let mut calls: Vec<ToolCallTrace> = Vec::new();
        let mut last_text = String::new();
        let mut input = Input::User(query.to_string());

        loop {
            let response = match self.gateway.send(&mut conversation, input).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(error = %e, rounds = calls.len(), "model call failed");
                    return ResponseEnvelope::new(&last_text, calls, NO_RESPONSE);
                }
            };

            let (call, text) = match response {
                GatewayResponse::FinalText(text) => {
                    info!(rounds = calls.len(), "final answer");
                    let text = if text.trim().is_empty() { last_text } else { text };
                    return ResponseEnvelope::new(&text, calls, NO_RESPONSE);
                }
                GatewayResponse::RequestedCall { call, text } => (call, text),
            };
            if !text.trim().is_empty() {
                last_text = text;
            }

            if calls.len() >= self.config.max_rounds {
                warn!(max_rounds = self.config.max_rounds, "round budget exhausted");
                return ResponseEnvelope::new(&last_text, calls, BUDGET_EXHAUSTED);
            }

            debug!(round = calls.len() + 1, capability = %call.name, "tool requested");
            let execution = self.tools.execute(&call).await;
            calls.push(ToolCallTrace::from(&execution));

            input = Input::ToolResult(ToolResult {
                tool_call_id: call.id,
                name: call.name,
                outcome: execution.outcome,
            });
        }
    }
}
