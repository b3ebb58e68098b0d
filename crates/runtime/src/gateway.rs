//! Conversational wrapper around a model [`Backend`].
//!
//! The gateway owns the provider protocol details the loop should not care
//! about: history bookkeeping, call/response pairing, and the single-call
//! tie-break.

use std::time::Duration;

use tracing::{debug, warn};

use crate::model::{
    Backend, Message, ModelError, ModelRequest, Part, Role, ToolCall, ToolResult, ToolSpec,
};
use crate::tools::ToolError;

/// Default per-call limit for a model round-trip.
pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(60);

/// Failure of a model round-trip. Ends the conversation.
pub type GatewayError = ModelError;

/// State of one in-flight conversation.
///
/// Created by [`Gateway::begin`] and owned by a single request.
#[derive(Debug, Clone)]
pub struct Conversation {
    system: String,
    tools: Vec<ToolSpec>,
    messages: Vec<Message>,
    /// Calls from the latest model turn still waiting for an answer.
    pending: Vec<ToolCall>,
}

impl Conversation {
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Answers for every pending call: `answered` where it matches, the
    /// not-executed error for the rest.
    fn settle_pending(&mut self, answered: Option<ToolResult>) -> Vec<Part> {
        let mut answered = answered;
        let mut parts: Vec<Part> = std::mem::take(&mut self.pending)
            .into_iter()
            .map(|call| {
                match answered.take_if(|r| r.tool_call_id == call.id) {
                    Some(result) => result,
                    None => ToolResult {
                        tool_call_id: call.id,
                        name: call.name,
                        outcome: ToolError::NotExecuted.into(),
                    },
                }
            })
            .map(Part::ToolResult)
            .collect();
        // A result for a call we never proposed still goes out.
        if let Some(result) = answered {
            parts.push(Part::ToolResult(result));
        }
        parts
    }
}

/// What to send on the next turn.
#[derive(Debug, Clone)]
pub enum Input {
    User(String),
    ToolResult(ToolResult),
}

/// What the model did on its turn.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayResponse {
    /// Plain answer, no capability requested.
    FinalText(String),
    /// The model wants a capability run. `text` is any prose it emitted
    /// alongside the call.
    RequestedCall { call: ToolCall, text: String },
}

/// Drives a [`Backend`] one turn at a time.
pub struct Gateway<B> {
    backend: B,
    timeout: Duration,
}

impl<B: Backend> Gateway<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            timeout: DEFAULT_MODEL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Open a conversation with a system instruction and the tool declarations.
    pub fn begin(&self, system_prompt: impl Into<String>, tools: Vec<ToolSpec>) -> Conversation {
        Conversation {
            system: system_prompt.into(),
            tools,
            messages: Vec::new(),
            pending: Vec::new(),
        }
    }

    /// Send one turn and read back the model's answer.
    ///
    /// When the model proposes several calls in one turn only the last is
    /// returned; the others are answered with a not-executed error on the
    /// next send.
    pub async fn send(
        &self,
        conversation: &mut Conversation,
        input: Input,
    ) -> Result<GatewayResponse, GatewayError> {
        let parts = match input {
            Input::User(text) => {
                let mut parts = conversation.settle_pending(None);
                parts.push(Part::Text(text));
                parts
            }
            Input::ToolResult(result) => conversation.settle_pending(Some(result)),
        };
        conversation.messages.push(Message {
            role: Role::User,
            parts,
        });

        let request = ModelRequest {
            system: Some(conversation.system.as_str()).filter(|s| !s.is_empty()),
            messages: &conversation.messages,
            tools: &conversation.tools,
        };
        let response = tokio::time::timeout(self.timeout, self.backend.call(request))
            .await
            .map_err(|_| ModelError::Timeout(self.timeout))??;

        debug!(
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "model turn"
        );

        let message = response.message;
        let text = message.text();
        let mut calls = message.tool_calls();
        conversation.messages.push(message);

        let Some(call) = calls.pop() else {
            return Ok(GatewayResponse::FinalText(text));
        };
        if !calls.is_empty() {
            warn!(
                honored = %call.name,
                dropped = calls.len(),
                "multiple calls in one turn; honoring the last"
            );
        }
        calls.push(call.clone());
        conversation.pending = calls;

        Ok(GatewayResponse::RequestedCall { call, text })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelResponse, Usage};
    use crate::tools::ToolOutcome;
    use serde_json::json;
    use std::sync::Mutex;

    /// Replies with canned messages and records every request.
    struct Canned {
        replies: Mutex<Vec<Message>>,
        seen: Mutex<Vec<Vec<Message>>>,
    }

    impl Canned {
        fn new(mut replies: Vec<Message>) -> Self {
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl Backend for Canned {
        async fn call(&self, request: ModelRequest<'_>) -> Result<ModelResponse, ModelError> {
            self.seen.lock().unwrap().push(request.messages.to_vec());
            let message = self
                .replies
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| ModelError::Network("script exhausted".into()))?;
            Ok(ModelResponse {
                message,
                usage: Usage::default(),
            })
        }
    }

    struct Stalled;

    impl Backend for Stalled {
        async fn call(&self, _request: ModelRequest<'_>) -> Result<ModelResponse, ModelError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Err(ModelError::Network("unreachable".into()))
        }
    }

    fn call(id: &str, name: &str) -> Part {
        Part::ToolCall(ToolCall {
            id: id.into(),
            name: name.into(),
            input: json!({}),
            signature: None,
        })
    }

    fn reply(parts: Vec<Part>) -> Message {
        Message {
            role: Role::Assistant,
            parts,
        }
    }

    #[tokio::test]
    async fn final_text() {
        let gateway = Gateway::new(Canned::new(vec![reply(vec![Part::Text("Hi".into())])]));
        let mut conversation = gateway.begin("system", Vec::new());

        let response = gateway
            .send(&mut conversation, Input::User("hello".into()))
            .await
            .unwrap();
        assert_eq!(response, GatewayResponse::FinalText("Hi".into()));
        assert_eq!(conversation.messages().len(), 2);
    }

    #[tokio::test]
    async fn last_call_wins_and_dropped_calls_are_answered() {
        let gateway = Gateway::new(Canned::new(vec![
            reply(vec![
                Part::Text("Checking".into()),
                call("a", "cpu_timeseries"),
                call("b", "tiles_summary"),
            ]),
            reply(vec![Part::Text("Done".into())]),
        ]));
        let mut conversation = gateway.begin("system", Vec::new());

        let response = gateway
            .send(&mut conversation, Input::User("health?".into()))
            .await
            .unwrap();
        let GatewayResponse::RequestedCall { call, text } = response else {
            panic!("expected a call");
        };
        assert_eq!(call.id, "b");
        assert_eq!(text, "Checking");

        let result = ToolResult {
            tool_call_id: "b".into(),
            name: "tiles_summary".into(),
            outcome: ToolOutcome::Success { output: json!({}) },
        };
        gateway
            .send(&mut conversation, Input::ToolResult(result.clone()))
            .await
            .unwrap();

        let answers = &conversation.messages()[2];
        assert_eq!(answers.role, Role::User);
        assert_eq!(
            answers.parts,
            vec![
                Part::ToolResult(ToolResult {
                    tool_call_id: "a".into(),
                    name: "cpu_timeseries".into(),
                    outcome: ToolOutcome::Error {
                        message: "not executed: only one tool call is honored per round".into(),
                    },
                }),
                Part::ToolResult(result),
            ]
        );
    }

    #[tokio::test]
    async fn backend_failure_surfaces() {
        let gateway = Gateway::new(Canned::new(Vec::new()));
        let mut conversation = gateway.begin("system", Vec::new());
        let err = gateway
            .send(&mut conversation, Input::User("hello".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::Network(_)));
    }

    #[tokio::test]
    async fn slow_backend_times_out() {
        let gateway = Gateway::new(Stalled).with_timeout(Duration::from_millis(20));
        let mut conversation = gateway.begin("system", Vec::new());
        let err = gateway
            .send(&mut conversation, Input::User("hello".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::Timeout(_)));
    }
}
