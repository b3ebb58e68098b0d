//! Gemini `generateContent` backend.

use crate::model::{
    Backend, Message, ModelError, ModelRequest, ModelResponse, Part, Role, ToolCall, ToolResult,
    ToolSpec, Usage,
};
use crate::tools::ToolOutcome;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::debug;

pub const DEFAULT_MODEL: &str = "gemini-2.5-pro";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

// Prefix of ids minted for calls the model sent without one.
const SYNTHETIC_ID_PREFIX: &str = "call_";

/// Schema keywords the function-declaration dialect understands.
const SCHEMA_KEYS: [&str; 7] = [
    "type",
    "description",
    "properties",
    "required",
    "minimum",
    "maximum",
    "enum",
];

// ─────────────────────────────────────────────────────────────────────────────
// API Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest {
    contents: Vec<ApiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<ApiSystemInstruction>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool>,
    generation_config: ApiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct ApiSystemInstruction {
    parts: Vec<ApiPart>,
}

#[derive(Debug, Serialize)]
struct ApiContent {
    role: &'static str,
    parts: Vec<ApiPart>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<ApiFunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_response: Option<ApiFunctionResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thought_signature: Option<String>,
}

impl ApiPart {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize)]
struct ApiFunctionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiTool {
    function_declarations: Vec<ApiFunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct ApiFunctionDeclaration {
    name: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<Value>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
    #[serde(default)]
    usage_metadata: Option<ApiUsage>,
    #[serde(default)]
    prompt_feedback: Option<ApiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiCandidate {
    #[serde(default)]
    content: Option<ApiResponseContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponseContent {
    #[serde(default)]
    parts: Vec<ApiResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    function_call: Option<ApiFunctionCall>,
    #[serde(default)]
    thought: bool,
    #[serde(default)]
    thought_signature: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend Implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for creating a Gemini backend.
#[derive(Debug, Clone)]
pub struct GeminiBackendBuilder {
    api_key: String,
    model: String,
    base_url: String,
    temperature: Option<f32>,
    max_output_tokens: Option<u32>,
}

impl GeminiBackendBuilder {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: None,
            max_output_tokens: None,
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = Some(max_output_tokens);
        self
    }

    pub fn build(self) -> GeminiBackend {
        GeminiBackend {
            client: reqwest::Client::new(),
            api_key: self.api_key,
            endpoint: format!(
                "{}/models/{}:generateContent",
                self.base_url.trim_end_matches('/'),
                self.model
            ),
            model: self.model,
            generation: ApiGenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            },
        }
    }
}

/// Gemini API backend.
pub struct GeminiBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
    generation: ApiGenerationConfig,
}

impl GeminiBackend {
    pub fn builder(api_key: impl Into<String>) -> GeminiBackendBuilder {
        GeminiBackendBuilder::new(api_key)
    }

    fn role_to_api(role: Role) -> &'static str {
        match role {
            Role::User => "user",
            Role::Assistant => "model",
        }
    }

    fn message_to_api(msg: &Message) -> ApiContent {
        let parts = msg
            .parts
            .iter()
            .map(|part| match part {
                Part::Text(text) => ApiPart::text(text.as_str()),
                Part::ToolCall(call) => ApiPart {
                    function_call: Some(ApiFunctionCall {
                        id: model_call_id(&call.id),
                        name: call.name.clone(),
                        args: call.input.clone(),
                    }),
                    thought_signature: call.signature.clone(),
                    ..Default::default()
                },
                Part::ToolResult(result) => ApiPart {
                    function_response: Some(Self::result_to_api(result)),
                    ..Default::default()
                },
            })
            .collect();

        ApiContent {
            role: Self::role_to_api(msg.role),
            parts,
        }
    }

    /// Function responses must be objects: bare outputs are wrapped under
    /// `result`, failures under `error`.
    fn result_to_api(result: &ToolResult) -> ApiFunctionResponse {
        let response = match &result.outcome {
            ToolOutcome::Success { output: Value::Object(map) } => Value::Object(map.clone()),
            ToolOutcome::Success { output } => json!({ "result": output }),
            ToolOutcome::Error { message } => json!({ "error": message }),
        };
        ApiFunctionResponse {
            id: model_call_id(&result.tool_call_id),
            name: result.name.clone(),
            response,
        }
    }

    fn tool_to_api(spec: &ToolSpec) -> ApiFunctionDeclaration {
        let has_properties = spec
            .schema
            .get("properties")
            .and_then(Value::as_object)
            .is_some_and(|p| !p.is_empty());

        ApiFunctionDeclaration {
            name: spec.name.clone(),
            description: spec.description.clone(),
            parameters: has_properties.then(|| filter_schema(&spec.schema)),
        }
    }

    fn response_to_message(parts: Vec<ApiResponsePart>) -> Message {
        let mut out = Vec::new();
        for part in parts {
            if part.thought {
                continue;
            }
            if let Some(text) = part.text.filter(|t| !t.is_empty()) {
                out.push(Part::Text(text));
            }
            if let Some(call) = part.function_call {
                let id = call.id.unwrap_or_else(|| {
                    format!("{SYNTHETIC_ID_PREFIX}{}", uuid::Uuid::new_v4().simple())
                });
                let input = match call.args {
                    Value::Null => Value::Object(Map::new()),
                    args => args,
                };
                out.push(Part::ToolCall(ToolCall {
                    id,
                    name: call.name,
                    input,
                    signature: part.thought_signature,
                }));
            }
        }

        Message {
            role: Role::Assistant,
            parts: out,
        }
    }

    fn decode(response: ApiResponse) -> Result<ModelResponse, ModelError> {
        let usage = response
            .usage_metadata
            .map(|u| Usage {
                input_tokens: u.prompt_token_count,
                output_tokens: u.candidates_token_count,
            })
            .unwrap_or_default();

        let Some(candidate) = response.candidates.into_iter().next() else {
            let reason = response
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .ok_or_else(|| ModelError::InvalidResponse("no candidates".into()))?;
            return Err(ModelError::Blocked(reason));
        };

        let parts = match (candidate.content, candidate.finish_reason) {
            (Some(content), _) => content.parts,
            (None, Some(reason)) if reason != "STOP" => return Err(ModelError::Blocked(reason)),
            (None, _) => Vec::new(),
        };

        Ok(ModelResponse {
            message: Self::response_to_message(parts),
            usage,
        })
    }
}

/// The id to echo back to Gemini: ids it supplied go back verbatim, ids
/// minted locally are withheld.
fn model_call_id(id: &str) -> Option<String> {
    let synthetic = id
        .strip_prefix(SYNTHETIC_ID_PREFIX)
        .is_some_and(|rest| rest.len() == 32 && rest.bytes().all(|b| b.is_ascii_hexdigit()));
    (!synthetic).then(|| id.to_string())
}

/// Keep only the schema keywords Gemini accepts, recursing into properties.
fn filter_schema(schema: &Value) -> Value {
    let Value::Object(map) = schema else {
        return schema.clone();
    };
    let filtered = map
        .iter()
        .filter(|(key, _)| SCHEMA_KEYS.contains(&key.as_str()))
        .map(|(key, value)| {
            let value = match (key.as_str(), value) {
                ("properties", Value::Object(props)) => Value::Object(
                    props
                        .iter()
                        .map(|(name, prop)| (name.clone(), filter_schema(prop)))
                        .collect(),
                ),
                _ => value.clone(),
            };
            (key.clone(), value)
        })
        .collect();
    Value::Object(filtered)
}

impl std::fmt::Display for GeminiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "gemini({})", self.model)
    }
}

impl Backend for GeminiBackend {
    async fn call(&self, request: ModelRequest<'_>) -> Result<ModelResponse, ModelError> {
        let tools = if request.tools.is_empty() {
            Vec::new()
        } else {
            vec![ApiTool {
                function_declarations: request.tools.iter().map(Self::tool_to_api).collect(),
            }]
        };

        let api_request = ApiRequest {
            contents: request.messages.iter().map(Self::message_to_api).collect(),
            system_instruction: request.system.map(|s| ApiSystemInstruction {
                parts: vec![ApiPart::text(s)],
            }),
            tools,
            generation_config: ApiGenerationConfig {
                temperature: self.generation.temperature,
                max_output_tokens: self.generation.max_output_tokens,
            },
        };

        debug!(model = %self.model, messages = request.messages.len(), "generateContent");

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&api_request)
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Api { status, body });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        Self::decode(api_response)
    }
}
