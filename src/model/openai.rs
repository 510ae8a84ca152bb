//! OpenAI-compatible chat completions backend
//!
//! Talks to any endpoint implementing the OpenAI chat completions API
//! (OpenAI itself, OpenRouter, vLLM, llama.cpp server). Translates between
//! the internal message format and the wire format, and classifies HTTP and
//! transport failures into [`BackendError`] for the adapter's retry logic.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::conversation::{Message, Role, ToolCall};
use crate::error::BackendError;

use super::types::{ModelBackend, ModelResponse, ToolSchema};

/// Backend for OpenAI-compatible chat completion endpoints.
pub struct OpenAiBackend {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiBackend {
    /// Create a backend against `api_base` (e.g. `https://api.openai.com/v1`).
    pub fn new(api_base: &str, api_key: &str, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            max_tokens: 4096,
            temperature: 0.7,
        }
    }

    /// Set the maximum number of tokens to generate.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl ModelBackend for OpenAiBackend {
    async fn complete(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolSchema>,
    ) -> std::result::Result<ModelResponse, BackendError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: convert_messages(&messages),
            tools: if tools.is_empty() {
                None
            } else {
                Some(tools.iter().map(convert_tool).collect())
            },
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        debug!(
            model = %self.model,
            messages = messages.len(),
            tools = tools.len(),
            "sending chat completion request"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), &body));
        }

        let parsed: ChatResponse = response.json().await.map_err(classify_transport)?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::Unknown("response contained no choices".into()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCall::new(&tc.id, &tc.function.name, &tc.function.arguments))
            .collect();

        Ok(ModelResponse {
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
        })
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// Classify a non-success HTTP status into a [`BackendError`].
///
/// The body is consulted for overload markers; 5xx without one is a plain
/// server error.
pub fn classify_status(status: u16, body: &str) -> BackendError {
    let lower = body.to_lowercase();
    match status {
        401 | 403 => BackendError::Auth(body.to_string()),
        429 => BackendError::RateLimit(body.to_string()),
        408 => BackendError::Timeout(body.to_string()),
        400 | 404 | 422 => BackendError::InvalidRequest(format!("HTTP {}: {}", status, body)),
        500..=599 => {
            if lower.contains("overloaded") {
                BackendError::Overloaded(body.to_string())
            } else {
                BackendError::ServerError(format!("HTTP {}: {}", status, body))
            }
        }
        _ => BackendError::Unknown(format!("HTTP {}: {}", status, body)),
    }
}

/// Classify a reqwest transport failure into a [`BackendError`].
pub fn classify_transport(err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::Timeout(err.to_string())
    } else if err.is_body() || err.is_decode() {
        // The response body was dropped or truncated mid-read. A fresh
        // request gets a fresh body, so this is retryable but kept distinct.
        BackendError::StreamNotConsumed(err.to_string())
    } else {
        BackendError::Unknown(err.to_string())
    }
}

fn convert_messages(messages: &[Message]) -> Vec<WireMessage> {
    messages
        .iter()
        .map(|msg| WireMessage {
            role: msg.role,
            // The API rejects "" alongside tool_calls; send null instead.
            content: if msg.content.is_empty() && msg.has_tool_calls() {
                None
            } else {
                Some(msg.content.clone())
            },
            tool_calls: msg.tool_calls.as_ref().map(|calls| {
                calls
                    .iter()
                    .map(|c| WireToolCall {
                        id: c.id.clone(),
                        kind: "function".to_string(),
                        function: WireFunction {
                            name: c.name.clone(),
                            arguments: c.arguments.clone(),
                        },
                    })
                    .collect()
            }),
            tool_call_id: msg.tool_call_id.clone(),
        })
        .collect()
}

fn convert_tool(tool: &ToolSchema) -> WireTool {
    WireTool {
        kind: "function".to_string(),
        function: WireToolFunction {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.parameters.clone(),
        },
    }
}

// Wire format types

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct WireMessage {
    role: Role,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    function: WireFunction,
}

#[derive(Serialize, Deserialize)]
struct WireFunction {
    name: String,
    arguments: String,
}

#[derive(Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: String,
    function: WireToolFunction,
}

#[derive(Serialize)]
struct WireToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status_auth() {
        assert!(matches!(classify_status(401, "bad key"), BackendError::Auth(_)));
        assert!(matches!(classify_status(403, "no"), BackendError::Auth(_)));
    }

    #[test]
    fn test_classify_status_rate_limit() {
        assert!(matches!(
            classify_status(429, "slow down"),
            BackendError::RateLimit(_)
        ));
    }

    #[test]
    fn test_classify_status_overloaded_beats_server_error() {
        assert!(matches!(
            classify_status(529, r#"{"type":"overloaded_error"}"#),
            BackendError::Overloaded(_)
        ));
        assert!(matches!(
            classify_status(503, "Overloaded"),
            BackendError::Overloaded(_)
        ));
        assert!(matches!(
            classify_status(500, "internal"),
            BackendError::ServerError(_)
        ));
    }

    #[test]
    fn test_classify_status_invalid_request() {
        assert!(matches!(
            classify_status(400, "bad json"),
            BackendError::InvalidRequest(_)
        ));
        assert!(matches!(
            classify_status(404, "no such model"),
            BackendError::InvalidRequest(_)
        ));
    }

    #[test]
    fn test_classify_status_timeout_and_unknown() {
        assert!(matches!(classify_status(408, ""), BackendError::Timeout(_)));
        assert!(matches!(classify_status(418, ""), BackendError::Unknown(_)));
    }

    #[test]
    fn test_convert_messages_nulls_empty_content_with_tool_calls() {
        let msgs = vec![Message::assistant_with_tools(
            "",
            vec![ToolCall::new("c1", "echo", "{}")],
        )];
        let wire = convert_messages(&msgs);
        assert!(wire[0].content.is_none());
        assert_eq!(wire[0].tool_calls.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_convert_messages_keeps_plain_content() {
        let msgs = vec![Message::user("hello")];
        let wire = convert_messages(&msgs);
        assert_eq!(wire[0].content.as_deref(), Some("hello"));
        assert!(wire[0].tool_calls.is_none());
    }

    #[test]
    fn test_convert_tool_wire_shape() {
        let schema = ToolSchema::new("echo", "Echo back", serde_json::json!({"type": "object"}));
        let wire = convert_tool(&schema);
        let json = serde_json::to_value(&wire).unwrap();
        assert_eq!(json["type"], "function");
        assert_eq!(json["function"]["name"], "echo");
    }

    #[test]
    fn test_tool_result_message_carries_call_id_on_wire() {
        let msgs = vec![Message::tool_result("c1", "3 tasks")];
        let wire = convert_messages(&msgs);
        let json = serde_json::to_value(&wire[0]).unwrap();
        assert_eq!(json["role"], "tool");
        assert_eq!(json["tool_call_id"], "c1");
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "search_tasks", "arguments": "{\"query\":\"due\"}"}
                    }]
                }
            }]
        }"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        let msg = &parsed.choices[0].message;
        assert!(msg.content.is_none());
        assert_eq!(msg.tool_calls.as_ref().unwrap()[0].function.name, "search_tasks");
    }
}
