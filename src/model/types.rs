//! Backend types for the model client
//!
//! This module defines the boundary to the tool-calling LLM backend: the
//! `ModelBackend` trait, the tool schema handed to it, and its raw response
//! shape. Everything above this boundary (repair, retry, telemetry) lives in
//! the adapter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::conversation::{Message, ToolCall};
use crate::error::BackendError;

/// Schema of a tool exposed to the model.
///
/// # Example
/// ```
/// use conductor::model::ToolSchema;
/// use serde_json::json;
///
/// let schema = ToolSchema::new(
///     "calendar_list_events",
///     "List calendar events in a date range",
///     json!({
///         "type": "object",
///         "properties": {
///             "start": { "type": "string", "description": "ISO date" },
///             "end": { "type": "string", "description": "ISO date" }
///         },
///         "required": ["start", "end"]
///     }),
/// );
/// assert_eq!(schema.name, "calendar_list_events");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    /// The name of the tool (must be unique)
    pub name: String,
    /// Human-readable description of what the tool does
    pub description: String,
    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

impl ToolSchema {
    /// Create a new tool schema.
    pub fn new(name: &str, description: &str, parameters: serde_json::Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        }
    }
}

/// Raw response from the LLM backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    /// Text content of the response (may be empty when tool calls are present)
    pub content: String,
    /// Tool calls issued by the model
    pub tool_calls: Vec<ToolCall>,
}

impl ModelResponse {
    /// Create a plain text response with no tool calls.
    pub fn text(content: &str) -> Self {
        Self {
            content: content.to_string(),
            tool_calls: vec![],
        }
    }

    /// Create a response carrying tool calls.
    pub fn with_tools(content: &str, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: content.to_string(),
            tool_calls,
        }
    }

    /// Check if this response contains any tool calls.
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Convert into a log message, attributing tool calls when present.
    pub fn into_message(self) -> Message {
        if self.tool_calls.is_empty() {
            Message::assistant(&self.content)
        } else {
            Message::assistant_with_tools(&self.content, self.tool_calls)
        }
    }
}

/// Boundary trait for the tool-calling LLM backend.
///
/// Implementations translate between Conductor's message format and the
/// backend's wire format, and classify failures into [`BackendError`] so the
/// adapter can tell transient overload apart from terminal errors.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Send a completion request.
    ///
    /// # Arguments
    /// * `messages` - The repaired conversation history
    /// * `tools` - Tool schemas the model may call
    async fn complete(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolSchema>,
    ) -> std::result::Result<ModelResponse, BackendError>;

    /// Get the backend name (e.g., "openai").
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_response_text() {
        let resp = ModelResponse::text("Hello");
        assert_eq!(resp.content, "Hello");
        assert!(!resp.has_tool_calls());
    }

    #[test]
    fn test_model_response_with_tools() {
        let call = ToolCall::new("c1", "current_datetime", "{}");
        let resp = ModelResponse::with_tools("", vec![call]);
        assert!(resp.has_tool_calls());
    }

    #[test]
    fn test_into_message_plain() {
        let msg = ModelResponse::text("done").into_message();
        assert_eq!(msg.content, "done");
        assert!(!msg.has_tool_calls());
    }

    #[test]
    fn test_into_message_with_tools() {
        let call = ToolCall::new("c1", "search_tasks", r#"{"query":"x"}"#);
        let msg = ModelResponse::with_tools("", vec![call]).into_message();
        assert!(msg.has_tool_calls());
        assert_eq!(msg.tool_calls.as_ref().unwrap()[0].id, "c1");
    }

    #[test]
    fn test_tool_schema_serialization() {
        let schema = ToolSchema::new("echo", "Echo", serde_json::json!({"type": "object"}));
        let json = serde_json::to_string(&schema).unwrap();
        let parsed: ToolSchema = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.name, "echo");
    }
}
