//! Core tool types
//!
//! Defines the `Tool` trait every executable tool implements and the
//! `ToolContext` carrying the identity scope a tool runs under.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::model::ToolSchema;

/// Identity scope for a tool execution.
///
/// Tools never see the conversation; they see who the turn is for and which
/// thread it belongs to.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// End user the turn is running for
    pub user_id: String,
    /// Deployment category (e.g. "personal", "team")
    pub category: String,
    /// Conversation thread id
    pub thread_id: String,
}

impl ToolContext {
    /// Create a context for a user and thread.
    pub fn new(user_id: &str, category: &str, thread_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            category: category.to_string(),
            thread_id: thread_id.to_string(),
        }
    }
}

/// An executable tool a worker can call.
///
/// Implementations return their result as a string (usually JSON). Errors
/// propagate to the registry, where the worker loop converts them into
/// in-band results so the model can react to them.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name.
    fn name(&self) -> &str;

    /// Human-readable description shown to the model.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's parameters.
    fn parameters(&self) -> Value;

    /// Execute with already-parsed JSON arguments.
    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String>;

    /// The schema advertised to the model.
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(self.name(), self.description(), self.parameters())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the input back"
        }

        fn parameters(&self) -> Value {
            serde_json::json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            })
        }

        async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<String> {
            Ok(args["text"].as_str().unwrap_or_default().to_string())
        }
    }

    #[tokio::test]
    async fn test_tool_execute() {
        let tool = EchoTool;
        let ctx = ToolContext::new("u1", "personal", "t1");
        let out = tool
            .execute(serde_json::json!({"text": "hi"}), &ctx)
            .await
            .unwrap();
        assert_eq!(out, "hi");
    }

    #[test]
    fn test_tool_schema_from_trait() {
        let schema = EchoTool.schema();
        assert_eq!(schema.name, "echo");
        assert_eq!(schema.parameters["required"][0], "text");
    }
}
