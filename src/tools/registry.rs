//! Tool registry
//!
//! Central lookup from tool name to implementation. Workers hold a shared
//! registry and expose only their configured subset of schemas to the model.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::error::{ConductorError, Result};
use crate::model::ToolSchema;

use super::types::{Tool, ToolContext};

/// Registry of available tools.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A tool with the same name is replaced.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            warn!(tool = %name, "replacing previously registered tool");
        }
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Whether a tool with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Execute a tool by name with raw JSON arguments.
    ///
    /// # Errors
    /// `NotFound` for an unregistered name; `Tool` when the arguments are
    /// not valid JSON; whatever the tool itself returns otherwise.
    pub async fn execute(&self, name: &str, arguments: &str, ctx: &ToolContext) -> Result<String> {
        let tool = self
            .get(name)
            .ok_or_else(|| ConductorError::NotFound(format!("tool '{}'", name)))?;

        let args: Value = serde_json::from_str(arguments)
            .map_err(|e| ConductorError::Tool(format!("invalid arguments for '{}': {}", name, e)))?;

        info!(tool = %name, user_id = %ctx.user_id, "executing tool");
        tool.execute(args, ctx).await
    }

    /// Schemas for every registered tool, sorted by name.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<_> = self.tools.values().map(|t| t.schema()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Schemas for a named subset, in the order given. Unknown names are
    /// skipped with a warning.
    pub fn schemas_for(&self, names: &[String]) -> Vec<ToolSchema> {
        names
            .iter()
            .filter_map(|name| match self.get(name) {
                Some(tool) => Some(tool.schema()),
                None => {
                    warn!(tool = %name, "configured tool is not registered");
                    None
                }
            })
            .collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct UpperTool;

    #[async_trait]
    impl Tool for UpperTool {
        fn name(&self) -> &str {
            "upper"
        }

        fn description(&self) -> &str {
            "Uppercase the input"
        }

        fn parameters(&self) -> Value {
            serde_json::json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            })
        }

        async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<String> {
            let text = args["text"]
                .as_str()
                .ok_or_else(|| ConductorError::Tool("missing 'text'".into()))?;
            Ok(text.to_uppercase())
        }
    }

    fn ctx() -> ToolContext {
        ToolContext::new("u1", "personal", "t1")
    }

    #[tokio::test]
    async fn test_register_and_execute() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(UpperTool));

        let out = registry
            .execute("upper", r#"{"text": "hi"}"#, &ctx())
            .await
            .unwrap();
        assert_eq!(out, "HI");
    }

    #[tokio::test]
    async fn test_unknown_tool_is_not_found() {
        let registry = ToolRegistry::new();
        let err = registry.execute("nope", "{}", &ctx()).await.unwrap_err();
        assert!(matches!(err, ConductorError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_invalid_json_arguments() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(UpperTool));

        let err = registry
            .execute("upper", "not json", &ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, ConductorError::Tool(_)));
    }

    #[tokio::test]
    async fn test_tool_error_propagates() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(UpperTool));

        let err = registry.execute("upper", "{}", &ctx()).await.unwrap_err();
        assert!(err.to_string().contains("missing 'text'"));
    }

    #[test]
    fn test_schemas_for_subset_keeps_order_and_skips_unknown() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(UpperTool));

        let schemas = registry.schemas_for(&["missing".into(), "upper".into()]);
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0].name, "upper");
    }
}
