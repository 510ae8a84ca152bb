//! Current date/time tool
//!
//! Workers have no clock of their own; anything involving "today" or
//! "tomorrow" starts with this tool.

use async_trait::async_trait;
use chrono::Local;
use serde_json::Value;

use crate::error::Result;

use super::types::{Tool, ToolContext};

/// Tool returning the current local date and time.
pub struct DateTimeTool;

#[async_trait]
impl Tool for DateTimeTool {
    fn name(&self) -> &str {
        "current_datetime"
    }

    fn description(&self) -> &str {
        "Get the current local date and time, including the weekday. \
         Use this before interpreting relative dates like 'today' or 'tomorrow'."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<String> {
        let now = Local::now();
        Ok(serde_json::json!({
            "datetime": now.to_rfc3339(),
            "date": now.format("%Y-%m-%d").to_string(),
            "time": now.format("%H:%M").to_string(),
            "weekday": now.format("%A").to_string(),
        })
        .to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_datetime_tool_returns_structured_json() {
        let tool = DateTimeTool;
        let ctx = ToolContext::new("u1", "personal", "t1");
        let out = tool.execute(serde_json::json!({}), &ctx).await.unwrap();

        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert!(parsed["date"].as_str().unwrap().len() == 10);
        assert!(parsed["weekday"].as_str().is_some());
    }
}
