//! Handoff mechanism
//!
//! Control transfers between agents are realized as tool calls named
//! `handoff_to_<target>` carrying a task description. Applying a handoff
//! synthesizes an immediate tool-result acknowledgement (so the pairing
//! invariant holds without special cases in repair) and overwrites the
//! conversation's `active_agent`/`task_description`. Repeated application is
//! idempotent: no accumulation, the last handoff wins.

use serde::Deserialize;

use crate::conversation::{ConversationState, Message, ToolCall};
use crate::model::ToolSchema;

/// Prefix shared by every handoff tool name.
pub const HANDOFF_PREFIX: &str = "handoff_to_";

/// Name of the terminal routing tool.
pub const FINISH_TOOL: &str = "finish_turn";

/// Terminal sentinel accepted in a plain-text routing response.
pub const FINISH_SENTINEL: &str = "FINISH";

/// A control transfer from `caller` to `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffRecord {
    /// Worker receiving control
    pub target: String,
    /// Task handed to the target
    pub task_description: String,
    /// Agent that issued the handoff
    pub caller: String,
}

#[derive(Deserialize)]
struct HandoffArgs {
    #[serde(default)]
    task_description: String,
}

impl HandoffRecord {
    /// Parse a tool call into a handoff record, if it is one.
    ///
    /// Unparseable arguments degrade to an empty task description; the
    /// target worker still receives control.
    pub fn parse(call: &ToolCall, caller: &str) -> Option<Self> {
        let target = call.name.strip_prefix(HANDOFF_PREFIX)?;
        if target.is_empty() {
            return None;
        }

        let task_description = call
            .parse_arguments::<HandoffArgs>()
            .map(|a| a.task_description)
            .unwrap_or_default();

        Some(Self {
            target: target.to_string(),
            task_description,
            caller: caller.to_string(),
        })
    }

    /// Apply this handoff to the conversation: append the acknowledgement
    /// answering `call_id` and overwrite the routing metadata.
    pub fn apply(&self, state: &mut ConversationState, call_id: &str) {
        state.append(Message::tool_result(
            call_id,
            &format!("Transferring to {}.", self.target),
        ));
        state.active_agent = Some(self.target.clone());
        state.task_description = Some(self.task_description.clone());
    }
}

/// Whether a tool call is the terminal routing decision.
pub fn is_finish(call: &ToolCall) -> bool {
    call.name == FINISH_TOOL
}

/// Schema of the handoff tool for one worker.
pub fn handoff_schema(worker: &str, worker_description: &str) -> ToolSchema {
    ToolSchema::new(
        &format!("{}{}", HANDOFF_PREFIX, worker),
        &format!("Hand control to the {} worker. {}", worker, worker_description),
        serde_json::json!({
            "type": "object",
            "properties": {
                "task_description": {
                    "type": "string",
                    "description": "What the worker should do"
                }
            },
            "required": ["task_description"]
        }),
    )
}

/// Schema of the terminal routing tool.
pub fn finish_schema() -> ToolSchema {
    ToolSchema::new(
        FINISH_TOOL,
        "End the turn. Call this only after the formatted final response has \
         been produced.",
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        }),
    )
}
