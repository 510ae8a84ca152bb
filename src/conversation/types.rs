//! Conversation types for Conductor
//!
//! This module defines the core types for conversation state, including
//! messages, roles, tool calls, and the per-thread routing metadata the
//! supervisor owns during a turn.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompts and instructions
    System,
    /// Messages from the user
    User,
    /// Messages from the model (possibly carrying tool calls)
    Assistant,
    /// Results from tool executions
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// A tool call issued by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolCall {
    /// Unique identifier for this tool call
    pub id: String,
    /// Name of the tool to call
    pub name: String,
    /// JSON-encoded arguments for the tool
    pub arguments: String,
}

impl ToolCall {
    /// Create a new tool call.
    ///
    /// # Example
    /// ```
    /// use conductor::conversation::ToolCall;
    ///
    /// let call = ToolCall::new("call_123", "calendar_list_events", r#"{"day": "tomorrow"}"#);
    /// assert_eq!(call.name, "calendar_list_events");
    /// ```
    pub fn new(id: &str, name: &str, arguments: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    /// Parse the arguments as a specific type.
    pub fn parse_arguments<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.arguments)
    }
}

/// A single message in a conversation log.
///
/// Messages come from users, the model, or tool executions. Assistant
/// messages may carry tool calls; tool messages answer exactly one of them
/// through `tool_call_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// The role of the message sender
    pub role: Role,
    /// The text content of the message
    pub content: String,
    /// Tool calls issued by the model (assistant messages only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// ID of the tool call this message answers (tool messages only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Identity of the worker that produced this message, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

impl Message {
    /// Create a new user message.
    pub fn user(content: &str) -> Self {
        Self {
            role: Role::User,
            content: content.to_string(),
            tool_calls: None,
            tool_call_id: None,
            author: None,
        }
    }

    /// Create a new assistant message.
    pub fn assistant(content: &str) -> Self {
        Self {
            role: Role::Assistant,
            content: content.to_string(),
            tool_calls: None,
            tool_call_id: None,
            author: None,
        }
    }

    /// Create a new system message.
    pub fn system(content: &str) -> Self {
        Self {
            role: Role::System,
            content: content.to_string(),
            tool_calls: None,
            tool_call_id: None,
            author: None,
        }
    }

    /// Create a new tool result message answering `tool_call_id`.
    ///
    /// # Example
    /// ```
    /// use conductor::conversation::{Message, Role};
    ///
    /// let msg = Message::tool_result("call_123", "3 events found");
    /// assert_eq!(msg.role, Role::Tool);
    /// assert_eq!(msg.tool_call_id.as_deref(), Some("call_123"));
    /// ```
    pub fn tool_result(tool_call_id: &str, content: &str) -> Self {
        Self {
            role: Role::Tool,
            content: content.to_string(),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.to_string()),
            author: None,
        }
    }

    /// Create an assistant message carrying tool calls.
    pub fn assistant_with_tools(content: &str, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.to_string(),
            tool_calls: Some(tool_calls),
            tool_call_id: None,
            author: None,
        }
    }

    /// Attribute this message to a worker identity.
    pub fn with_author(mut self, author: &str) -> Self {
        self.author = Some(author.to_string());
        self
    }

    /// Check if this message carries tool calls.
    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls
            .as_ref()
            .map(|tc| !tc.is_empty())
            .unwrap_or(false)
    }

    /// Check if this is a tool result message.
    pub fn is_tool_result(&self) -> bool {
        self.role == Role::Tool && self.tool_call_id.is_some()
    }
}

/// Conversation state for one session thread.
///
/// The append-only message log plus the routing metadata the supervisor owns
/// for the duration of a turn. Workers append to the log and update
/// `active_agent`/`task_description` through handoffs or their own
/// completion; history is never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationState {
    /// Thread identifier this state belongs to
    pub thread_id: String,
    /// Ordered message log
    pub messages: Vec<Message>,
    /// Worker currently holding control, if any
    pub active_agent: Option<String>,
    /// Task description handed to the active worker
    pub task_description: Option<String>,
    /// Whether the current turn reached its terminal state
    pub terminal: bool,
    /// When this state was created
    pub created_at: DateTime<Utc>,
    /// When this state was last modified
    pub updated_at: DateTime<Utc>,
}

impl ConversationState {
    /// Create a new empty conversation state for a thread.
    pub fn new(thread_id: &str) -> Self {
        let now = Utc::now();
        Self {
            thread_id: thread_id.to_string(),
            messages: Vec::new(),
            active_agent: None,
            task_description: None,
            terminal: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a message to the log.
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
        self.updated_at = Utc::now();
    }

    /// Append a whole batch of messages as one unit.
    ///
    /// Worker rounds use this so a round lands in the log atomically —
    /// either every message of the round is present or none is.
    pub fn append_round(&mut self, round: Vec<Message>) {
        self.messages.extend(round);
        self.updated_at = Utc::now();
    }

    /// The most recent message with non-empty content, if any.
    ///
    /// This is the turn's result once the router terminates.
    pub fn last_content(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| !m.content.is_empty())
    }

    /// Number of messages in the log.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if the log is empty.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Reset per-turn routing metadata before a new turn starts.
    pub fn begin_turn(&mut self) {
        self.active_agent = None;
        self.task_description = None;
        self.terminal = false;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello");
        assert!(msg.tool_calls.is_none());
        assert!(msg.tool_call_id.is_none());
        assert!(msg.author.is_none());

        let msg = Message::assistant("Hi there");
        assert_eq!(msg.role, Role::Assistant);

        let msg = Message::system("You are the router");
        assert_eq!(msg.role, Role::System);
    }

    #[test]
    fn test_tool_result_message() {
        let msg = Message::tool_result("call_123", "done");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id, Some("call_123".to_string()));
        assert!(msg.is_tool_result());
    }

    #[test]
    fn test_assistant_with_tools() {
        let call = ToolCall::new("call_1", "search_tasks", r#"{"query": "due"}"#);
        let msg = Message::assistant_with_tools("", vec![call]);
        assert!(msg.has_tool_calls());
        assert_eq!(msg.tool_calls.as_ref().unwrap()[0].name, "search_tasks");
    }

    #[test]
    fn test_with_author() {
        let msg = Message::assistant("formatted").with_author("formatter");
        assert_eq!(msg.author.as_deref(), Some("formatter"));
    }

    #[test]
    fn test_tool_call_parse_arguments() {
        #[derive(Deserialize)]
        struct Args {
            query: String,
        }

        let call = ToolCall::new("call_1", "search_tasks", r#"{"query": "overdue"}"#);
        let args: Args = call.parse_arguments().unwrap();
        assert_eq!(args.query, "overdue");
    }

    #[test]
    fn test_state_new_and_append() {
        let mut state = ConversationState::new("thread-1");
        assert!(state.is_empty());
        assert!(!state.terminal);

        state.append(Message::user("What's due tomorrow?"));
        assert_eq!(state.len(), 1);
        assert!(state.created_at <= state.updated_at);
    }

    #[test]
    fn test_append_round_is_one_unit() {
        let mut state = ConversationState::new("t");
        let round = vec![
            Message::assistant_with_tools("", vec![ToolCall::new("c1", "echo", "{}")]),
            Message::tool_result("c1", "ok"),
        ];
        state.append_round(round);
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn test_last_content_skips_empty() {
        let mut state = ConversationState::new("t");
        state.append(Message::user("hi"));
        state.append(Message::assistant("answer").with_author("formatter"));
        state.append(Message::assistant_with_tools(
            "",
            vec![ToolCall::new("c1", "noop", "{}")],
        ));

        let last = state.last_content().unwrap();
        assert_eq!(last.content, "answer");
        assert_eq!(last.author.as_deref(), Some("formatter"));
    }

    #[test]
    fn test_begin_turn_resets_routing_metadata() {
        let mut state = ConversationState::new("t");
        state.active_agent = Some("tracker".into());
        state.task_description = Some("look things up".into());
        state.terminal = true;

        state.begin_turn();

        assert!(state.active_agent.is_none());
        assert!(state.task_description.is_none());
        assert!(!state.terminal);
    }

    #[test]
    fn test_message_serialization_skips_none() {
        let msg = Message::user("Hello");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("tool_calls"));
        assert!(!json.contains("tool_call_id"));
        assert!(!json.contains("author"));
    }

    #[test]
    fn test_state_serialization_roundtrip() {
        let mut state = ConversationState::new("thread-9");
        state.append(Message::user("Hello"));
        state.append(Message::assistant("Hi!").with_author("formatter"));

        let json = serde_json::to_string(&state).unwrap();
        let parsed: ConversationState = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.thread_id, "thread-9");
        assert_eq!(parsed.messages.len(), 2);
        assert_eq!(parsed.messages[1].author.as_deref(), Some("formatter"));
    }
}
