//! Turn event stream
//!
//! The supervisor projects its state transitions into typed `TurnEvent`s for
//! streaming consumers. Malformed events are skipped with a warning instead
//! of aborting the stream, and final responses that fail a structural sanity
//! check are still emitted, annotated as possibly incomplete. Dropping the
//! receiver cancels the in-flight turn.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Kind of a turn event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// The router selected a worker
    Routing,
    /// A worker invoked a tool
    Tool,
    /// A worker finished its task
    Completion,
    /// The turn's final answer
    FinalResponse,
    /// The turn ended with a typed error
    Error,
}

/// A consumer-facing projection of one supervisor transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnEvent {
    /// What happened
    pub kind: EventKind,
    /// Agent the event concerns ("router" for routing and error events)
    pub agent: String,
    /// Short human-readable description
    pub message: String,
    /// When the transition happened
    pub timestamp: DateTime<Utc>,
    /// Payload content, present on completion and final_response events
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Set when a final response failed the structural sanity check
    #[serde(default)]
    pub possibly_incomplete: bool,
}

impl TurnEvent {
    fn base(kind: EventKind, agent: &str, message: &str) -> Self {
        Self {
            kind,
            agent: agent.to_string(),
            message: message.to_string(),
            timestamp: Utc::now(),
            content: None,
            possibly_incomplete: false,
        }
    }

    /// The router handed control to `agent` with a task description.
    pub fn routing(agent: &str, task: &str) -> Self {
        Self::base(EventKind::Routing, agent, task)
    }

    /// `agent` invoked tool `tool_name`.
    pub fn tool(agent: &str, tool_name: &str) -> Self {
        Self::base(EventKind::Tool, agent, tool_name)
    }

    /// `agent` completed its task with `content`.
    pub fn completion(agent: &str, content: &str) -> Self {
        let mut event = Self::base(EventKind::Completion, agent, "task completed");
        event.content = Some(content.to_string());
        event
    }

    /// The turn's final answer, annotated when the structural check fails.
    pub fn final_response(agent: &str, content: &str) -> Self {
        let mut event = Self::base(EventKind::FinalResponse, agent, "final response");
        event.possibly_incomplete = !has_balanced_markers(content);
        event.content = Some(content.to_string());
        event
    }

    /// The turn ended with a typed error.
    pub fn error(message: &str) -> Self {
        Self::base(EventKind::Error, "router", message)
    }

    /// Structural validity: events missing their required payload are
    /// malformed and get skipped by the sink.
    pub fn is_well_formed(&self) -> bool {
        if self.agent.is_empty() {
            return false;
        }
        match self.kind {
            EventKind::Completion | EventKind::FinalResponse => {
                self.content.as_ref().map(|c| !c.is_empty()).unwrap_or(false)
            }
            EventKind::Tool => !self.message.is_empty(),
            EventKind::Routing | EventKind::Error => true,
        }
    }
}

/// Check that structural markers in formatted output are balanced: an even
/// number of code fences and bold markers.
pub fn has_balanced_markers(content: &str) -> bool {
    content.matches("```").count() % 2 == 0 && content.matches("**").count() % 2 == 0
}

/// Sink the supervisor emits events through.
///
/// In non-streaming turns the sink is disabled and emission is a no-op. In
/// streaming turns a send failure means the consumer dropped the receiver;
/// the sink then trips its cancellation token so the turn stops promptly.
pub(crate) struct EventSink {
    tx: Option<mpsc::Sender<TurnEvent>>,
    cancel: CancellationToken,
}

impl EventSink {
    /// A sink that discards events (non-streaming turns).
    pub fn disabled() -> Self {
        Self {
            tx: None,
            cancel: CancellationToken::new(),
        }
    }

    /// A sink feeding a streaming consumer.
    pub fn streaming(tx: mpsc::Sender<TurnEvent>, cancel: CancellationToken) -> Self {
        Self {
            tx: Some(tx),
            cancel,
        }
    }

    /// Emit an event. Malformed events are skipped with a warning.
    pub async fn emit(&self, event: TurnEvent) {
        if !event.is_well_formed() {
            warn!(kind = ?event.kind, agent = %event.agent, "skipping malformed turn event");
            return;
        }

        if let Some(tx) = &self.tx {
            if tx.send(event).await.is_err() {
                // Consumer went away; stop the turn.
                self.cancel.cancel();
            }
        }
    }

    /// Whether the consumer cancelled the turn.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves when the consumer cancels the turn. In-flight work can race
    /// against this to stop promptly instead of at the next checkpoint.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }
}
