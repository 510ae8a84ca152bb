//! Worker agent
//!
//! A worker is a parameterized, bounded tool-execution loop: call the model
//! with the history and this worker's tool schemas, execute whatever tools it
//! requests, feed the results back, repeat. The loop ends when the model
//! answers with plain content (the worker's result), hands off to another
//! worker, or hits the round cap.
//!
//! Tool failures never abort the loop; they come back to the model as
//! in-band error results so it can retry or report them. Tool calls within
//! one round run concurrently, but their results are appended in the
//! original call order, and the whole round lands atomically or not at all.

use futures::future::join_all;
use tracing::{debug, warn};

use crate::conversation::{ConversationState, Message};
use crate::error::{ConductorError, Result};
use crate::model::{ModelAdapter, ToolSchema};
use crate::tools::{ToolContext, ToolRegistry};

use super::events::{EventSink, TurnEvent};
use super::handoff::{handoff_schema, HandoffRecord};

/// How a worker's run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// The worker produced its result
    Completed(String),
    /// The worker handed control to another worker
    Handoff(HandoffRecord),
}

/// A specialized, tool-using executor.
#[derive(Debug, Clone)]
pub struct Worker {
    /// Identity this worker's messages are attributed to
    pub name: String,
    /// One-line description shown to the router
    pub description: String,
    /// System prompt template; `{task}` is replaced by the task description
    pub prompt: String,
    /// Names of registry tools this worker may call
    pub tool_names: Vec<String>,
    /// Workers this one may hand off to directly: (name, description)
    handoff_targets: Vec<(String, String)>,
}

impl Worker {
    /// Create a worker with a name, router-facing description and prompt
    /// template.
    pub fn new(name: &str, description: &str, prompt: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            prompt: prompt.to_string(),
            tool_names: Vec::new(),
            handoff_targets: Vec::new(),
        }
    }

    /// Grant access to a registry tool.
    pub fn with_tool(mut self, name: &str) -> Self {
        self.tool_names.push(name.to_string());
        self
    }

    /// Allow this worker to hand off directly to another worker.
    pub fn with_handoff_to(mut self, name: &str, description: &str) -> Self {
        self.handoff_targets
            .push((name.to_string(), description.to_string()));
        self
    }

    fn schemas(&self, registry: &ToolRegistry) -> Vec<ToolSchema> {
        let mut schemas = registry.schemas_for(&self.tool_names);
        for (target, description) in &self.handoff_targets {
            schemas.push(handoff_schema(target, description));
        }
        schemas
    }

    fn render_prompt(&self, state: &ConversationState) -> String {
        let task = state.task_description.as_deref().unwrap_or("");
        self.prompt.replace("{task}", task)
    }

    /// Run the bounded tool loop.
    ///
    /// # Errors
    /// `WorkerRoundCap` when the model keeps requesting tools past
    /// `max_rounds`; `Cancelled` when the consumer closed the stream; adapter
    /// errors otherwise. Cancellation races the model call and the tool
    /// round, so in-flight work stops promptly and nothing is appended for a
    /// round that was cancelled mid-flight.
    pub(crate) async fn run(
        &self,
        adapter: &ModelAdapter,
        registry: &ToolRegistry,
        state: &mut ConversationState,
        ctx: &ToolContext,
        sink: &EventSink,
        max_rounds: u32,
    ) -> Result<WorkerOutcome> {
        let schemas = self.schemas(registry);
        let prompt = self.render_prompt(state);

        for round in 0..max_rounds {
            if sink.is_cancelled() {
                return Err(ConductorError::Cancelled);
            }

            let mut messages = Vec::with_capacity(state.len() + 1);
            messages.push(Message::system(&prompt));
            messages.extend(state.messages.iter().cloned());

            let response = tokio::select! {
                result = adapter.invoke(&messages, &schemas) => result?,
                () = sink.cancelled() => return Err(ConductorError::Cancelled),
            };
            let response = response.with_author(&self.name);

            if !response.has_tool_calls() {
                if sink.is_cancelled() {
                    return Err(ConductorError::Cancelled);
                }
                let content = response.content.clone();
                debug!(worker = %self.name, round, "worker completed");
                state.append(response);
                return Ok(WorkerOutcome::Completed(content));
            }
            let calls = response.tool_calls.clone().unwrap_or_default();

            // A handoff ends this worker's run; control goes back up.
            if let Some((call_id, record)) = calls
                .iter()
                .find_map(|c| HandoffRecord::parse(c, &self.name).map(|r| (c.id.clone(), r)))
            {
                if sink.is_cancelled() {
                    return Err(ConductorError::Cancelled);
                }
                state.append(response);
                record.apply(state, &call_id);
                return Ok(WorkerOutcome::Handoff(record));
            }

            for call in &calls {
                sink.emit(TurnEvent::tool(&self.name, &call.name)).await;
            }
            // Emitting to a dropped receiver trips the token; nothing may
            // execute after that.
            if sink.is_cancelled() {
                return Err(ConductorError::Cancelled);
            }

            // Execute concurrently; join_all keeps the original call order.
            let executions = calls.iter().map(|call| {
                let registry = &registry;
                async move {
                    match registry.execute(&call.name, &call.arguments, ctx).await {
                        Ok(output) => output,
                        Err(err) => {
                            warn!(
                                worker = %self.name,
                                tool = %call.name,
                                error = %err,
                                "tool execution failed, feeding error back"
                            );
                            serde_json::json!({ "error": err.to_string() }).to_string()
                        }
                    }
                }
            });
            let outputs = tokio::select! {
                outputs = join_all(executions) => outputs,
                () = sink.cancelled() => return Err(ConductorError::Cancelled),
            };

            if sink.is_cancelled() {
                return Err(ConductorError::Cancelled);
            }

            let mut round_messages = Vec::with_capacity(calls.len() + 1);
            round_messages.push(response);
            for (call, output) in calls.iter().zip(outputs) {
                round_messages.push(Message::tool_result(&call.id, &output));
            }
            state.append_round(round_messages);
        }

        Err(ConductorError::WorkerRoundCap {
            worker: self.name.clone(),
            cap: max_rounds,
        })
    }
}
