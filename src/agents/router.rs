//! Router / supervisor
//!
//! The supervisor owns one conversation turn end to end: ROUTING asks the
//! model which worker runs next (a handoff tool call) or whether the turn is
//! done (`finish_turn`); RUNNING executes that worker's tool loop; DONE takes
//! the most recent non-empty content as the turn's result. Two hard bounds
//! guarantee termination against a confused model: a cap on routing
//! decisions per turn and a cap on rounds per worker run.
//!
//! Exactly one designated formatter worker produces the final presentation.
//! That is enforced structurally: a terminal decision is accepted only if
//! the formatter authored the most recent non-empty content, otherwise the
//! decision is overridden into a formatter run.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::conversation::{ConversationState, Message, SessionStore};
use crate::error::{ConductorError, Result};
use crate::model::{ModelAdapter, ToolCallStats, ToolSchema};
use crate::profile::{ProfileNamespace, ProfileUpdater};
use crate::tools::{ToolContext, ToolRegistry};

use super::events::{EventSink, TurnEvent};
use super::handoff::{
    finish_schema, handoff_schema, is_finish, HandoffRecord, FINISH_SENTINEL,
};
use super::worker::{Worker, WorkerOutcome};

/// Identity routing messages are attributed to.
pub const ROUTER: &str = "router";

/// One incoming user message plus the identity scope it runs under.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    /// End user the turn is for
    pub user_id: String,
    /// Deployment category
    pub category: String,
    /// Conversation thread id
    pub thread_id: String,
    /// The user's message
    pub text: String,
}

impl TurnRequest {
    /// Create a request.
    pub fn new(user_id: &str, category: &str, thread_id: &str, text: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            category: category.to_string(),
            thread_id: thread_id.to_string(),
            text: text.to_string(),
        }
    }
}

enum RoutingOutcome {
    Handoff(HandoffRecord),
    Finish,
}

/// The top-level state machine driving turns.
pub struct Supervisor {
    adapter: Arc<ModelAdapter>,
    registry: ToolRegistry,
    workers: Vec<Worker>,
    formatter: String,
    session_store: Arc<dyn SessionStore>,
    profile_updater: Option<Arc<ProfileUpdater>>,
    stats: Option<Arc<ToolCallStats>>,
    max_routing_decisions: u32,
    max_worker_rounds: u32,
    thread_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Supervisor {
    /// Create a supervisor. `formatter` names the worker responsible for
    /// final presentation; it must be added via [`with_worker`](Self::with_worker).
    pub fn new(
        adapter: Arc<ModelAdapter>,
        registry: ToolRegistry,
        session_store: Arc<dyn SessionStore>,
        formatter: &str,
    ) -> Self {
        Self {
            adapter,
            registry,
            workers: Vec::new(),
            formatter: formatter.to_string(),
            session_store,
            profile_updater: None,
            stats: None,
            max_routing_decisions: 8,
            max_worker_rounds: 6,
            thread_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Add a worker the router can select.
    pub fn with_worker(mut self, worker: Worker) -> Self {
        self.workers.push(worker);
        self
    }

    /// Attach the background profile updater.
    pub fn with_profile_updater(mut self, updater: Arc<ProfileUpdater>) -> Self {
        self.profile_updater = Some(updater);
        self
    }

    /// Attach per-turn tool-call counters. The same instance should be
    /// registered as an observer on the adapter; the supervisor only resets
    /// it at turn start.
    pub fn with_stats(mut self, stats: Arc<ToolCallStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Set the turn and worker-round caps.
    pub fn with_limits(mut self, max_routing_decisions: u32, max_worker_rounds: u32) -> Self {
        self.max_routing_decisions = max_routing_decisions;
        self.max_worker_rounds = max_worker_rounds;
        self
    }

    /// Run one turn to completion and return the final answer.
    pub async fn run_turn(&self, request: TurnRequest) -> Result<String> {
        let (content, extraction) = self.execute_turn(request, &EventSink::disabled()).await?;
        if let (Some(updater), Some((ns, transcript))) = (&self.profile_updater, extraction) {
            updater.spawn_update(ns, transcript);
        }
        Ok(content)
    }

    /// Run one turn, streaming events to the returned receiver.
    ///
    /// Dropping the receiver cancels the in-flight turn: tool execution
    /// stops promptly and no partially appended round is persisted.
    pub fn run_turn_stream(self: &Arc<Self>, request: TurnRequest) -> mpsc::Receiver<TurnEvent> {
        let (tx, rx) = mpsc::channel(32);
        let cancel = CancellationToken::new();
        let supervisor = self.clone();

        tokio::spawn(async move {
            let sink = EventSink::streaming(tx, cancel);
            match supervisor.execute_turn(request, &sink).await {
                Ok((_, extraction)) => {
                    if let (Some(updater), Some((ns, transcript))) =
                        (&supervisor.profile_updater, extraction)
                    {
                        updater.spawn_update(ns, transcript);
                    }
                }
                Err(ConductorError::Cancelled) => {
                    debug!("streaming turn cancelled by consumer");
                }
                Err(err) => {
                    sink.emit(TurnEvent::error(&err.to_string())).await;
                }
            }
        });

        rx
    }

    /// Blocking wrapper for synchronous callers. Profile extraction runs
    /// inline before returning. Must not be called from an async context.
    pub fn run_turn_blocking(&self, request: TurnRequest) -> Result<String> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(async {
            let (content, extraction) =
                self.execute_turn(request, &EventSink::disabled()).await?;
            if let (Some(updater), Some((ns, transcript))) = (&self.profile_updater, extraction) {
                if let Err(err) = updater.update(&ns, &transcript).await {
                    warn!(error = %err, "profile update failed");
                }
            }
            Ok(content)
        })
    }

    async fn execute_turn(
        &self,
        request: TurnRequest,
        sink: &EventSink,
    ) -> Result<(String, Option<(ProfileNamespace, Vec<Message>)>)> {
        let lock = self.thread_lock(&request.thread_id).await;
        let _guard = lock.lock().await;

        let span = info_span!(
            "turn",
            request_id = %Uuid::new_v4(),
            thread_id = %request.thread_id,
            user_id = %request.user_id,
        );

        async move {
            if let Some(stats) = &self.stats {
                stats.reset();
            }

            let mut state = self
                .session_store
                .load(&request.thread_id)
                .await?
                .unwrap_or_else(|| ConversationState::new(&request.thread_id));
            state.begin_turn();
            let turn_start = state.len();
            state.append(Message::user(&request.text));

            let ctx = ToolContext::new(&request.user_id, &request.category, &request.thread_id);
            let outcome = self.routing_loop(&mut state, &ctx, sink).await;

            match outcome {
                Ok(content) => {
                    state.terminal = true;
                    self.session_store.save(&state).await?;
                    info!(messages = state.len(), "turn complete");
                    sink.emit(TurnEvent::final_response(&self.formatter, &content))
                        .await;

                    let ns =
                        ProfileNamespace::new("user_profile", &request.category, &request.user_id);
                    let transcript =
                        state.messages[turn_start..state.len().saturating_sub(1)].to_vec();
                    Ok((content, Some((ns, transcript))))
                }
                Err(ConductorError::Cancelled) => Err(ConductorError::Cancelled),
                Err(err) => {
                    // Keep what the turn appended so far; the error itself
                    // is the caller's to surface.
                    if let Err(save_err) = self.session_store.save(&state).await {
                        warn!(error = %save_err, "failed to save state after turn error");
                    }
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn routing_loop(
        &self,
        state: &mut ConversationState,
        ctx: &ToolContext,
        sink: &EventSink,
    ) -> Result<String> {
        let routing_schemas = self.routing_schemas();
        let routing_prompt = self.routing_prompt();
        let mut pending: Option<HandoffRecord> = None;

        for decision in 0..self.max_routing_decisions {
            if sink.is_cancelled() {
                return Err(ConductorError::Cancelled);
            }

            let record = match pending.take() {
                Some(record) => record,
                None => {
                    let outcome = tokio::select! {
                        outcome = self.route(state, &routing_prompt, &routing_schemas) => outcome?,
                        () = sink.cancelled() => return Err(ConductorError::Cancelled),
                    };
                    match outcome {
                        RoutingOutcome::Handoff(record) => record,
                        RoutingOutcome::Finish => {
                            if let Some(content) = self.converged_result(state) {
                                return Ok(content);
                            }
                            // Premature terminal decision: the formatter has
                            // not produced the latest content yet, so force
                            // it to.
                            debug!(decision, "terminal decision overridden into formatter run");
                            let record = HandoffRecord {
                                target: self.formatter.clone(),
                                task_description:
                                    "Produce the final, formatted reply for the user.".to_string(),
                                caller: ROUTER.to_string(),
                            };
                            state.active_agent = Some(record.target.clone());
                            state.task_description = Some(record.task_description.clone());
                            record
                        }
                    }
                }
            };

            let worker = self.worker(&record.target).ok_or_else(|| {
                ConductorError::RoutingDecision(format!("unknown worker '{}'", record.target))
            })?;

            sink.emit(TurnEvent::routing(&record.target, &record.task_description))
                .await;
            info!(worker = %record.target, decision, "routing to worker");

            let outcome = worker
                .run(
                    &self.adapter,
                    &self.registry,
                    state,
                    ctx,
                    sink,
                    self.max_worker_rounds,
                )
                .await?;

            match outcome {
                WorkerOutcome::Completed(content) => {
                    // The formatter's completion is projected as the final
                    // response, not as an intermediate completion event.
                    if worker.name != self.formatter && !content.is_empty() {
                        sink.emit(TurnEvent::completion(&worker.name, &content)).await;
                    }
                }
                WorkerOutcome::Handoff(record) => {
                    pending = Some(record);
                }
            }
        }

        Err(ConductorError::TurnCap {
            cap: self.max_routing_decisions,
        })
    }

    /// Ask the model for the next routing decision and apply it to the log.
    async fn route(
        &self,
        state: &mut ConversationState,
        prompt: &str,
        schemas: &[ToolSchema],
    ) -> Result<RoutingOutcome> {
        let mut messages = Vec::with_capacity(state.len() + 1);
        messages.push(Message::system(prompt));
        messages.extend(state.messages.iter().cloned());

        let response = self.adapter.invoke(&messages, schemas).await?;

        let calls = response.tool_calls.clone().unwrap_or_default();
        if !calls.is_empty() {
            if calls.iter().any(is_finish) {
                // The terminal decision leaves no trace in the log.
                return Ok(RoutingOutcome::Finish);
            }
            if let Some((call_id, record)) = calls
                .iter()
                .find_map(|c| HandoffRecord::parse(c, ROUTER).map(|r| (c.id.clone(), r)))
            {
                state.append(response.with_author(ROUTER));
                record.apply(state, &call_id);
                return Ok(RoutingOutcome::Handoff(record));
            }
            return Err(ConductorError::RoutingDecision(format!(
                "unexpected tool call '{}'",
                calls[0].name
            )));
        }

        if response.content.trim() == FINISH_SENTINEL {
            return Ok(RoutingOutcome::Finish);
        }

        Err(ConductorError::RoutingDecision(response.content))
    }

    /// The turn's result, if the formatter authored the most recent
    /// non-empty content.
    fn converged_result(&self, state: &ConversationState) -> Option<String> {
        state
            .last_content()
            .filter(|m| m.author.as_deref() == Some(self.formatter.as_str()))
            .map(|m| m.content.clone())
    }

    fn worker(&self, name: &str) -> Option<&Worker> {
        self.workers.iter().find(|w| w.name == name)
    }

    fn routing_schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<_> = self
            .workers
            .iter()
            .map(|w| handoff_schema(&w.name, &w.description))
            .collect();
        schemas.push(finish_schema());
        schemas
    }

    fn routing_prompt(&self) -> String {
        let roster = self
            .workers
            .iter()
            .map(|w| format!("- {}: {}", w.name, w.description))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "You are the router of a multi-agent assistant. Read the conversation \
             and decide what happens next by calling exactly one tool.\n\n\
             Workers:\n{}\n\n\
             Hand each sub-task to the right worker with a clear task description. \
             When the answer is ready, hand off to '{}' to produce the final reply, \
             and only after that reply call {}.",
            roster,
            self.formatter,
            super::handoff::FINISH_TOOL,
        )
    }

    async fn thread_lock(&self, thread_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.thread_locks.lock().await;
        locks
            .entry(thread_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
