//! Model adapter: the single funnel for backend calls
//!
//! Every component that needs a completion (router, workers, profile
//! updater) goes through `ModelAdapter`. The adapter repairs the message
//! sequence, guards empty assistant bodies, retries transient failures with
//! backoff, and feeds call telemetry to registered observers. Callers never
//! talk to a `ModelBackend` directly.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::conversation::Message;
use crate::error::{ConductorError, Result};

use super::observer::CallObserver;
use super::repair::prepare;
use super::retry::RetryPolicy;
use super::types::{ModelBackend, ModelResponse, ToolSchema};

/// Wraps a [`ModelBackend`] with repair, retry and telemetry.
///
/// The adapter never mutates the caller's messages; repair operates on a
/// copy built for the request payload.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use conductor::model::{ModelAdapter, OpenAiBackend, RetryPolicy};
///
/// let backend = OpenAiBackend::new("https://api.openai.com/v1", "sk-...", "gpt-4o-mini");
/// let adapter = ModelAdapter::new(Arc::new(backend)).with_retry(RetryPolicy::default());
/// ```
pub struct ModelAdapter {
    backend: Arc<dyn ModelBackend>,
    retry: RetryPolicy,
    observers: Vec<Arc<dyn CallObserver>>,
}

impl ModelAdapter {
    /// Create an adapter over a backend with the default retry policy.
    pub fn new(backend: Arc<dyn ModelBackend>) -> Self {
        Self {
            backend,
            retry: RetryPolicy::default(),
            observers: Vec::new(),
        }
    }

    /// Replace the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Register a call observer.
    pub fn with_observer(mut self, observer: Arc<dyn CallObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// The underlying backend name.
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Send a completion request and return the assistant message.
    ///
    /// The input sequence is repaired and guarded before anything leaves the
    /// process. Transient failures are retried per the policy; a terminal
    /// failure or an exhausted budget surfaces as an error.
    pub async fn invoke(&self, messages: &[Message], tools: &[ToolSchema]) -> Result<Message> {
        let prepared = prepare(messages);

        let results_in_payload = prepared.iter().filter(|m| m.is_tool_result()).count();
        for observer in &self.observers {
            observer.on_tool_results(results_in_payload);
        }

        let response = self.complete_with_retry(&prepared, tools).await?;

        if response.has_tool_calls() {
            for observer in &self.observers {
                observer.on_tool_calls(&response.tool_calls);
            }
        }

        Ok(response.into_message())
    }

    /// Blocking variant of [`invoke`](Self::invoke) for synchronous callers.
    ///
    /// Builds a single-threaded runtime for the duration of the call. Must
    /// not be called from within an async context.
    pub fn invoke_blocking(&self, messages: &[Message], tools: &[ToolSchema]) -> Result<Message> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.invoke(messages, tools))
    }

    async fn complete_with_retry(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
    ) -> Result<ModelResponse> {
        let max_attempts = self.retry.max_attempts.max(1);

        for attempt in 0..max_attempts {
            match self
                .backend
                .complete(messages.to_vec(), tools.to_vec())
                .await
            {
                Ok(response) => {
                    if attempt > 0 {
                        debug!(attempt = attempt + 1, "backend call succeeded after retry");
                    }
                    return Ok(response);
                }
                Err(err) if err.is_transient() && attempt + 1 < max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient backend failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) if err.is_transient() => {
                    return Err(ConductorError::RetriesExhausted {
                        attempts: max_attempts,
                        last: err,
                    });
                }
                Err(err) => return Err(err.into()),
            }
        }

        unreachable!("retry loop always returns")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::{Role, ToolCall};
    use crate::error::BackendError;
    use crate::model::observer::ToolCallStats;
    use crate::model::repair::EMPTY_CONTENT_SENTINEL;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Backend that fails `failures` times, then echoes a canned response.
    struct FailThenSucceedBackend {
        failures: u32,
        attempts: AtomicU32,
        error_kind: fn(String) -> BackendError,
        response: ModelResponse,
    }

    impl FailThenSucceedBackend {
        fn new(failures: u32, error_kind: fn(String) -> BackendError) -> Self {
            Self {
                failures,
                attempts: AtomicU32::new(0),
                error_kind,
                response: ModelResponse::text("ok"),
            }
        }
    }

    #[async_trait]
    impl ModelBackend for FailThenSucceedBackend {
        async fn complete(
            &self,
            _messages: Vec<Message>,
            _tools: Vec<ToolSchema>,
        ) -> std::result::Result<ModelResponse, BackendError> {
            let n = self.attempts.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err((self.error_kind)(format!("failure {}", n + 1)))
            } else {
                Ok(self.response.clone())
            }
        }

        fn name(&self) -> &str {
            "fail-then-succeed"
        }
    }

    /// Backend that records the payload it was handed.
    struct RecordingBackend {
        seen: Mutex<Vec<Vec<Message>>>,
        response: ModelResponse,
    }

    impl RecordingBackend {
        fn new(response: ModelResponse) -> Self {
            Self {
                seen: Mutex::new(Vec::new()),
                response,
            }
        }
    }

    #[async_trait]
    impl ModelBackend for RecordingBackend {
        async fn complete(
            &self,
            messages: Vec<Message>,
            _tools: Vec<ToolSchema>,
        ) -> std::result::Result<ModelResponse, BackendError> {
            self.seen.lock().unwrap().push(messages);
            Ok(self.response.clone())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn fast_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, 1, 5)
    }

    #[tokio::test]
    async fn test_succeeds_within_retry_budget() {
        let backend = Arc::new(FailThenSucceedBackend::new(2, BackendError::Overloaded));
        let adapter = ModelAdapter::new(backend.clone()).with_retry(fast_retry(5));

        let msg = adapter.invoke(&[Message::user("hi")], &[]).await.unwrap();
        assert_eq!(msg.content, "ok");
        assert_eq!(backend.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausts_budget_after_exact_attempt_count() {
        let backend = Arc::new(FailThenSucceedBackend::new(100, BackendError::RateLimit));
        let adapter = ModelAdapter::new(backend.clone()).with_retry(fast_retry(5));

        let err = adapter.invoke(&[Message::user("hi")], &[]).await.unwrap_err();
        assert!(matches!(
            err,
            ConductorError::RetriesExhausted { attempts: 5, .. }
        ));
        assert_eq!(backend.attempts.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_terminal_error_not_retried() {
        let backend = Arc::new(FailThenSucceedBackend::new(100, BackendError::Auth));
        let adapter = ModelAdapter::new(backend.clone()).with_retry(fast_retry(5));

        let err = adapter.invoke(&[Message::user("hi")], &[]).await.unwrap_err();
        assert!(matches!(
            err,
            ConductorError::Backend(BackendError::Auth(_))
        ));
        assert_eq!(backend.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_payload_is_repaired_before_sending() {
        let backend = Arc::new(RecordingBackend::new(ModelResponse::text("ok")));
        let adapter = ModelAdapter::new(backend.clone());

        let history = vec![
            Message::user("q"),
            Message::tool_result("orphan", "stale"),
            Message::assistant(""),
            Message::assistant("done"),
        ];
        adapter.invoke(&history, &[]).await.unwrap();

        let seen = backend.seen.lock().unwrap();
        let payload = &seen[0];
        assert!(payload.iter().all(|m| m.role != Role::Tool));
        assert_eq!(payload[1].content, EMPTY_CONTENT_SENTINEL);
        // The caller's history is untouched.
        assert_eq!(history[2].content, "");
    }

    #[tokio::test]
    async fn test_observer_sees_calls_and_results() {
        let response = ModelResponse::with_tools(
            "",
            vec![
                ToolCall::new("c1", "search_tasks", "{}"),
                ToolCall::new("c2", "current_datetime", "{}"),
            ],
        );
        let backend = Arc::new(RecordingBackend::new(response));
        let stats = Arc::new(ToolCallStats::new());
        let adapter = ModelAdapter::new(backend).with_observer(stats.clone());

        let history = vec![
            Message::assistant_with_tools("", vec![ToolCall::new("c0", "echo", "{}")]),
            Message::tool_result("c0", "prev"),
            Message::user("again"),
        ];
        adapter.invoke(&history, &[]).await.unwrap();

        let snap = stats.snapshot();
        assert_eq!(snap.get("search_tasks"), Some(&1));
        assert_eq!(snap.get("current_datetime"), Some(&1));
        assert_eq!(stats.results_seen(), 1);
    }

    #[test]
    fn test_invoke_blocking() {
        let backend = Arc::new(RecordingBackend::new(ModelResponse::text("sync ok")));
        let adapter = ModelAdapter::new(backend);

        let msg = adapter
            .invoke_blocking(&[Message::user("hi")], &[])
            .unwrap();
        assert_eq!(msg.content, "sync ok");
    }
}
