//! Scripted backend for tests and offline runs
//!
//! `ScriptedBackend` replays a fixed queue of responses and records every
//! payload it receives, so orchestration behavior can be exercised without a
//! live endpoint.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::conversation::Message;
use crate::error::BackendError;

use super::types::{ModelBackend, ModelResponse, ToolSchema};

type Scripted = std::result::Result<ModelResponse, BackendError>;

/// Backend that replays a scripted sequence of responses.
///
/// Each `complete` call pops the next entry; an exhausted script answers
/// with a fixed fallback message so tests fail loudly on extra calls.
#[derive(Default)]
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedBackend {
    /// Create a backend with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response.
    pub fn push(&self, response: ModelResponse) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Ok(response));
        }
    }

    /// Queue a failure.
    pub fn push_error(&self, error: BackendError) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Err(error));
        }
    }

    /// Number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// The message payload of request `index`.
    pub fn request(&self, index: usize) -> Option<Vec<Message>> {
        self.requests.lock().ok().and_then(|r| r.get(index).cloned())
    }
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    async fn complete(
        &self,
        messages: Vec<Message>,
        _tools: Vec<ToolSchema>,
    ) -> std::result::Result<ModelResponse, BackendError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(messages);
        }

        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match next {
            Some(result) => result,
            None => Ok(ModelResponse::text("(script exhausted)")),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replays_in_order() {
        let backend = ScriptedBackend::new();
        backend.push(ModelResponse::text("first"));
        backend.push(ModelResponse::text("second"));

        let r1 = backend.complete(vec![], vec![]).await.unwrap();
        let r2 = backend.complete(vec![], vec![]).await.unwrap();
        assert_eq!(r1.content, "first");
        assert_eq!(r2.content, "second");
    }

    #[tokio::test]
    async fn test_records_requests() {
        let backend = ScriptedBackend::new();
        backend.push(ModelResponse::text("ok"));

        backend
            .complete(vec![Message::user("hello")], vec![])
            .await
            .unwrap();

        assert_eq!(backend.request_count(), 1);
        assert_eq!(backend.request(0).unwrap()[0].content, "hello");
    }

    #[tokio::test]
    async fn test_exhausted_script_answers_with_fallback() {
        let backend = ScriptedBackend::new();
        let r = backend.complete(vec![], vec![]).await.unwrap();
        assert_eq!(r.content, "(script exhausted)");
    }

    #[tokio::test]
    async fn test_scripted_error() {
        let backend = ScriptedBackend::new();
        backend.push_error(BackendError::Overloaded("busy".into()));

        let err = backend.complete(vec![], vec![]).await.unwrap_err();
        assert!(matches!(err, BackendError::Overloaded(_)));
    }
}
