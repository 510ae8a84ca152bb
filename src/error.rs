//! Error types for Conductor
//!
//! This module defines all error types used throughout the orchestration core.
//! Uses `thiserror` for ergonomic error handling with automatic `Display` and
//! `Error` trait implementations.

use std::fmt;
use thiserror::Error;

// ============================================================================
// Backend Error Classification
// ============================================================================

/// Structured classification of LLM backend failures.
///
/// Provides fine-grained categorization of backend HTTP errors, enabling
/// retry decisions in the adapter without string matching at call sites.
#[derive(Debug)]
pub enum BackendError {
    /// 401/403 — Invalid API key or authentication failure
    Auth(String),
    /// 429 — Rate limit or quota exceeded
    RateLimit(String),
    /// Backend is overloaded (e.g. `overloaded_error` bodies) — retry with backoff
    Overloaded(String),
    /// 500/502/503/504 — Server-side errors
    ServerError(String),
    /// 400 — Bad request, invalid JSON, malformed parameters
    InvalidRequest(String),
    /// Connection or read timeout
    Timeout(String),
    /// The transport failed because a streamed response body was never
    /// consumed. Distinct from model-level errors so callers can match on it.
    StreamNotConsumed(String),
    /// Catch-all for unrecognized failures
    Unknown(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Auth(msg) => write!(f, "authentication error: {}", msg),
            BackendError::RateLimit(msg) => write!(f, "rate limit error: {}", msg),
            BackendError::Overloaded(msg) => write!(f, "overloaded error: {}", msg),
            BackendError::ServerError(msg) => write!(f, "server error: {}", msg),
            BackendError::InvalidRequest(msg) => write!(f, "invalid request: {}", msg),
            BackendError::Timeout(msg) => write!(f, "timeout: {}", msg),
            BackendError::StreamNotConsumed(msg) => {
                write!(f, "response stream not consumed: {}", msg)
            }
            BackendError::Unknown(msg) => write!(f, "unknown backend error: {}", msg),
        }
    }
}

impl BackendError {
    /// Returns `true` if this error is transient and the request should be
    /// retried with backoff.
    ///
    /// Retryable: RateLimit, Overloaded, ServerError, Timeout and
    /// StreamNotConsumed (a fresh request gets a fresh body).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BackendError::RateLimit(_)
                | BackendError::Overloaded(_)
                | BackendError::ServerError(_)
                | BackendError::Timeout(_)
                | BackendError::StreamNotConsumed(_)
        )
    }

    /// Returns the HTTP status code associated with this error, if applicable.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            BackendError::Auth(_) => Some(401),
            BackendError::RateLimit(_) => Some(429),
            BackendError::Overloaded(_) => Some(503),
            BackendError::ServerError(_) => Some(500),
            BackendError::InvalidRequest(_) => Some(400),
            BackendError::Timeout(_) => None,
            BackendError::StreamNotConsumed(_) => None,
            BackendError::Unknown(_) => None,
        }
    }
}

impl From<BackendError> for ConductorError {
    fn from(err: BackendError) -> Self {
        ConductorError::Backend(err)
    }
}

// ============================================================================
// Primary Error Type
// ============================================================================

/// The primary error type for Conductor operations.
#[derive(Error, Debug)]
pub enum ConductorError {
    /// Configuration-related errors (invalid config, missing required fields)
    #[error("configuration error: {0}")]
    Config(String),

    /// Classified LLM backend failure (see [`BackendError`])
    #[error("backend error: {0}")]
    Backend(BackendError),

    /// Backend retries exhausted; carries the final classified failure
    #[error("backend retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Number of attempts made, including the first call
        attempts: u32,
        /// The classified error from the last attempt
        last: BackendError,
    },

    /// A worker exceeded its configured round cap without finishing
    #[error("worker '{worker}' exceeded the round cap of {cap}")]
    WorkerRoundCap { worker: String, cap: u32 },

    /// The router exceeded its configured decision cap without terminating
    #[error("turn exceeded the routing decision cap of {cap}")]
    TurnCap { cap: u32 },

    /// A routing response could not be resolved to a worker or the terminal
    /// sentinel
    #[error("unresolvable routing decision: {0}")]
    RoutingDecision(String),

    /// The turn was cancelled by the consumer closing the stream
    #[error("turn cancelled")]
    Cancelled,

    /// Tool execution errors (invalid parameters, collaborator failures).
    /// Inside a worker round these are converted to in-band results; this
    /// variant surfaces only from direct registry use.
    #[error("tool error: {0}")]
    Tool(String),

    /// Session store errors (invalid state, persistence failures)
    #[error("session error: {0}")]
    Session(String),

    /// Profile store errors (missing namespace, persistence failures)
    #[error("profile error: {0}")]
    Profile(String),

    /// Resource not found (sessions, tools, workers)
    #[error("not found: {0}")]
    NotFound(String),

    /// Standard I/O errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors that escaped classification
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// A specialized `Result` type for Conductor operations.
pub type Result<T> = std::result::Result<T, ConductorError>;
