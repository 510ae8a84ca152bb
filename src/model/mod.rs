//! Model client module
//!
//! Everything between the orchestration layer and the LLM backend:
//! - `ModelBackend`: the boundary trait, with an OpenAI-compatible
//!   implementation and a scripted one for tests
//! - `repair` / `guard_empty_content`: pre-flight payload repair
//! - `RetryPolicy`: exponential backoff for transient failures
//! - `ModelAdapter`: the single funnel combining all of the above
//! - `CallObserver` / `ToolCallStats`: call telemetry

mod adapter;
mod mock;
mod observer;
mod repair;
mod retry;
mod types;

pub mod openai;

pub use adapter::ModelAdapter;
pub use mock::ScriptedBackend;
pub use observer::{CallObserver, ToolCallStats};
pub use openai::OpenAiBackend;
pub use repair::{guard_empty_content, prepare, repair, EMPTY_CONTENT_SENTINEL};
pub use retry::RetryPolicy;
pub use types::{ModelBackend, ModelResponse, ToolSchema};
