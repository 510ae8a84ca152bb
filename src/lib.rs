//! Conductor - a multi-agent orchestration core
//!
//! A router/supervisor sequences specialized tool-using workers over a
//! shared conversation log, repairs and retries every model call, streams
//! typed progress events to consumers, and extracts durable user facts in
//! the background.
//!
//! # Quick start
//! ```no_run
//! use std::sync::Arc;
//! use conductor::agents::{Supervisor, TurnRequest, Worker};
//! use conductor::conversation::InMemorySessionStore;
//! use conductor::model::{ModelAdapter, OpenAiBackend};
//! use conductor::tools::ToolRegistry;
//!
//! # async fn example() -> conductor::Result<()> {
//! let backend = OpenAiBackend::new("https://api.openai.com/v1", "sk-...", "gpt-4o-mini");
//! let adapter = Arc::new(ModelAdapter::new(Arc::new(backend)));
//!
//! let supervisor = Supervisor::new(
//!     adapter,
//!     ToolRegistry::new(),
//!     Arc::new(InMemorySessionStore::new()),
//!     "formatter",
//! )
//! .with_worker(Worker::new("formatter", "Writes the final reply.", "Reply. Task: {task}"));
//!
//! let answer = supervisor
//!     .run_turn(TurnRequest::new("u1", "personal", "thread-1", "Hello!"))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod agents;
pub mod config;
pub mod conversation;
pub mod error;
pub mod model;
pub mod profile;
pub mod tools;

pub use error::{BackendError, ConductorError, Result};
