//! Conversation module - message log and per-thread state
//!
//! This module provides the conversation data model for Conductor:
//! - `Message`, `Role`, `ToolCall`: the append-only message log entries
//! - `ConversationState`: the log plus routing metadata for one thread
//! - `SessionStore`: pluggable checkpointing across turns (in-memory or
//!   JSON files)
//!
//! The supervisor owns a thread's `ConversationState` exclusively for the
//! duration of a turn. Workers append; nothing mutates history in place.

mod store;
mod types;

pub use store::{FileSessionStore, InMemorySessionStore, SessionStore};
pub use types::{ConversationState, Message, Role, ToolCall};
