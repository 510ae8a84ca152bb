//! Message sequence repair
//!
//! Accumulated multi-agent history can violate the tool-calling protocol:
//! tool results whose issuing assistant message was dropped, assistant tool
//! calls that never got answered, empty assistant bodies mid-conversation.
//! Backends reject such payloads outright, so every outgoing request passes
//! through `repair` and `guard_empty_content` first.
//!
//! Both functions are pure and idempotent. They operate on the request
//! payload only; the stored conversation log is never rewritten.

use tracing::debug;

use crate::conversation::{Message, Role};

/// Placeholder body for a non-final assistant message with empty content.
///
/// Backends reject empty assistant bodies mid-conversation, so the guard
/// rewrites them to this sentinel before the payload leaves the process.
pub const EMPTY_CONTENT_SENTINEL: &str = "(no content)";

/// Rebuild a message sequence so that every tool-role message answers a tool
/// call issued by the assistant message heading its block.
///
/// The rules, applied in original order:
/// - An assistant message carrying tool calls claims the contiguous run of
///   tool-role messages that follows it. Results in that run whose
///   `tool_call_id` matches one of the assistant's call ids are kept; the
///   rest are dropped.
/// - Tool calls that received no result in their block are stripped from the
///   assistant message, so the payload never advertises an unanswered call.
/// - Tool-role messages outside any block are orphans and are dropped.
/// - Everything else passes through untouched.
///
/// Running repair on already-valid input returns it unchanged, so
/// `repair(&repair(msgs)) == repair(msgs)`.
pub fn repair(messages: &[Message]) -> Vec<Message> {
    let mut out = Vec::with_capacity(messages.len());
    let mut dropped = 0usize;

    let mut i = 0;
    while i < messages.len() {
        let msg = &messages[i];

        if msg.role == Role::Assistant && msg.has_tool_calls() {
            // Scan the contiguous tool-result block this assistant heads.
            let calls = msg.tool_calls.as_deref().unwrap_or(&[]);
            let mut answered: Vec<&str> = Vec::new();
            let mut block = Vec::new();

            let mut j = i + 1;
            while j < messages.len() && messages[j].role == Role::Tool {
                let result = &messages[j];
                let matches_call = result
                    .tool_call_id
                    .as_deref()
                    .map(|id| calls.iter().any(|c| c.id == id))
                    .unwrap_or(false);
                let duplicate = result
                    .tool_call_id
                    .as_deref()
                    .map(|id| answered.contains(&id))
                    .unwrap_or(false);

                if matches_call && !duplicate {
                    answered.push(result.tool_call_id.as_deref().unwrap_or(""));
                    block.push(result.clone());
                } else {
                    dropped += 1;
                }
                j += 1;
            }

            // Keep only the calls that actually got answered. An assistant
            // message left with zero answered calls becomes a plain message.
            let kept_calls: Vec<_> = calls
                .iter()
                .filter(|c| answered.contains(&c.id.as_str()))
                .cloned()
                .collect();

            let mut head = msg.clone();
            head.tool_calls = if kept_calls.is_empty() {
                None
            } else {
                Some(kept_calls)
            };
            out.push(head);
            out.extend(block);
            i = j;
        } else if msg.role == Role::Tool {
            // Orphaned tool result: no assistant block claims it.
            dropped += 1;
            i += 1;
        } else {
            out.push(msg.clone());
            i += 1;
        }
    }

    if dropped > 0 {
        debug!(dropped, "repaired message sequence");
    }

    out
}

/// Rewrite non-final assistant messages with empty content to
/// [`EMPTY_CONTENT_SENTINEL`].
///
/// The final message is left alone: an empty trailing assistant message is
/// the model's own last output and is legal.
pub fn guard_empty_content(mut messages: Vec<Message>) -> Vec<Message> {
    let len = messages.len();
    for (idx, msg) in messages.iter_mut().enumerate() {
        if idx + 1 < len && msg.role == Role::Assistant && msg.content.is_empty() {
            msg.content = EMPTY_CONTENT_SENTINEL.to_string();
        }
    }
    messages
}

/// Convenience: repair then guard, the full pre-flight pipeline.
pub fn prepare(messages: &[Message]) -> Vec<Message> {
    guard_empty_content(repair(messages))
}
