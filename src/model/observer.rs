//! Call telemetry for the model adapter
//!
//! The adapter notifies observers about every tool-call payload it receives
//! from the backend and every tool-result message it sends back. The bundled
//! `ToolCallStats` observer keeps per-tool counters that the supervisor can
//! snapshot and reset between turns.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::conversation::ToolCall;

/// Observer hooks for model call telemetry.
pub trait CallObserver: Send + Sync {
    /// Called once per backend response that carries tool calls.
    fn on_tool_calls(&self, calls: &[ToolCall]);

    /// Called once per request with the number of tool-result messages it
    /// carries.
    fn on_tool_results(&self, count: usize);
}

/// Per-tool invocation counters.
#[derive(Default)]
pub struct ToolCallStats {
    calls: Mutex<HashMap<String, u64>>,
    results_seen: Mutex<u64>,
}

impl ToolCallStats {
    /// Create a fresh, zeroed counter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the per-tool call counts.
    pub fn snapshot(&self) -> HashMap<String, u64> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Total tool-result messages observed in outgoing requests.
    pub fn results_seen(&self) -> u64 {
        self.results_seen.lock().map(|r| *r).unwrap_or(0)
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
        if let Ok(mut results) = self.results_seen.lock() {
            *results = 0;
        }
    }
}

impl CallObserver for ToolCallStats {
    fn on_tool_calls(&self, calls: &[ToolCall]) {
        if let Ok(mut counts) = self.calls.lock() {
            for call in calls {
                *counts.entry(call.name.clone()).or_insert(0) += 1;
            }
        }
    }

    fn on_tool_results(&self, count: usize) {
        if let Ok(mut results) = self.results_seen.lock() {
            *results += count as u64;
        }
    }
}
