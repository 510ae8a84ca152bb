//! Tool system for Conductor
//!
//! Workers act on the world exclusively through tools. This module provides
//! the `Tool` trait and registry, plus the built-in tool set: current
//! date/time, calendar access and the task workspace.
//!
//! Tool failures inside a worker round never abort the turn; the worker loop
//! feeds them back to the model as in-band error results.

mod registry;
mod types;

pub mod calendar;
pub mod datetime;
pub mod workspace;

pub use calendar::{CalendarClient, CalendarEvent, CreateEventTool, InMemoryCalendar, ListEventsTool};
pub use datetime::DateTimeTool;
pub use registry::ToolRegistry;
pub use types::{Tool, ToolContext};
pub use workspace::{
    Block, InMemoryWorkspace, ReadPageTool, SearchTasksTool, Task, TaskPolicy, UpdateTaskTool,
    WorkspaceClient,
};
