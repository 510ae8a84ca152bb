//! Calendar tools
//!
//! `CalendarClient` abstracts the actual calendar backend; the in-memory
//! implementation backs tests and offline runs. Two tools are exposed over
//! it: listing events in a date range and creating a new event.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{ConductorError, Result};

use super::types::{Tool, ToolContext};

/// A calendar event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// Event identifier
    pub id: String,
    /// Event title
    pub title: String,
    /// Start time (UTC)
    pub start: DateTime<Utc>,
    /// End time (UTC)
    pub end: DateTime<Utc>,
}

/// Backend abstraction for calendar access, scoped per user.
#[async_trait]
pub trait CalendarClient: Send + Sync {
    /// Events for `user_id` overlapping the `[start, end)` window.
    async fn list_events(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>>;

    /// Create an event for `user_id` and return it with its assigned id.
    async fn create_event(&self, user_id: &str, event: CalendarEvent) -> Result<CalendarEvent>;
}

/// In-memory calendar for tests and offline runs.
#[derive(Default)]
pub struct InMemoryCalendar {
    events: RwLock<Vec<(String, CalendarEvent)>>,
}

impl InMemoryCalendar {
    /// Create an empty calendar.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CalendarClient for InMemoryCalendar {
    async fn list_events(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>> {
        let events = self.events.read().await;
        Ok(events
            .iter()
            .filter(|(owner, e)| owner == user_id && e.start < end && e.end > start)
            .map(|(_, e)| e.clone())
            .collect())
    }

    async fn create_event(&self, user_id: &str, mut event: CalendarEvent) -> Result<CalendarEvent> {
        if event.id.is_empty() {
            event.id = Uuid::new_v4().to_string();
        }
        let mut events = self.events.write().await;
        events.push((user_id.to_string(), event.clone()));
        Ok(event)
    }
}

/// Tool listing calendar events in a date range.
pub struct ListEventsTool {
    client: Arc<dyn CalendarClient>,
}

impl ListEventsTool {
    pub fn new(client: Arc<dyn CalendarClient>) -> Self {
        Self { client }
    }
}

#[derive(Deserialize)]
struct ListEventsArgs {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

#[async_trait]
impl Tool for ListEventsTool {
    fn name(&self) -> &str {
        "calendar_list_events"
    }

    fn description(&self) -> &str {
        "List the user's calendar events overlapping a time window."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "start": { "type": "string", "description": "Window start, RFC 3339" },
                "end": { "type": "string", "description": "Window end, RFC 3339" }
            },
            "required": ["start", "end"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String> {
        let args: ListEventsArgs = serde_json::from_value(args)
            .map_err(|e| ConductorError::Tool(format!("invalid arguments: {}", e)))?;
        if args.end <= args.start {
            return Err(ConductorError::Tool("'end' must be after 'start'".into()));
        }

        let events = self.client.list_events(&ctx.user_id, args.start, args.end).await?;
        Ok(serde_json::to_string(&events)?)
    }
}

/// Tool creating a calendar event.
pub struct CreateEventTool {
    client: Arc<dyn CalendarClient>,
}

impl CreateEventTool {
    pub fn new(client: Arc<dyn CalendarClient>) -> Self {
        Self { client }
    }
}

#[derive(Deserialize)]
struct CreateEventArgs {
    title: String,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

#[async_trait]
impl Tool for CreateEventTool {
    fn name(&self) -> &str {
        "calendar_create_event"
    }

    fn description(&self) -> &str {
        "Create a new calendar event with a title, start and end time."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "title": { "type": "string" },
                "start": { "type": "string", "description": "RFC 3339 start time" },
                "end": { "type": "string", "description": "RFC 3339 end time" }
            },
            "required": ["title", "start", "end"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String> {
        let args: CreateEventArgs = serde_json::from_value(args)
            .map_err(|e| ConductorError::Tool(format!("invalid arguments: {}", e)))?;
        if args.end <= args.start {
            return Err(ConductorError::Tool("'end' must be after 'start'".into()));
        }

        let event = CalendarEvent {
            id: String::new(),
            title: args.title,
            start: args.start,
            end: args.end,
        };
        let created = self.client.create_event(&ctx.user_id, event).await?;
        Ok(serde_json::to_string(&created)?)
    }
}
