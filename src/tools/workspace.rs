//! Task workspace tools
//!
//! `WorkspaceClient` abstracts the task/notes backend (the in-memory
//! implementation backs tests and offline runs). Three tools are exposed
//! over it: searching tasks, updating a task under a status policy, and
//! reading a page of nested blocks as an indented outline.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{ConductorError, Result};

use super::types::{Tool, ToolContext};

/// A task in the workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Task identifier
    pub id: String,
    /// Task title
    pub title: String,
    /// Current status (e.g. "todo", "in_progress", "done", "hidden")
    pub status: String,
    /// Due date, if any (ISO date string)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due: Option<String>,
}

/// A block of page content. Blocks form a tree through child ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    /// Block identifier
    pub id: String,
    /// Text content of the block
    pub text: String,
    /// Ids of child blocks, in display order
    pub children: Vec<String>,
}

/// Status policy consulted by task updates.
///
/// `preserve_status_states`: a task currently in one of these states keeps
/// its status even when the update asks to change it (other fields still
/// apply). `skip_update_states`: a task in one of these states is not
/// modified at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPolicy {
    /// Statuses that survive an update's status change
    #[serde(default)]
    pub preserve_status_states: Vec<String>,
    /// Statuses that block the update entirely
    #[serde(default)]
    pub skip_update_states: Vec<String>,
}

impl Default for TaskPolicy {
    fn default() -> Self {
        Self {
            preserve_status_states: vec!["in_progress".to_string()],
            skip_update_states: vec!["hidden".to_string()],
        }
    }
}

/// Backend abstraction for workspace access, scoped per user.
#[async_trait]
pub trait WorkspaceClient: Send + Sync {
    /// Tasks for `user_id` matching `query` (title substring).
    async fn search_tasks(&self, user_id: &str, query: &str) -> Result<Vec<Task>>;

    /// Fetch one task by id.
    async fn get_task(&self, user_id: &str, task_id: &str) -> Result<Option<Task>>;

    /// Store the task, replacing its previous version.
    async fn put_task(&self, user_id: &str, task: Task) -> Result<()>;

    /// Fetch one page block by id.
    async fn get_block(&self, user_id: &str, block_id: &str) -> Result<Option<Block>>;
}

/// In-memory workspace for tests and offline runs.
#[derive(Default)]
pub struct InMemoryWorkspace {
    tasks: RwLock<Vec<(String, Task)>>,
    blocks: RwLock<Vec<(String, Block)>>,
}

impl InMemoryWorkspace {
    /// Create an empty workspace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a block (test/demo helper).
    pub async fn add_block(&self, user_id: &str, block: Block) {
        self.blocks.write().await.push((user_id.to_string(), block));
    }
}

#[async_trait]
impl WorkspaceClient for InMemoryWorkspace {
    async fn search_tasks(&self, user_id: &str, query: &str) -> Result<Vec<Task>> {
        let needle = query.to_lowercase();
        let tasks = self.tasks.read().await;
        Ok(tasks
            .iter()
            .filter(|(owner, t)| owner == user_id && t.title.to_lowercase().contains(&needle))
            .map(|(_, t)| t.clone())
            .collect())
    }

    async fn get_task(&self, user_id: &str, task_id: &str) -> Result<Option<Task>> {
        let tasks = self.tasks.read().await;
        Ok(tasks
            .iter()
            .find(|(owner, t)| owner == user_id && t.id == task_id)
            .map(|(_, t)| t.clone()))
    }

    async fn put_task(&self, user_id: &str, task: Task) -> Result<()> {
        let mut tasks = self.tasks.write().await;
        if let Some(slot) = tasks
            .iter_mut()
            .find(|(owner, t)| owner == user_id && t.id == task.id)
        {
            slot.1 = task;
        } else {
            tasks.push((user_id.to_string(), task));
        }
        Ok(())
    }

    async fn get_block(&self, user_id: &str, block_id: &str) -> Result<Option<Block>> {
        let blocks = self.blocks.read().await;
        Ok(blocks
            .iter()
            .find(|(owner, b)| owner == user_id && b.id == block_id)
            .map(|(_, b)| b.clone()))
    }
}

/// Tool searching tasks by title.
pub struct SearchTasksTool {
    client: Arc<dyn WorkspaceClient>,
}

impl SearchTasksTool {
    pub fn new(client: Arc<dyn WorkspaceClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for SearchTasksTool {
    fn name(&self) -> &str {
        "search_tasks"
    }

    fn description(&self) -> &str {
        "Search the user's tasks by title. Returns matching tasks with their \
         id, status and due date."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Title substring to match" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String> {
        let query = args["query"]
            .as_str()
            .ok_or_else(|| ConductorError::Tool("missing 'query'".into()))?;

        let tasks = self.client.search_tasks(&ctx.user_id, query).await?;
        Ok(serde_json::to_string(&tasks)?)
    }
}

/// Tool updating a task, subject to the status policy.
pub struct UpdateTaskTool {
    client: Arc<dyn WorkspaceClient>,
    policy: TaskPolicy,
}

impl UpdateTaskTool {
    pub fn new(client: Arc<dyn WorkspaceClient>, policy: TaskPolicy) -> Self {
        Self { client, policy }
    }
}

#[derive(Deserialize)]
struct UpdateTaskArgs {
    task_id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    due: Option<String>,
}

#[async_trait]
impl Tool for UpdateTaskTool {
    fn name(&self) -> &str {
        "update_task"
    }

    fn description(&self) -> &str {
        "Update a task's title, status or due date. Only the fields provided \
         are changed."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "task_id": { "type": "string" },
                "title": { "type": "string" },
                "status": { "type": "string" },
                "due": { "type": "string", "description": "ISO date" }
            },
            "required": ["task_id"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String> {
        let args: UpdateTaskArgs = serde_json::from_value(args)
            .map_err(|e| ConductorError::Tool(format!("invalid arguments: {}", e)))?;

        let mut task = self
            .client
            .get_task(&ctx.user_id, &args.task_id)
            .await?
            .ok_or_else(|| ConductorError::NotFound(format!("task '{}'", args.task_id)))?;

        if self.policy.skip_update_states.contains(&task.status) {
            debug!(task = %task.id, status = %task.status, "update skipped by policy");
            return Ok(serde_json::json!({
                "updated": false,
                "reason": format!("task is '{}' and cannot be updated", task.status),
                "task": task,
            })
            .to_string());
        }

        if let Some(title) = args.title {
            task.title = title;
        }
        if let Some(due) = args.due {
            task.due = Some(due);
        }
        if let Some(status) = args.status {
            if self.policy.preserve_status_states.contains(&task.status) {
                debug!(task = %task.id, status = %task.status, "status preserved by policy");
            } else {
                task.status = status;
            }
        }

        self.client.put_task(&ctx.user_id, task.clone()).await?;
        Ok(serde_json::json!({ "updated": true, "task": task }).to_string())
    }
}

/// Tool reading a page of nested blocks as an indented outline.
pub struct ReadPageTool {
    client: Arc<dyn WorkspaceClient>,
}

impl ReadPageTool {
    pub fn new(client: Arc<dyn WorkspaceClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for ReadPageTool {
    fn name(&self) -> &str {
        "read_page"
    }

    fn description(&self) -> &str {
        "Read a page and all of its nested blocks as an indented text outline."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "page_id": { "type": "string", "description": "Id of the root block" }
            },
            "required": ["page_id"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String> {
        let page_id = args["page_id"]
            .as_str()
            .ok_or_else(|| ConductorError::Tool("missing 'page_id'".into()))?;

        // Depth-first over a work queue rather than recursion, so deeply
        // nested pages cannot blow the stack. The visited set breaks cycles
        // in malformed block graphs.
        let mut outline = String::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<(String, usize)> = VecDeque::new();
        queue.push_front((page_id.to_string(), 0));

        while let Some((block_id, depth)) = queue.pop_front() {
            if !visited.insert(block_id.clone()) {
                continue;
            }

            let block = self
                .client
                .get_block(&ctx.user_id, &block_id)
                .await?
                .ok_or_else(|| ConductorError::NotFound(format!("block '{}'", block_id)))?;

            if !block.text.is_empty() {
                outline.push_str(&"  ".repeat(depth));
                outline.push_str(&block.text);
                outline.push('\n');
            }

            // Children go to the front in reverse so they pop in order.
            for child in block.children.iter().rev() {
                queue.push_front((child.clone(), depth + 1));
            }
        }

        Ok(outline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ToolContext {
        ToolContext::new("u1", "personal", "t1")
    }

    fn task(id: &str, title: &str, status: &str) -> Task {
        Task {
            id: id.to_string(),
            title: title.to_string(),
            status: status.to_string(),
            due: None,
        }
    }

    async fn seeded_workspace() -> Arc<InMemoryWorkspace> {
        let ws = Arc::new(InMemoryWorkspace::new());
        ws.put_task("u1", task("t1", "Ship release notes", "todo"))
            .await
            .unwrap();
        ws.put_task("u1", task("t2", "Review PR", "in_progress"))
            .await
            .unwrap();
        ws.put_task("u1", task("t3", "Old migration", "hidden"))
            .await
            .unwrap();
        ws
    }

    #[tokio::test]
    async fn test_search_tasks_matches_substring() {
        let ws = seeded_workspace().await;
        let tool = SearchTasksTool::new(ws);

        let out = tool
            .execute(serde_json::json!({"query": "release"}), &ctx())
            .await
            .unwrap();
        let tasks: Vec<Task> = serde_json::from_str(&out).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, "t1");
    }

    #[tokio::test]
    async fn test_update_task_changes_named_fields_only() {
        let ws = seeded_workspace().await;
        let tool = UpdateTaskTool::new(ws.clone(), TaskPolicy::default());

        tool.execute(
            serde_json::json!({"task_id": "t1", "status": "done"}),
            &ctx(),
        )
        .await
        .unwrap();

        let updated = ws.get_task("u1", "t1").await.unwrap().unwrap();
        assert_eq!(updated.status, "done");
        assert_eq!(updated.title, "Ship release notes");
    }

    #[tokio::test]
    async fn test_policy_preserves_in_progress_status() {
        let ws = seeded_workspace().await;
        let tool = UpdateTaskTool::new(ws.clone(), TaskPolicy::default());

        tool.execute(
            serde_json::json!({"task_id": "t2", "status": "todo", "due": "2026-04-01"}),
            &ctx(),
        )
        .await
        .unwrap();

        let updated = ws.get_task("u1", "t2").await.unwrap().unwrap();
        // Status survives; the other field still applies.
        assert_eq!(updated.status, "in_progress");
        assert_eq!(updated.due.as_deref(), Some("2026-04-01"));
    }

    #[tokio::test]
    async fn test_policy_skips_hidden_tasks_entirely() {
        let ws = seeded_workspace().await;
        let tool = UpdateTaskTool::new(ws.clone(), TaskPolicy::default());

        let out = tool
            .execute(
                serde_json::json!({"task_id": "t3", "title": "Renamed"}),
                &ctx(),
            )
            .await
            .unwrap();

        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["updated"], false);

        let untouched = ws.get_task("u1", "t3").await.unwrap().unwrap();
        assert_eq!(untouched.title, "Old migration");
    }

    #[tokio::test]
    async fn test_update_unknown_task_is_not_found() {
        let ws = seeded_workspace().await;
        let tool = UpdateTaskTool::new(ws, TaskPolicy::default());

        let err = tool
            .execute(serde_json::json!({"task_id": "nope"}), &ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, ConductorError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_read_page_builds_indented_outline() {
        let ws = Arc::new(InMemoryWorkspace::new());
        ws.add_block(
            "u1",
            Block {
                id: "page".into(),
                text: "Weekly plan".into(),
                children: vec!["a".into(), "b".into()],
            },
        )
        .await;
        ws.add_block(
            "u1",
            Block {
                id: "a".into(),
                text: "Monday".into(),
                children: vec!["a1".into()],
            },
        )
        .await;
        ws.add_block(
            "u1",
            Block {
                id: "a1".into(),
                text: "Standup".into(),
                children: vec![],
            },
        )
        .await;
        ws.add_block(
            "u1",
            Block {
                id: "b".into(),
                text: "Tuesday".into(),
                children: vec![],
            },
        )
        .await;

        let tool = ReadPageTool::new(ws);
        let out = tool
            .execute(serde_json::json!({"page_id": "page"}), &ctx())
            .await
            .unwrap();

        assert_eq!(out, "Weekly plan\n  Monday\n    Standup\n  Tuesday\n");
    }

    #[tokio::test]
    async fn test_read_page_survives_cycles() {
        let ws = Arc::new(InMemoryWorkspace::new());
        ws.add_block(
            "u1",
            Block {
                id: "x".into(),
                text: "Loops".into(),
                children: vec!["y".into()],
            },
        )
        .await;
        ws.add_block(
            "u1",
            Block {
                id: "y".into(),
                text: "Back".into(),
                children: vec!["x".into()],
            },
        )
        .await;

        let tool = ReadPageTool::new(ws);
        let out = tool
            .execute(serde_json::json!({"page_id": "x"}), &ctx())
            .await
            .unwrap();

        assert_eq!(out, "Loops\n  Back\n");
    }
}
