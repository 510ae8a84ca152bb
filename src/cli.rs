//! Command-line interface
//!
//! A small REPL that drives a supervisor from stdin. Useful for poking at
//! the orchestration locally; real deployments embed the library instead.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use conductor::agents::{Supervisor, TurnRequest, Worker};
use conductor::config::Config;
use conductor::conversation::FileSessionStore;
use conductor::model::{ModelAdapter, OpenAiBackend, ToolCallStats};
use conductor::profile::{FileProfileStore, ProfileUpdater};
use conductor::tools::{
    CreateEventTool, DateTimeTool, InMemoryCalendar, InMemoryWorkspace, ListEventsTool,
    ReadPageTool, SearchTasksTool, ToolRegistry, UpdateTaskTool,
};

#[derive(Parser)]
#[command(name = "conductor", version, about = "Multi-agent assistant orchestrator")]
struct Cli {
    /// Path to the config file (default: ~/.conductor/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// User id the turns run for
    #[arg(long, default_value = "local")]
    user: String,

    /// Deployment category
    #[arg(long, default_value = "personal")]
    category: String,

    /// Conversation thread id (default: a fresh uuid)
    #[arg(long)]
    thread: Option<String>,

    /// Stream turn events instead of printing only the final answer
    #[arg(long)]
    stream: bool,
}

/// CLI entry point.
pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("conductor=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.clone()).context("loading configuration")?;

    let supervisor = Arc::new(build_supervisor(&config)?);
    let thread_id = cli.thread.clone().unwrap_or_else(|| Uuid::new_v4().to_string());

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let line = match lines.next_line().await? {
            Some(line) => line,
            None => break,
        };
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if text == "exit" || text == "quit" {
            break;
        }

        let request = TurnRequest::new(&cli.user, &cli.category, &thread_id, text);

        if cli.stream {
            let mut events = supervisor.run_turn_stream(request);
            while let Some(event) = events.recv().await {
                let line = match event.content {
                    Some(content) => {
                        format!("[{:?}] {} ({}): {}\n", event.kind, event.agent, event.message, content)
                    }
                    None => format!("[{:?}] {}: {}\n", event.kind, event.agent, event.message),
                };
                stdout.write_all(line.as_bytes()).await?;
            }
        } else {
            match supervisor.run_turn(request).await {
                Ok(answer) => {
                    stdout.write_all(answer.as_bytes()).await?;
                    stdout.write_all(b"\n").await?;
                }
                Err(err) => {
                    stdout
                        .write_all(format!("error: {}\n", err).as_bytes())
                        .await?;
                }
            }
        }
    }

    Ok(())
}

fn build_supervisor(config: &Config) -> anyhow::Result<Supervisor> {
    let backend = OpenAiBackend::new(
        &config.model.api_base,
        &config.model.api_key,
        &config.model.model,
    )
    .with_max_tokens(config.model.max_tokens)
    .with_temperature(config.model.temperature);

    let stats = Arc::new(ToolCallStats::new());
    let adapter = Arc::new(
        ModelAdapter::new(Arc::new(backend))
            .with_retry(config.retry_policy())
            .with_observer(stats.clone()),
    );

    let calendar = Arc::new(InMemoryCalendar::new());
    let workspace = Arc::new(InMemoryWorkspace::new());

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(DateTimeTool));
    registry.register(Arc::new(ListEventsTool::new(calendar.clone())));
    registry.register(Arc::new(CreateEventTool::new(calendar)));
    registry.register(Arc::new(SearchTasksTool::new(workspace.clone())));
    registry.register(Arc::new(UpdateTaskTool::new(
        workspace.clone(),
        config.tasks.clone(),
    )));
    registry.register(Arc::new(ReadPageTool::new(workspace)));

    let session_store = Arc::new(FileSessionStore::new(config.session_dir())?);
    let profile_store = Arc::new(FileProfileStore::new(config.profile_dir())?);
    let updater = Arc::new(ProfileUpdater::new(adapter.clone(), profile_store));

    let scheduler = Worker::new(
        "scheduler",
        "Handles calendar questions: listing and creating events.",
        "You are the scheduling worker. Use the calendar tools to carry out \
         this task, then report what you found or did.\nTask: {task}",
    )
    .with_tool("current_datetime")
    .with_tool("calendar_list_events")
    .with_tool("calendar_create_event");

    let tracker = Worker::new(
        "tracker",
        "Handles task tracking: searching, updating and reading task pages.",
        "You are the task-tracking worker. Use the workspace tools to carry \
         out this task, then report what you found or did.\nTask: {task}",
    )
    .with_tool("current_datetime")
    .with_tool("search_tasks")
    .with_tool("update_task")
    .with_tool("read_page");

    let formatter = Worker::new(
        "formatter",
        "Produces the final, user-facing reply from the gathered results.",
        "You write the final reply to the user based on the conversation so \
         far. Be concise and complete.\nTask: {task}",
    );

    Ok(Supervisor::new(adapter, registry, session_store, "formatter")
        .with_worker(scheduler)
        .with_worker(tracker)
        .with_worker(formatter)
        .with_limits(
            config.limits.max_routing_decisions,
            config.limits.max_worker_rounds,
        )
        .with_profile_updater(updater)
        .with_stats(stats))
}
