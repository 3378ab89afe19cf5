//! Demo driver for `taskledger`.
//!
//! Runs a scripted session against the in-memory ledger: creates categories
//! and tasks, updates and deletes with one injected failure, then prints
//! the reconciled views. Logs go to a file so stdout stays clean.
//!
//! ```bash
//! cargo run --bin taskledger
//! cargo run --bin taskledger -- --json --resync-delay-ms 200
//! ```

use std::collections::BTreeSet;
use std::path::Path;
use std::process::ExitCode;

use chrono::{DateTime, Utc};
use clap::Parser;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing_appender::non_blocking::WorkerGuard;

use taskledger::config::{AppConfig, CliArgs};
use taskledger::ledger::memory::{FailureMode, MemoryLedger};
use taskledger::ledger::CallKind;
use taskledger::orchestrator::{Notification, OperationError, Orchestrator};
use taskledger::tracker::TrackedTransaction;
use taskledger::views::DerivedViews;
use taskledger_proto::{
    CategoryId, Identity, NewCategory, NewTask, Priority, Task, TaskId, TaskStatus,
    UpdateTaskPayload,
};

const DAY_MS: u64 = 24 * 60 * 60 * 1000;

/// Errors that end the demo early.
#[derive(Debug, thiserror::Error)]
enum DemoError {
    /// A scripted operation failed unexpectedly.
    #[error(transparent)]
    Operation(#[from] OperationError),

    /// A created entity did not show up after resync.
    #[error("{0} missing after resync")]
    Missing(String),

    /// Rendering the JSON report failed.
    #[error("failed to render report: {0}")]
    Json(#[from] serde_json::Error),
}

/// Final state printed with `--json`.
#[derive(Serialize)]
struct Report {
    identity: Identity,
    tracked: TrackedTransaction,
    views: DerivedViews,
    notifications: Vec<Notification>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CliArgs::parse();

    let config = match AppConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config file: {e}");
            AppConfig::default()
        }
    };

    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());
    tracing::info!(identity = %config.identity, "taskledger demo starting");

    match run(&config, cli.json).await {
        Ok(()) => {
            tracing::info!("taskledger demo finished");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "taskledger demo failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize file-based logging.
///
/// Returns a [`WorkerGuard`] that must be held until shutdown to ensure all
/// buffered log entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("taskledger.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

/// The scripted session.
async fn run(config: &AppConfig, json: bool) -> Result<(), DemoError> {
    let identity = Identity::new(config.identity.clone());
    let ledger = MemoryLedger::new(Some(identity.clone()), config.settle_latency);
    let (orch, mut events) = Orchestrator::new(ledger, config.orchestrator());
    let mut log = Vec::new();

    orch.reload().await?;

    // Step 1: categories.
    for (name, color) in [("Work", "#3b82f6"), ("Personal", "#22c55e")] {
        orch.add_category(NewCategory {
            name: name.to_string(),
            color: color.to_string(),
        })
        .await?;
    }
    orch.settle().await;
    drain(&mut events, &mut log, json);
    let work = category_named(&orch, "Work")?;
    let personal = category_named(&orch, "Personal")?;

    // Step 2: tasks.
    let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
    orch.add_task(new_task(
        "Buy groceries",
        personal,
        Priority::Medium,
        now + DAY_MS,
        &["shopping"],
    ))
    .await?;
    orch.add_task(new_task(
        "Write quarterly report",
        work,
        Priority::High,
        now + 3 * DAY_MS,
        &["report", "q3"],
    ))
    .await?;
    orch.settle().await;
    drain(&mut events, &mut log, json);
    let groceries = task_named(&orch, "Buy groceries")?;
    let report = task_named(&orch, "Write quarterly report")?;

    // Step 3: updates, and a delete the wallet refuses.
    orch.update_task(UpdateTaskPayload::new(groceries).with_status(TaskStatus::InProgress))
        .await?;
    orch.ledger()
        .fail_next(CallKind::DeleteTask, FailureMode::Rejection);
    if let Err(e) = orch.delete_task(&report).await {
        tracing::info!(error = %e, "scripted delete failure, task restored");
    }
    orch.update_task(UpdateTaskPayload::new(report).with_status(TaskStatus::Completed))
        .await?;
    orch.settle().await;
    drain(&mut events, &mut log, json);

    // Step 4: filter and report.
    orch.set_selected_tags(vec!["shopping".to_string(), "q3".to_string()]);

    if json {
        let report = Report {
            identity,
            tracked: orch.tracked(),
            views: orch.views(),
            notifications: log,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_views(&orch.views(), &orch.tasks());
    }
    Ok(())
}

fn new_task(
    content: &str,
    category_id: CategoryId,
    priority: Priority,
    due_date: u64,
    tags: &[&str],
) -> NewTask {
    NewTask {
        content: content.to_string(),
        description: String::new(),
        priority,
        due_date,
        category_id,
        tags: tags.iter().map(ToString::to_string).collect::<BTreeSet<_>>(),
    }
}

fn category_named(orch: &Orchestrator<MemoryLedger>, name: &str) -> Result<CategoryId, DemoError> {
    orch.categories()
        .into_iter()
        .find(|c| c.name == name)
        .map(|c| c.id)
        .ok_or_else(|| DemoError::Missing(format!("category {name:?}")))
}

fn task_named(orch: &Orchestrator<MemoryLedger>, content: &str) -> Result<TaskId, DemoError> {
    orch.tasks()
        .into_iter()
        .find(|t| t.content == content)
        .map(|t| t.id)
        .ok_or_else(|| DemoError::Missing(format!("task {content:?}")))
}

/// Moves pending notifications into `log`, echoing them in text mode.
fn drain(events: &mut mpsc::Receiver<Notification>, log: &mut Vec<Notification>, json: bool) {
    while let Ok(notification) = events.try_recv() {
        if !json {
            println!("[{:?}] {}", notification.level, notification.message);
        }
        log.push(notification);
    }
}

fn print_views(views: &DerivedViews, all: &[Task]) {
    println!();
    println!(
        "{} tasks, {} completed, {} pending",
        views.stats.total, views.stats.completed, views.stats.pending
    );
    println!("Categories:");
    for category in &views.categories {
        println!("  {} ({}) {}", category.name, category.count, category.color);
    }
    println!("Tags: {}", views.tags.join(", "));
    println!("All tasks:");
    for task in all {
        println!("  {}", describe(task));
    }
    println!("Filtered:");
    for task in &views.filtered {
        println!("  {}", describe(task));
    }
}

fn describe(task: &Task) -> String {
    let due = i64::try_from(task.due_date)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map_or_else(|| "-".to_string(), |d| d.format("%Y-%m-%d").to_string());
    let tags: Vec<&str> = task.tags.iter().map(String::as_str).collect();
    format!(
        "#{} [{}] {} ({}, due {due}) {}",
        task.id,
        task.status,
        task.content,
        task.priority,
        tags.join(" ")
    )
}
