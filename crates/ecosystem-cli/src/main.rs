use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use ecosystem_agents::{Orchestrator, StagePipeline};
use ecosystem_core::gateway::derive_search_terms;
use ecosystem_core::{
    AuditLog, Config, ConfigLoader, EventCollector, PipelineEvent, SqliteStore, StageStatus,
    StoredWorkflow, TelemetryOptions, WorkflowStore, init_metrics_from_env, init_telemetry,
    render_report,
};
use tokio::runtime::Runtime;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "ecosystem",
    version,
    about = "Research, analysis, innovation and environment pipeline over live data"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the four-stage workflow for one task.
    Run(RunArgs),
    /// Render the latest stored result for a task.
    Show(ShowArgs),
    /// List the most recently stored workflow runs.
    History(HistoryArgs),
    /// Print the search terms derived for a title and description.
    Terms(TermsArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    #[arg(long)]
    title: String,

    #[arg(long, default_value = "")]
    description: String,

    /// Configuration file (defaults to `ECOSYSTEM_CONFIG`, then `ecosystem.toml`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Skip printing the report.
    #[arg(long)]
    no_report: bool,
}

#[derive(Args, Debug)]
struct ShowArgs {
    #[arg(long)]
    task_id: String,

    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct HistoryArgs {
    #[arg(long, default_value_t = 10)]
    limit: usize,

    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct TermsArgs {
    #[arg(long)]
    title: String,

    #[arg(long, default_value = "")]
    description: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Terms(args) => {
            for term in derive_search_terms(&args.title, &args.description) {
                println!("{term}");
            }
            Ok(())
        }
        Command::Run(args) => {
            let config = load_config(args.config.clone())?;
            let rt = Runtime::new()?;
            rt.block_on(run_command(args, config))
        }
        Command::Show(args) => {
            let config = load_config(args.config.clone())?;
            let rt = Runtime::new()?;
            rt.block_on(show_command(args, config))
        }
        Command::History(args) => {
            let config = load_config(args.config.clone())?;
            let rt = Runtime::new()?;
            rt.block_on(history_command(args, config))
        }
    }
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let config = ConfigLoader::load(path).context("failed to load configuration")?;
    init_telemetry(TelemetryOptions::from_logging(&config.logging))?;
    init_metrics_from_env("ecosystem-cli")?;
    Ok(config)
}

async fn run_command(args: RunArgs, config: Config) -> Result<()> {
    let store = SqliteStore::connect(&config.store.database_url, config.store.reset_on_start)
        .await
        .with_context(|| format!("failed to open store {}", config.store.database_url))?;
    let pipeline = StagePipeline::from_config(&config)?;

    let (events, mut receiver) = EventCollector::new();
    let progress = tokio::spawn(async move {
        while let Some(event) = receiver.recv().await {
            print_progress(&event);
        }
    });

    let orchestrator = Orchestrator::new(pipeline, Arc::new(store))
        .with_events(events)
        .with_audit_log(AuditLog::from_config(&config.logging));

    let mut task = orchestrator.create_task(args.title, args.description);
    info!(task_id = %task.id, "starting workflow");
    let result = orchestrator.execute(&mut task).await;

    drop(orchestrator);
    progress.await.ok();

    if !args.no_report {
        println!("{}", render_report(&result));
    }
    println!("task id: {}", task.id);

    if !result.metrics.workflow_success {
        bail!(
            "workflow failed: {}",
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

async fn show_command(args: ShowArgs, config: Config) -> Result<()> {
    let store = SqliteStore::connect(&config.store.database_url, false)
        .await
        .with_context(|| format!("failed to open store {}", config.store.database_url))?;

    match store.load(&args.task_id).await? {
        Some(result) => {
            println!("{}", render_report(&result));
            Ok(())
        }
        None => bail!("no stored result for task {}", args.task_id),
    }
}

async fn history_command(args: HistoryArgs, config: Config) -> Result<()> {
    let store = SqliteStore::connect(&config.store.database_url, false)
        .await
        .with_context(|| format!("failed to open store {}", config.store.database_url))?;

    let rows = store.recent(args.limit).await?;
    if rows.is_empty() {
        println!("no stored workflows");
    }
    for row in &rows {
        println!("{}", history_line(row));
    }
    Ok(())
}

fn history_line(row: &StoredWorkflow) -> String {
    format!(
        "{:>5}  {}  {}",
        row.id,
        row.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
        row.task_id
    )
}

fn print_progress(event: &PipelineEvent) {
    match event {
        PipelineEvent::StageStarted { stage, .. } => println!("[{stage}] running"),
        PipelineEvent::StageFinished {
            stage,
            status,
            elapsed_ms,
            ..
        } => match status {
            StageStatus::Success => println!("[{stage}] done in {elapsed_ms}ms"),
            StageStatus::Degraded => {
                println!("[{stage}] done in {elapsed_ms}ms (language backend not configured)")
            }
            StageStatus::Failure { reason } => println!("[{stage}] failed: {reason}"),
        },
        PipelineEvent::WorkflowFinished {
            success,
            total_secs,
            ..
        } => println!(
            "workflow {} in {total_secs:.2}s",
            if *success { "completed" } else { "failed" }
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn history_command_parses_limit() {
        let cli = Cli::parse_from(["ecosystem", "history", "--limit", "3"]);
        let Command::History(args) = cli.command else {
            panic!("expected history command");
        };
        assert_eq!(args.limit, 3);
        assert!(args.config.is_none());
    }

    #[test]
    fn history_line_shows_row_time_and_task() {
        let row = StoredWorkflow {
            id: 7,
            task_id: "task_1715000000_3".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 5, 6, 12, 30, 0).unwrap(),
        };
        assert_eq!(
            history_line(&row),
            "    7  2024-05-06 12:30:00 UTC  task_1715000000_3"
        );
    }
}
