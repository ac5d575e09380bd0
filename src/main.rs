use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use std::path::PathBuf;
use std::process::ExitCode;

mod cmd;

#[derive(Parser)]
#[command(name = "gatehouse")]
#[command(version, about = "Release-gate orchestrator with snapshots, rollback and rescue")]
pub struct Cli {
    /// Stream stage output and enable debug diagnostics
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Answer yes to confirmation prompts
    #[arg(long, global = true)]
    pub yes: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full stage pipeline, optionally bounded
    Full {
        /// First stage to run (inclusive)
        #[arg(long)]
        from: Option<String>,
        /// Last stage to run (inclusive)
        #[arg(long)]
        until: Option<String>,
    },
    /// Continue the pipeline from the last recorded failing stage
    Resume,
    /// Re-run only the last recorded failing stage
    RetryLastFailed,
    /// Run core checks plus the E2E lane picked from working-tree changes
    Smart,
    /// Run the sequential head, then two branches concurrently
    Parallel,
    /// Run the full pipeline with a pre-flight snapshot and rollback on failure
    Guardian,
    /// Run the core verification checks only
    Check,
    /// Create, list, restore, verify or diff guardian snapshots
    Snapshot {
        #[command(subcommand)]
        command: SnapshotCommands,
    },
    /// Re-run one stage and write a fix request if it fails
    Rescue {
        /// Stage or script name
        stage: String,
    },
    /// Summarize recent run and flake history
    Observability {
        /// Number of records to read from each ledger
        limit: Option<usize>,
    },
    /// Run the flake suite once and record its counts
    Flake,
    /// Prune old failed stage logs and snapshots
    Retention {
        #[command(subcommand)]
        command: RetentionCommands,
    },
    /// Check the workspace is ready to gate
    Doctor,
    /// Show gatehouse state for this workspace
    Status,
    /// Append a line to the decisions log
    Note {
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },
    /// Append a line to the error catalog
    Error {
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },
    /// Create .gatehouse/ and the journal documents
    Init,
    /// List the canonical pipeline and auxiliary stages
    Stages,
}

#[derive(Subcommand, Clone)]
pub enum SnapshotCommands {
    /// Snapshot the configured targets
    Create {
        /// Optional label (words are joined)
        label: Vec<String>,
    },
    /// List snapshots, newest first
    List {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Copy a snapshot back into the workspace
    Restore {
        /// Snapshot id, unique prefix, or `latest`
        selector: String,
        /// Abort on the first problem instead of skipping
        #[arg(long)]
        strict: bool,
    },
    /// Check snapshot integrity
    Verify {
        /// Snapshot id, unique prefix, `latest` or `all`
        selector: Option<String>,
    },
    /// Compare a snapshot with another snapshot or the workspace
    Diff {
        left: String,
        /// Snapshot id or `workspace` (default)
        right: Option<String>,
    },
}

#[derive(Subcommand, Clone, Copy)]
pub enum RetentionCommands {
    /// Show what would be removed
    Preview,
    /// Remove old failed runs and snapshots
    Apply,
}

async fn run(cli: &Cli) -> Result<()> {
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    let log_dir = gatehouse::init::is_initialized(&project_dir)
        .then(|| project_dir.join(gatehouse::config::STATE_DIR).join("logs"));
    let _log_guard = gatehouse::telemetry::init(log_dir.as_deref(), cli.verbose);

    match &cli.command {
        Commands::Full { from, until } => {
            cmd::cmd_full(&project_dir, cli, from.as_deref(), until.as_deref()).await?
        }
        Commands::Resume => cmd::cmd_resume(&project_dir, cli).await?,
        Commands::RetryLastFailed => cmd::cmd_retry_last_failed(&project_dir, cli).await?,
        Commands::Smart => cmd::cmd_smart(&project_dir, cli).await?,
        Commands::Parallel => cmd::cmd_parallel(&project_dir, cli).await?,
        Commands::Guardian => cmd::cmd_guardian(&project_dir, cli).await?,
        Commands::Check => cmd::cmd_check(&project_dir, cli).await?,
        Commands::Snapshot { command } => cmd::cmd_snapshot(&project_dir, command.clone())?,
        Commands::Rescue { stage } => cmd::cmd_rescue(&project_dir, cli, stage).await?,
        Commands::Observability { limit } => cmd::cmd_observability(&project_dir, *limit)?,
        Commands::Flake => cmd::cmd_flake(&project_dir, cli).await?,
        Commands::Retention { command } => cmd::cmd_retention(&project_dir, cli, *command)?,
        Commands::Doctor => cmd::cmd_doctor(&project_dir)?,
        Commands::Status => cmd::cmd_status(&project_dir)?,
        Commands::Note { message } => cmd::cmd_note(&project_dir, &message.join(" "))?,
        Commands::Error { message } => cmd::cmd_error(&project_dir, &message.join(" "))?,
        Commands::Init => cmd::cmd_init(&project_dir)?,
        Commands::Stages => cmd::cmd_stages(&project_dir)?,
    }

    Ok(())
}

/// Stage failures exit with the stage's code; everything else with 1.
fn exit_code(err: &anyhow::Error) -> u8 {
    let code = err
        .downcast_ref::<gatehouse::errors::GateError>()
        .map(|e| e.exit_code())
        .unwrap_or(1);
    code.clamp(1, 255) as u8
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(error = ?e, "Command failed");
            eprintln!("{} {:#}", style("Error:").red().bold(), e);
            ExitCode::from(exit_code(&e))
        }
    }
}
