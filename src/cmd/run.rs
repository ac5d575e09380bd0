//! Gate run commands: every mode that executes stages.

use anyhow::Result;
use chrono::Utc;
use std::path::Path;
use uuid::Uuid;

use super::super::Cli;
use super::Workspace;
use gatehouse::errors::{GateError, StageFailure};
use gatehouse::guardian::SnapshotManager;
use gatehouse::observability::{FlakeCounts, FlakeRecord, Recorder, RunOutcome};
use gatehouse::pipeline::{self, GuardianRun, ParallelPlan, RunMode};
use gatehouse::smart::{SmartPlan, git::changed_paths_or_empty};
use gatehouse::ui::progress::Tone;

pub async fn cmd_full(
    project_dir: &Path,
    cli: &Cli,
    from: Option<&str>,
    until: Option<&str>,
) -> Result<()> {
    let ws = Workspace::open(project_dir, cli.verbose)?;
    let stages = pipeline::full_plan(&ws.config, from, until)?;
    ws.session().run_sequential(RunMode::Full, stages).await?;
    Ok(())
}

pub async fn cmd_resume(project_dir: &Path, cli: &Cli) -> Result<()> {
    let ws = Workspace::open(project_dir, cli.verbose)?;
    let stages = pipeline::resume_plan(&ws.config)?;
    ws.ui.info(format!("Resuming from {}", stages[0].command));
    ws.session().run_sequential(RunMode::Resume, stages).await?;
    Ok(())
}

pub async fn cmd_retry_last_failed(project_dir: &Path, cli: &Cli) -> Result<()> {
    let ws = Workspace::open(project_dir, cli.verbose)?;
    let stages = pipeline::retry_plan(&ws.config)?;
    ws.session()
        .run_sequential(RunMode::RetryLastFailed, stages)
        .await?;
    Ok(())
}

pub async fn cmd_smart(project_dir: &Path, cli: &Cli) -> Result<()> {
    let ws = Workspace::open(project_dir, cli.verbose)?;
    let changed = changed_paths_or_empty(&ws.config.project_dir);
    let plan = SmartPlan::build(&ws.config, &changed)?;

    let mut rows = vec![format!("Changed files : {}", plan.changed)];
    for (category, paths) in &plan.categories {
        rows.push(format!("{:<14}: {}", category.to_string(), paths.len()));
    }
    rows.push(format!("Selected lane : {}", plan.lane));
    ws.ui.framed("SMART PLAN", &rows, Tone::Info);

    ws.session().run_sequential(RunMode::Smart, plan.stages).await?;
    Ok(())
}

pub async fn cmd_parallel(project_dir: &Path, cli: &Cli) -> Result<()> {
    let ws = Workspace::open(project_dir, cli.verbose)?;
    let plan = ParallelPlan::from_config(&ws.config)?;
    ws.session().run_parallel(plan).await?;
    Ok(())
}

pub async fn cmd_guardian(project_dir: &Path, cli: &Cli) -> Result<()> {
    let ws = Workspace::open(project_dir, cli.verbose)?;
    let guardian = GuardianRun::new(ws.session(), SnapshotManager::new(&ws.config));
    guardian.run().await?;
    Ok(())
}

pub async fn cmd_check(project_dir: &Path, cli: &Cli) -> Result<()> {
    let ws = Workspace::open(project_dir, cli.verbose)?;
    let stages = pipeline::check_plan(&ws.config)?;
    ws.session().run_sequential(RunMode::Check, stages).await?;
    Ok(())
}

/// Run the flake suite once and append its counts to the flake ledger.
pub async fn cmd_flake(project_dir: &Path, cli: &Cli) -> Result<()> {
    let ws = Workspace::open(project_dir, cli.verbose)?;
    let suite = ws.config.settings().observability.flake_suite.clone();
    let stage = ws
        .config
        .pipeline
        .find(&suite)
        .cloned()
        .ok_or(GateError::UnknownStage { name: suite.clone() })?;

    let executor = ws.executor();
    let started_at = Utc::now();
    ws.ui.stage_start(1, 1, &stage.command, &stage.label);
    let output = executor.capture(&stage).await;
    let duration_ms = output.duration.as_millis() as u64;
    ws.ui
        .stage_end(1, 1, &stage.command, output.success(), duration_ms);

    let counts = FlakeCounts::parse(&output.combined());
    let record = FlakeRecord {
        id: Uuid::new_v4(),
        suite: suite.clone(),
        started_at,
        duration_ms,
        outcome: if output.success() {
            RunOutcome::Passed
        } else {
            RunOutcome::Failed
        },
        exit_code: output.outcome.exit_code(),
        counts,
    };
    if let Err(e) = Recorder::new(&ws.config.observability_dir).record_flake(&record) {
        tracing::warn!(error = %e, "Could not append flake record");
        ws.ui.warn(format!("Flake record not saved: {}", e));
    }

    let rows = vec![
        format!("Suite   : {}", suite),
        format!("Passed  : {}", counts.passed),
        format!("Failed  : {}", counts.failed),
        format!("Flaky   : {}", counts.flaky),
        format!("Skipped : {}", counts.skipped),
    ];
    let tone = if output.success() { Tone::Good } else { Tone::Bad };
    ws.ui.framed("FLAKE INTEL", &rows, tone);

    if output.success() {
        return Ok(());
    }
    let failure = StageFailure {
        command: stage.command.clone(),
        label: stage.label.clone(),
        reproduce: ws.config.invocation(&stage).display(),
        outcome: output.outcome,
        stdout: output.stdout,
        stderr: output.stderr,
    };
    Err(GateError::from(failure).into())
}
