//! Run history and retention commands.

use anyhow::Result;
use std::path::Path;

use super::super::{Cli, RetentionCommands};
use gatehouse::config::Config;
use gatehouse::observability::{ObservabilitySummary, Recorder};
use gatehouse::retention;
use gatehouse::ui::render::format_duration;

pub fn cmd_observability(project_dir: &Path, limit: Option<usize>) -> Result<()> {
    let config = Config::load(project_dir, false)?;
    let limit = limit.unwrap_or(config.settings().observability.report_limit);
    let recorder = Recorder::new(&config.observability_dir);
    let runs = recorder.runs(Some(limit))?;
    let flakes = recorder.flakes(Some(limit))?;
    let summary = ObservabilitySummary::build(&runs, &flakes);

    println!();
    println!("Gate Observability (last {})", limit);
    println!("===========================");
    println!(
        "Runs: {}  passed: {}  failed: {}  avg: {}",
        summary.runs,
        summary.runs_passed,
        summary.runs_failed,
        format_duration(summary.average_duration_ms)
    );
    if let Some((stage, count)) = &summary.most_failed_stage {
        println!("Most failed stage: {} ({}x)", stage, count);
    }
    println!(
        "Flake runs: {}  failed: {}  flaky tests: {}",
        summary.flake_runs, summary.flake_runs_failed, summary.flaky_tests
    );
    println!();

    if runs.is_empty() {
        println!("No runs recorded yet.");
    }
    for run in &runs {
        let state = if run.passed() { "PASS" } else { "FAIL" };
        let slowest = run
            .slowest_stage
            .as_ref()
            .map(|s| format!("{} ({})", s.command, format_duration(s.duration_ms)))
            .unwrap_or_else(|| "n/a".to_string());
        println!(
            "- {} {:<18} {} {}/{} in {}; slowest {}",
            run.started_at.format("%Y-%m-%d %H:%M"),
            run.mode,
            state,
            run.passed_stages,
            run.total_stages,
            format_duration(run.duration_ms),
            slowest
        );
        if !run.failed_stages.is_empty() {
            println!("    failed: {}", run.failed_stages.join(", "));
        }
    }
    for flake in &flakes {
        println!(
            "- {} {:<18} {:?} passed {} failed {} flaky {}",
            flake.started_at.format("%Y-%m-%d %H:%M"),
            flake.suite,
            flake.outcome,
            flake.counts.passed,
            flake.counts.failed,
            flake.counts.flaky
        );
    }
    println!();
    Ok(())
}

pub fn cmd_retention(project_dir: &Path, cli: &Cli, command: RetentionCommands) -> Result<()> {
    use dialoguer::Confirm;

    let config = Config::load(project_dir, cli.verbose)?;
    let plan = retention::plan(&config)?;
    let policy = &config.settings().retention;

    println!();
    println!(
        "Retention policy: keep {} failed run(s), {} snapshot(s); passed runs are kept",
        policy.keep_failed_runs, policy.keep_snapshots
    );
    println!("  passed runs kept : {}", plan.passed_runs.len());
    println!("  failed runs kept : {}", plan.keep_failed.len());
    for run in &plan.delete_failed {
        println!("  delete run       : {}", run.name);
    }
    for entry in &plan.delete_snapshots {
        println!("  delete snapshot  : {}", entry.id);
    }
    println!();

    if plan.is_noop() {
        println!("Nothing to remove.");
        return Ok(());
    }

    match command {
        RetentionCommands::Preview => {
            println!("Preview only. Run 'gatehouse retention apply' to remove.");
        }
        RetentionCommands::Apply => {
            if !cli.yes {
                let confirm = Confirm::new()
                    .with_prompt("Remove the listed runs and snapshots?")
                    .default(false)
                    .interact()
                    .unwrap_or(false);

                if !confirm {
                    println!("Retention cancelled");
                    return Ok(());
                }
            }
            let summary = retention::apply(&config, &plan)?;
            println!(
                "Removed {} run(s) and {} snapshot(s).",
                summary.runs_removed, summary.snapshots_removed
            );
        }
    }
    Ok(())
}
