//! Workspace health commands: `doctor` and `status`.

use anyhow::Result;
use std::path::Path;

use gatehouse::config::Config;
use gatehouse::health;
use gatehouse::ui::render::format_duration;

pub fn cmd_doctor(project_dir: &Path) -> Result<()> {
    let config = Config::load(project_dir, false)?;
    let report = health::doctor(&config);

    println!();
    println!("Gatehouse Doctor");
    println!("================");
    for check in &report.checks {
        println!("{}", check.line());
    }
    let result = report.into_result();
    if result.is_ok() {
        println!("- Result: READY");
    }
    println!();
    result?;
    Ok(())
}

pub fn cmd_status(project_dir: &Path) -> Result<()> {
    let config = Config::load(project_dir, false)?;
    let report = health::status(&config)?;

    println!();
    println!("Gatehouse Status");
    println!("================");
    println!("Project: {}", config.project_dir.display());
    println!("Stages : {}", config.pipeline.len());
    for check in &report.checks {
        println!("{}", check.line());
    }
    println!(
        "Latest snapshot: {}",
        report.latest_snapshot.as_deref().unwrap_or("(none)")
    );
    println!(
        "Last failure   : {}",
        report.last_failure.as_deref().unwrap_or("(none)")
    );
    match report.last_run {
        Some(run) => println!(
            "Last run       : {} {} ({}/{} in {})",
            run.mode,
            if run.passed() { "passed" } else { "failed" },
            run.passed_stages,
            run.total_stages,
            format_duration(run.duration_ms)
        ),
        None => println!("Last run       : (none)"),
    }
    println!();
    Ok(())
}
