//! Guardian snapshot commands: `gatehouse snapshot ...`.

use anyhow::Result;
use std::path::Path;

use super::super::SnapshotCommands;
use gatehouse::config::Config;
use gatehouse::errors::GateError;
use gatehouse::guardian::SnapshotManager;

pub fn cmd_snapshot(project_dir: &Path, command: SnapshotCommands) -> Result<()> {
    let config = Config::load(project_dir, false)?;
    let manager = SnapshotManager::new(&config);

    match command {
        SnapshotCommands::Create { label } => {
            let label = if label.is_empty() {
                "manual".to_string()
            } else {
                label.join(" ")
            };
            let entry = manager.create(&label, "manual")?;
            println!("Snapshot created: {}", entry.id);
            println!("  Included: {}", entry.included_targets.len());
            if !entry.missing_targets.is_empty() {
                println!("  Missing : {}", entry.missing_targets.join(", "));
            }
            if !entry.skipped_targets.is_empty() {
                println!("  Skipped : {}", entry.skipped_targets.join(", "));
            }
        }
        SnapshotCommands::List { limit } => {
            let entries = manager.list(limit)?;
            if entries.is_empty() {
                println!("No snapshots yet. Run 'gatehouse snapshot create' to take one.");
                return Ok(());
            }
            for entry in entries {
                println!(
                    "{}  {:<20} {:<6} {}",
                    entry.id,
                    entry.reason,
                    entry.included_targets.len(),
                    entry.created_at
                );
            }
        }
        SnapshotCommands::Restore { selector, strict } => {
            let report = manager.restore(&selector, strict)?;
            println!("Restored snapshot {}", report.id);
            for target in &report.restored {
                println!("  restored {}", target);
            }
            for target in &report.skipped {
                println!("  skipped  {}", target);
            }
        }
        SnapshotCommands::Verify { selector } => {
            let selector = selector.unwrap_or_else(|| "latest".to_string());
            let reports = manager.verify(&selector)?;
            let mut issues = Vec::new();
            for report in &reports {
                if report.ok() {
                    println!("- {}: OK", report.id);
                } else {
                    println!("- {}: FAILED", report.id);
                    for issue in &report.issues {
                        println!("    {}", issue);
                        issues.push(format!("{}: {}", report.id, issue));
                    }
                }
            }
            if !issues.is_empty() {
                return Err(GateError::Verification { issues }.into());
            }
        }
        SnapshotCommands::Diff { left, right } => {
            let report = manager.diff(&left, right.as_deref())?;
            let diff = &report.diff;
            println!("Diff {} -> {}", report.left, report.right);
            println!(
                "  added: {}  removed: {}  changed: {}",
                diff.added.len(),
                diff.removed.len(),
                diff.changed.len()
            );
            for path in &diff.added {
                println!("  + {}", path);
            }
            for path in &diff.removed {
                println!("  - {}", path);
            }
            for path in &diff.changed {
                println!("  ~ {}", path);
            }
        }
    }

    Ok(())
}
