//! Retention for stage-log runs and guardian snapshots.
//!
//! Passed runs are never deleted. Failed runs (any `-fail.log`, or fewer
//! pass logs than the canonical pipeline) beyond the newest
//! `keep_failed_runs` are removed, and the snapshot index is cut to the
//! newest `keep_snapshots`. `preview` computes the same plan without
//! touching anything.

use crate::config::Config;
use crate::errors::{GateError, GateResult};
use crate::guardian::{SnapshotEntry, SnapshotManager, fsops};
use crate::pipeline::logs::RUN_DIR_PREFIX;
use std::fs;
use std::path::PathBuf;
use std::time::SystemTime;

#[derive(Debug, Clone)]
pub struct RunDir {
    pub name: String,
    pub path: PathBuf,
    pub modified: SystemTime,
    pub pass_logs: usize,
    pub fail_logs: usize,
}

impl RunDir {
    pub fn failed(&self, expected_stages: usize) -> bool {
        self.fail_logs > 0 || self.pass_logs < expected_stages
    }
}

#[derive(Debug, Clone, Default)]
pub struct RetentionPlan {
    pub passed_runs: Vec<RunDir>,
    pub keep_failed: Vec<RunDir>,
    pub delete_failed: Vec<RunDir>,
    pub keep_snapshots: Vec<SnapshotEntry>,
    pub delete_snapshots: Vec<SnapshotEntry>,
}

impl RetentionPlan {
    pub fn is_noop(&self) -> bool {
        self.delete_failed.is_empty() && self.delete_snapshots.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RetentionSummary {
    pub runs_removed: usize,
    pub snapshots_removed: usize,
}

fn scan_runs(config: &Config) -> GateResult<Vec<RunDir>> {
    let entries = match fs::read_dir(&config.reports_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(GateError::filesystem(&config.reports_dir, e)),
    };

    let mut runs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| GateError::filesystem(&config.reports_dir, e))?;
        let name = entry.file_name().to_string_lossy().to_string();
        let path = entry.path();
        if !name.starts_with(RUN_DIR_PREFIX) || !path.is_dir() {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let mut pass_logs = 0;
        let mut fail_logs = 0;
        let logs = fs::read_dir(&path).map_err(|e| GateError::filesystem(&path, e))?;
        for log in logs.flatten() {
            let log_name = log.file_name().to_string_lossy().to_string();
            if log_name.ends_with("-pass.log") {
                pass_logs += 1;
            } else if log_name.ends_with("-fail.log") {
                fail_logs += 1;
            }
        }
        runs.push(RunDir {
            name,
            path,
            modified,
            pass_logs,
            fail_logs,
        });
    }
    // newest first; names embed creation millis
    runs.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| b.name.cmp(&a.name)));
    Ok(runs)
}

/// Work out what `apply` would delete.
pub fn plan(config: &Config) -> GateResult<RetentionPlan> {
    let settings = &config.settings().retention;
    let expected = config.pipeline.len();
    let mut plan = RetentionPlan::default();

    for run in scan_runs(config)? {
        if !run.failed(expected) {
            plan.passed_runs.push(run);
        } else if plan.keep_failed.len() < settings.keep_failed_runs {
            plan.keep_failed.push(run);
        } else {
            plan.delete_failed.push(run);
        }
    }

    let mut snapshots = SnapshotManager::new(config).list(None)?;
    let keep = settings.keep_snapshots.min(snapshots.len());
    plan.delete_snapshots = snapshots.split_off(keep);
    plan.keep_snapshots = snapshots;
    Ok(plan)
}

/// Delete what `plan` selected.
pub fn apply(config: &Config, plan: &RetentionPlan) -> GateResult<RetentionSummary> {
    let mut summary = RetentionSummary::default();
    for run in &plan.delete_failed {
        fsops::remove_path(&run.path).map_err(|e| GateError::filesystem(&run.path, e))?;
        tracing::info!(run = %run.name, "Removed failed run logs");
        summary.runs_removed += 1;
    }
    if !plan.delete_snapshots.is_empty() {
        let removed = SnapshotManager::new(config).prune_to(plan.keep_snapshots.len())?;
        summary.snapshots_removed = removed.len();
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate_config::{GateToml, StageToml};
    use std::path::Path;
    use tempfile::tempdir;

    fn config(root: &Path) -> Config {
        let mut settings = GateToml::default();
        settings.stages = ["a", "b"]
            .iter()
            .map(|n| StageToml {
                command: n.to_string(),
                label: n.to_string(),
                exec: None,
            })
            .collect();
        settings.snapshots.targets = vec!["assets".into()];
        Config::from_toml(root.to_path_buf(), settings, false).unwrap()
    }

    fn run(config: &Config, name: &str, logs: &[&str]) {
        let dir = config.reports_dir.join(name);
        fs::create_dir_all(&dir).unwrap();
        for log in logs {
            fs::write(dir.join(log), "").unwrap();
        }
        // keep mtimes ordered by creation
        std::thread::sleep(std::time::Duration::from_millis(15));
    }

    #[test]
    fn test_plan_keeps_passed_and_newest_failed() {
        let dir = tempdir().unwrap();
        let config = config(dir.path());
        run(&config, "run-1-full", &["01-a-pass.log", "02-b-fail.log"]);
        run(&config, "run-2-full", &["01-a-pass.log", "02-b-pass.log"]);
        run(&config, "run-3-check", &["01-a-pass.log"]);
        run(&config, "run-4-full", &["01-a-fail.log"]);

        let plan = plan(&config).unwrap();
        let names = |runs: &[RunDir]| runs.iter().map(|r| r.name.clone()).collect::<Vec<_>>();
        assert_eq!(names(&plan.passed_runs), vec!["run-2-full"]);
        assert_eq!(names(&plan.keep_failed), vec!["run-4-full"]);
        assert_eq!(names(&plan.delete_failed), vec!["run-3-check", "run-1-full"]);
    }

    #[test]
    fn test_preview_does_not_delete_and_apply_does() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("assets")).unwrap();
        let config = config(dir.path());
        run(&config, "run-1-full", &["01-a-fail.log"]);
        run(&config, "run-2-full", &["01-a-fail.log"]);
        let manager = SnapshotManager::new(&config);
        for i in 0..4 {
            manager.create(&format!("s{}", i), "manual").unwrap();
        }

        let preview = plan(&config).unwrap();
        assert_eq!(preview.delete_failed.len(), 1);
        assert_eq!(preview.delete_snapshots.len(), 2);
        assert!(config.reports_dir.join("run-1-full").exists());

        let summary = apply(&config, &preview).unwrap();
        assert_eq!(summary.runs_removed, 1);
        assert_eq!(summary.snapshots_removed, 2);
        assert!(!config.reports_dir.join("run-1-full").exists());
        assert!(config.reports_dir.join("run-2-full").exists());
        assert_eq!(manager.list(None).unwrap().len(), 2);
        assert!(plan(&config).unwrap().is_noop());
    }

    #[test]
    fn test_empty_workspace_plan() {
        let dir = tempdir().unwrap();
        let config = config(dir.path());
        assert!(plan(&config).unwrap().is_noop());
    }
}
