//! `doctor` and `status`: read-only workspace health checks.

use crate::config::Config;
use crate::errors::{GateError, GateResult};
use crate::gate_config::CONFIG_FILE;
use crate::guardian::SnapshotManager;
use crate::observability::{Recorder, RunRecord};
use crate::rescue::last_failed_stage;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;

#[derive(Debug, Deserialize)]
struct ScriptManifest {
    #[serde(default)]
    scripts: BTreeMap<String, serde_json::Value>,
}

/// Script names declared by the configured script manifest.
///
/// `None` when no manifest is configured or the file does not exist.
pub fn manifest_scripts(config: &Config) -> GateResult<Option<BTreeSet<String>>> {
    let Some(ref name) = config.settings().doctor.script_manifest else {
        return Ok(None);
    };
    let path = config.project_dir.join(name);
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(GateError::filesystem(&path, e)),
    };
    let manifest: ScriptManifest =
        serde_json::from_str(&raw).map_err(|source| GateError::Json { path, source })?;
    Ok(Some(manifest.scripts.into_keys().collect()))
}

/// One labelled check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    pub label: String,
    pub ok: bool,
    pub detail: Option<String>,
}

impl Check {
    fn new(label: impl Into<String>, ok: bool) -> Self {
        Self {
            label: label.into(),
            ok,
            detail: None,
        }
    }

    fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// `- label: OK` / `- label: MISSING (detail)`
    pub fn line(&self) -> String {
        let state = if self.ok { "OK" } else { "MISSING" };
        match self.detail {
            Some(ref detail) => format!("- {}: {} ({})", self.label, state, detail),
            None => format!("- {}: {}", self.label, state),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DoctorReport {
    pub checks: Vec<Check>,
}

impl DoctorReport {
    pub fn issues(&self) -> Vec<String> {
        self.checks
            .iter()
            .filter(|c| !c.ok)
            .map(|c| match c.detail {
                Some(ref detail) => format!("{}: {}", c.label, detail),
                None => c.label.clone(),
            })
            .collect()
    }

    /// `Ok` when every check passed, otherwise the issue list.
    pub fn into_result(self) -> GateResult<Self> {
        let issues = self.issues();
        if issues.is_empty() {
            Ok(self)
        } else {
            Err(GateError::Verification { issues })
        }
    }
}

fn path_check(config: &Config, label: &str, path: &std::path::Path) -> Check {
    Check::new(label, path.exists()).with_detail(config.relative(path))
}

/// Run every doctor check. Never fails on its own; problems become checks.
pub fn doctor(config: &Config) -> DoctorReport {
    let mut checks = vec![
        path_check(config, "journal root", &config.journal.root),
        path_check(config, "decisions log", &config.journal.decisions),
        path_check(config, "error catalog", &config.journal.errors),
    ];

    let config_file = config.state_dir.join(CONFIG_FILE);
    checks.push(if config_file.exists() {
        Check::new("config", true).with_detail(config.relative(&config_file))
    } else {
        Check::new("config", true).with_detail("defaults")
    });

    match manifest_scripts(config) {
        Ok(Some(scripts)) => {
            for stage in config
                .pipeline
                .stages()
                .iter()
                .chain(config.pipeline.auxiliary())
                .filter(|s| s.exec.is_none())
            {
                checks.push(Check::new(
                    format!("script {}", stage.command),
                    scripts.contains(&stage.command),
                ));
            }
            for name in &config.settings().doctor.required_scripts {
                checks.push(Check::new(format!("script {}", name), scripts.contains(name)));
            }
        }
        Ok(None) => {
            if let Some(ref name) = config.settings().doctor.script_manifest {
                let needs_manifest = config
                    .pipeline
                    .stages()
                    .iter()
                    .any(|s| s.exec.is_none())
                    || !config.settings().doctor.required_scripts.is_empty();
                checks.push(Check::new("script manifest", !needs_manifest).with_detail(name.clone()));
            }
        }
        Err(e) => checks.push(Check::new("script manifest", false).with_detail(e.to_string())),
    }

    let snapshots = SnapshotManager::new(config);
    checks.push(match snapshots.verify("latest") {
        Ok(reports) => {
            let report = &reports[0];
            let check = Check::new("latest snapshot", report.ok());
            if report.ok() {
                check.with_detail(report.id.clone())
            } else {
                check.with_detail(format!("{}: {}", report.id, report.issues.join("; ")))
            }
        }
        Err(GateError::NoSnapshots) => Check::new("latest snapshot", true).with_detail("none yet"),
        Err(e) => Check::new("latest snapshot", false).with_detail(e.to_string()),
    });

    DoctorReport { checks }
}

/// Workspace summary printed by `status`.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub checks: Vec<Check>,
    pub latest_snapshot: Option<String>,
    pub last_failure: Option<String>,
    pub last_run: Option<RunRecord>,
}

pub fn status(config: &Config) -> GateResult<StatusReport> {
    let checks = vec![
        path_check(config, "config", &config.state_dir.join(CONFIG_FILE)),
        path_check(config, "stage logs", &config.reports_dir),
        path_check(config, "snapshots", &config.snapshots_dir),
        path_check(config, "run history", &config.observability_dir),
        path_check(config, "journal", &config.journal.root),
    ];
    let latest_snapshot = SnapshotManager::new(config)
        .list(Some(1))?
        .into_iter()
        .next()
        .map(|e| e.id);
    let last_run = Recorder::new(&config.observability_dir)
        .runs(Some(1))?
        .into_iter()
        .next();
    Ok(StatusReport {
        checks,
        latest_snapshot,
        last_failure: last_failed_stage(&config.journal),
        last_run,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate_config::{GateToml, StageToml};
    use std::path::Path;
    use tempfile::tempdir;

    fn config(root: &Path, stages: Vec<StageToml>) -> Config {
        let mut settings = GateToml::default();
        settings.stages = stages;
        settings.auxiliary.clear();
        settings.snapshots.targets = vec!["assets".into()];
        Config::from_toml(root.to_path_buf(), settings, false).unwrap()
    }

    fn stage(command: &str, exec: Option<&str>) -> StageToml {
        StageToml {
            command: command.into(),
            label: command.into(),
            exec: exec.map(str::to_string),
        }
    }

    fn journal(root: &Path) {
        fs::create_dir_all(root.join("docs/ai-memory")).unwrap();
        fs::write(root.join("docs/ai-memory/decisions.md"), "").unwrap();
        fs::write(root.join("docs/ai-memory/error-catalog.md"), "").unwrap();
    }

    #[test]
    fn test_doctor_ready_with_exec_stages() {
        let dir = tempdir().unwrap();
        journal(dir.path());
        let config = config(dir.path(), vec![stage("lint", Some("true"))]);
        let report = doctor(&config);
        assert!(report.issues().is_empty(), "{:?}", report.issues());
        assert!(report.into_result().is_ok());
    }

    #[test]
    fn test_doctor_flags_missing_journal_and_scripts() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("package.json"),
            r#"{"scripts": {"lint": "eslint ."}}"#,
        )
        .unwrap();
        let config = config(dir.path(), vec![stage("lint", None), stage("unit", None)]);
        let report = doctor(&config);
        let issues = report.issues();
        assert!(issues.iter().any(|i| i.starts_with("journal root")));
        assert!(issues.contains(&"script unit".to_string()));
        assert!(!issues.contains(&"script lint".to_string()));
        let err = report.into_result().unwrap_err();
        assert!(matches!(err, GateError::Verification { .. }));
    }

    #[test]
    fn test_doctor_missing_manifest_when_needed() {
        let dir = tempdir().unwrap();
        journal(dir.path());
        let config = config(dir.path(), vec![stage("lint", None)]);
        let issues = doctor(&config).issues();
        assert_eq!(issues, vec!["script manifest: package.json"]);
    }

    #[test]
    fn test_doctor_flags_broken_snapshot() {
        let dir = tempdir().unwrap();
        journal(dir.path());
        fs::create_dir_all(dir.path().join("assets")).unwrap();
        fs::write(dir.path().join("assets/a.js"), "a").unwrap();
        let config = config(dir.path(), vec![stage("lint", Some("true"))]);
        let entry = SnapshotManager::new(&config).create("x", "manual").unwrap();
        fs::remove_dir_all(config.snapshots_dir.join(&entry.id).join("payload")).unwrap();
        let issues = doctor(&config).issues();
        assert!(issues[0].starts_with("latest snapshot"));
    }

    #[test]
    fn test_check_line_format() {
        assert_eq!(Check::new("journal root", true).line(), "- journal root: OK");
        assert_eq!(
            Check::new("script unit", false).with_detail("x").line(),
            "- script unit: MISSING (x)"
        );
    }

    #[test]
    fn test_status_reports_latest_snapshot() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("assets")).unwrap();
        let config = config(dir.path(), vec![stage("lint", Some("true"))]);
        assert!(status(&config).unwrap().latest_snapshot.is_none());
        let entry = SnapshotManager::new(&config).create("x", "manual").unwrap();
        let report = status(&config).unwrap();
        assert_eq!(report.latest_snapshot, Some(entry.id));
        assert!(report.last_failure.is_none());
    }
}
