//! Guardian mode: full pipeline between a pre-flight snapshot and a rollback.
//!
//! Rollback and the fix request are independently fail-soft: a broken
//! restore still leaves a fix request behind, and the original stage failure
//! is always what gets raised.

use crate::errors::{GateError, GateResult, StageFailure};
use crate::guardian::SnapshotManager;
use crate::journal::Journal;
use crate::pipeline::session::{GateSession, RunReport};
use crate::pipeline::RunMode;

pub const PREFLIGHT: &str = "guardian-preflight";
pub const SAFE: &str = "guardian-safe";

pub struct GuardianRun {
    session: GateSession,
    snapshots: SnapshotManager,
    journal: Journal,
}

impl GuardianRun {
    pub fn new(session: GateSession, snapshots: SnapshotManager) -> Self {
        let journal = Journal::new(session.executor().config().journal.clone());
        Self {
            // guardian writes its own fix request after the rollback
            session: session.with_auto_report(false),
            snapshots,
            journal,
        }
    }

    pub async fn run(&self) -> GateResult<RunReport> {
        let ui = self.session.executor().ui().clone();
        let preflight = self.snapshots.create(PREFLIGHT, PREFLIGHT)?;
        ui.info(format!("Pre-flight snapshot: {}", preflight.id));

        let stages = self.session.executor().config().pipeline.stages().to_vec();
        match self.session.run_sequential(RunMode::Guardian, stages).await {
            Ok(report) => {
                match self.snapshots.create(SAFE, SAFE) {
                    Ok(safe) => {
                        ui.success(format!("Safe snapshot: {}", safe.id));
                        self.journal
                            .note_soft(&format!("Guardian run passed; safe snapshot {}", safe.id));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Could not create safe snapshot");
                        ui.warn(format!("Safe snapshot not created: {}", e));
                    }
                }
                Ok(report)
            }
            Err(GateError::StageFailed(failure)) => {
                self.rollback(&preflight.id, &failure);
                let failure = self.ensure_output(*failure).await;
                self.session.report_failure(&failure, RunMode::Guardian);
                Err(GateError::from(failure))
            }
            Err(other) => Err(other),
        }
    }

    fn rollback(&self, snapshot_id: &str, failure: &StageFailure) {
        let ui = self.session.executor().ui();
        match self.snapshots.restore(snapshot_id, false) {
            Ok(report) => {
                ui.warn(format!(
                    "Rolled back {} target(s) to {}",
                    report.restored.len(),
                    report.id
                ));
                self.journal.error_soft(&format!(
                    "Guardian rolled back to {} after {} failed",
                    report.id, failure.command
                ));
            }
            Err(e) => {
                tracing::error!(snapshot = snapshot_id, error = %e, "Guardian rollback failed");
                ui.error(format!("Rollback failed: {}", e));
                self.journal.error_soft(&format!(
                    "Guardian rollback to {} failed after {} failed: {}",
                    snapshot_id, failure.command, e
                ));
            }
        }
    }

    /// Re-run the failing stage once when the pipeline captured nothing.
    async fn ensure_output(&self, failure: StageFailure) -> StageFailure {
        if failure.has_output() {
            return failure;
        }
        let executor = self.session.executor();
        let Some(stage) = executor.config().pipeline.find(&failure.command).cloned() else {
            return failure;
        };
        let output = executor.capture(&stage).await;
        StageFailure {
            stdout: output.stdout,
            stderr: output.stderr,
            ..failure
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::gate_config::{GateToml, StageToml};
    use crate::pipeline::executor::tests::test_config;
    use crate::runner::CommandRunner;
    use crate::rescue::report::last_failed_stage;
    use crate::runner::testing::ScriptedRunner;
    use crate::ui::GateUI;
    use std::fs;
    use std::sync::Arc;

    fn setup(runner: ScriptedRunner) -> (tempfile::TempDir, Arc<Config>, GuardianRun) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("assets")).unwrap();
        fs::write(dir.path().join("assets/app.js"), "good").unwrap();
        fs::create_dir_all(dir.path().join("docs/ai-memory")).unwrap();
        fs::write(dir.path().join("docs/ai-memory/decisions.md"), "# Decisions\n").unwrap();
        fs::write(dir.path().join("docs/ai-memory/error-catalog.md"), "# Errors\n").unwrap();

        let config = test_config(dir.path(), &["build", "verify"]);
        let session = GateSession::new(config.clone(), Arc::new(runner), Arc::new(GateUI::new(false)));
        let snapshots = SnapshotManager::with_targets(
            &config.project_dir,
            &config.snapshots_dir,
            vec!["assets".into()],
            10,
        );
        (dir, config, GuardianRun::new(session, snapshots))
    }

    #[tokio::test]
    async fn test_success_creates_safe_snapshot_and_note() {
        let (dir, _config, guardian) = setup(ScriptedRunner::new());
        guardian.run().await.unwrap();
        let snapshots = guardian.snapshots.list(None).unwrap();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].reason, SAFE);
        assert_eq!(snapshots[1].reason, PREFLIGHT);
        let decisions = fs::read_to_string(dir.path().join("docs/ai-memory/decisions.md")).unwrap();
        assert!(decisions.contains("Guardian run passed"));
    }

    #[tokio::test]
    async fn test_failure_rolls_back_and_writes_fix_request() {
        let (dir, _, _) = setup(ScriptedRunner::new());
        let mut settings = GateToml::default();
        settings.stages = vec![
            StageToml {
                command: "build".into(),
                label: "Build".into(),
                exec: Some("echo mutated > assets/app.js".into()),
            },
            StageToml {
                command: "verify".into(),
                label: "Verify".into(),
                exec: Some("echo verify broke >&2; exit 7".into()),
            },
        ];
        let root = dir.path().canonicalize().unwrap();
        let config = Arc::new(Config::from_toml(root.clone(), settings, false).unwrap());
        let session = GateSession::new(
            config.clone(),
            Arc::new(CommandRunner::new(&root)),
            Arc::new(GateUI::new(false)),
        );
        let snapshots = SnapshotManager::with_targets(
            &config.project_dir,
            &config.snapshots_dir,
            vec!["assets".into()],
            10,
        );
        let guardian = GuardianRun::new(session, snapshots);

        let err = guardian.run().await.unwrap_err();
        assert_eq!(err.exit_code(), 7);
        assert_eq!(fs::read_to_string(root.join("assets/app.js")).unwrap(), "good");
        assert_eq!(last_failed_stage(&config.journal).as_deref(), Some("verify"));
        let errors = fs::read_to_string(root.join("docs/ai-memory/error-catalog.md")).unwrap();
        assert!(errors.contains("Guardian rolled back"));
        let snapshots = guardian.snapshots.list(None).unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].reason, PREFLIGHT);
    }

    #[tokio::test]
    async fn test_failure_without_output_reruns_stage() {
        let (_dir, config, guardian) = setup(ScriptedRunner::new().fail("build", 2, ""));
        let err = guardian.run().await.unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(config.journal.fix_request.exists());
    }
}
