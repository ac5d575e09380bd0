//! One gate run from intro banner to observability record.
//!
//! A session owns the parts every mode shares: the stage log directory, the
//! timeline, the run record (always appended, pass or fail), the automatic
//! fix request on failure, and the victory report on success.

use crate::config::Config;
use crate::errors::{GateError, GateResult, StageFailure};
use crate::journal::Journal;
use crate::observability::{Recorder, RunRecord};
use crate::pipeline::executor::{PlannedStage, SequenceOutcome, StageExecutor};
use crate::pipeline::logs::StageLogRun;
use crate::pipeline::parallel::ParallelPlan;
use crate::pipeline::RunMode;
use crate::rescue::report::FixRequest;
use crate::runner::ProcessRunner;
use crate::stage::{StageDefinition, StageResult};
use crate::ui::GateUI;
use chrono::Utc;
use std::sync::Arc;

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub results: Vec<StageResult>,
    pub record: RunRecord,
}

pub struct GateSession {
    executor: StageExecutor,
    recorder: Recorder,
    auto_report: bool,
}

impl GateSession {
    pub fn new(config: Arc<Config>, runner: Arc<dyn ProcessRunner>, ui: Arc<GateUI>) -> Self {
        let recorder = Recorder::new(&config.observability_dir);
        let auto_report = config.settings().rescue.auto_report;
        Self {
            executor: StageExecutor::new(config, runner, ui),
            recorder,
            auto_report,
        }
    }

    /// Enable or disable writing the fix request when a stage fails.
    pub fn with_auto_report(mut self, enabled: bool) -> Self {
        self.auto_report = enabled;
        self
    }

    pub fn executor(&self) -> &StageExecutor {
        &self.executor
    }

    fn config(&self) -> &Config {
        self.executor.config()
    }

    fn ui(&self) -> &GateUI {
        self.executor.ui()
    }

    fn open_logs(&self, mode: RunMode) -> Option<StageLogRun> {
        let config = self.config();
        match StageLogRun::create(&config.reports_dir, &config.project_dir, mode.as_str()) {
            Ok(run) => {
                self.ui().info(format!("Stage logs: {}", run.relative()));
                Some(run)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not create stage log directory");
                self.ui().warn(format!("Stage logs disabled: {}", e));
                None
            }
        }
    }

    /// Run stages in order, stopping at the first failure.
    pub async fn run_sequential(
        &self,
        mode: RunMode,
        stages: Vec<StageDefinition>,
    ) -> GateResult<RunReport> {
        let started_at = Utc::now();
        let total = stages.len();
        tracing::info!(mode = mode.as_str(), stages = total, "Starting gate run");
        self.ui().flow_intro(mode.as_str(), total);
        let logs = self.open_logs(mode);

        let plan = PlannedStage::numbered(stages);
        let outcome = self.executor.run_sequence(&plan, total, logs.as_ref()).await;
        self.finish(mode, started_at, total, outcome, logs.as_ref())
    }

    /// Run the sequential head, then both branches concurrently.
    pub async fn run_parallel(&self, plan: ParallelPlan) -> GateResult<RunReport> {
        let started_at = Utc::now();
        let total = plan.len();
        tracing::info!(
            head = plan.head.len(),
            branch_a = plan.branch_a.len(),
            branch_b = plan.branch_b.len(),
            "Starting parallel gate run"
        );
        self.ui().flow_intro(RunMode::Parallel.as_str(), total);
        let logs = self.open_logs(RunMode::Parallel);

        let outcome = plan.execute(&self.executor, logs.as_ref()).await;
        self.finish(RunMode::Parallel, started_at, total, outcome, logs.as_ref())
    }

    fn finish(
        &self,
        mode: RunMode,
        started_at: chrono::DateTime<Utc>,
        planned: usize,
        outcome: SequenceOutcome,
        logs: Option<&StageLogRun>,
    ) -> GateResult<RunReport> {
        let log_dir = logs.map(|l| l.relative().to_string());
        self.ui().timeline(&outcome.results, log_dir.as_deref());

        let record = RunRecord::from_results(
            mode.as_str(),
            started_at,
            planned,
            &outcome.results,
            log_dir.clone(),
        );
        if let Err(e) = self.recorder.record_run(&record) {
            tracing::warn!(error = %e, "Could not append run record");
            self.ui().warn(format!("Run record not saved: {}", e));
        }

        match outcome.failure {
            Some(failure) => {
                if self.auto_report {
                    self.report_failure(&failure, mode);
                }
                Err(GateError::from(failure))
            }
            None => {
                self.ui()
                    .victory(mode.as_str(), record.duration_ms, &outcome.results, log_dir.as_deref());
                Ok(RunReport {
                    results: outcome.results,
                    record,
                })
            }
        }
    }

    /// Write the fix request and note it in the error catalog. Never fails.
    pub fn report_failure(&self, failure: &StageFailure, mode: RunMode) {
        let config = self.config();
        let request = FixRequest::from_failure(failure, mode.as_str());
        match request.write(&config.journal, config.settings().rescue.max_output_chars) {
            Ok(()) => {
                let shown = config.relative(&config.journal.fix_request);
                self.ui().rescue_saved(&shown);
                Journal::new(config.journal.clone()).error_soft(&format!(
                    "{} run failed at {}; fix request written to {}",
                    mode.as_str(),
                    failure.command,
                    shown
                ));
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not write fix request");
                self.ui().warn(format!("Fix request not written: {}", e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::RunOutcome;
    use crate::pipeline::executor::tests::test_config;
    use crate::rescue::report::last_failed_stage;
    use crate::runner::testing::ScriptedRunner;

    fn session(config: Arc<Config>, runner: ScriptedRunner) -> GateSession {
        GateSession::new(config, Arc::new(runner), Arc::new(GateUI::new(false)))
    }

    #[tokio::test]
    async fn test_success_records_run() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), &["a", "b"]);
        let s = session(config.clone(), ScriptedRunner::new());
        let report = s
            .run_sequential(RunMode::Full, config.pipeline.stages().to_vec())
            .await
            .unwrap();
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.record.outcome, RunOutcome::Passed);

        let recorder = Recorder::new(&config.observability_dir);
        assert_eq!(recorder.runs(None).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_records_run_writes_fix_request_and_raises() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), &["a", "b", "c"]);
        let s = session(config.clone(), ScriptedRunner::new().fail("b", 5, "nope"));
        let err = s
            .run_sequential(RunMode::Full, config.pipeline.stages().to_vec())
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 5);
        assert_eq!(err.stage_failure().unwrap().command, "b");

        let runs = Recorder::new(&config.observability_dir).runs(None).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].failed_stages, vec!["b"]);
        assert_eq!(runs[0].total_stages, 3);
        assert_eq!(runs[0].stages.len(), 2);

        assert_eq!(last_failed_stage(&config.journal).as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_auto_report_can_be_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), &["a"]);
        let s = session(config.clone(), ScriptedRunner::new().fail("a", 1, ""))
            .with_auto_report(false);
        assert!(
            s.run_sequential(RunMode::Full, config.pipeline.stages().to_vec())
                .await
                .is_err()
        );
        assert!(!config.journal.fix_request.exists());
    }
}
