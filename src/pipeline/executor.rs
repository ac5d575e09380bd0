//! Stop-on-first-failure stage execution.
//!
//! The executor runs an ordered slice of stages through the [`ProcessRunner`]
//! port, writes one log artifact per stage, prints start/end lines and a
//! digest, and stops at the first failure. It never raises: the failure is
//! handed back so the session can print the timeline and record the run
//! before propagating it.

use crate::config::Config;
use crate::errors::StageFailure;
use crate::pipeline::logs::StageLogRun;
use crate::runner::progress::ProgressTracker;
use crate::runner::{ProcessEvent, ProcessOutput, ProcessRunner};
use crate::stage::{StageDefinition, StageResult, StageStatus};
use crate::ui::GateUI;
use std::sync::Arc;
use tokio::sync::mpsc;

/// A stage scheduled at a display position (`[NN/TT]`).
#[derive(Debug, Clone)]
pub struct PlannedStage {
    pub position: usize,
    pub stage: StageDefinition,
}

impl PlannedStage {
    /// Number stages 1..=N in the given order.
    pub fn numbered(stages: Vec<StageDefinition>) -> Vec<PlannedStage> {
        stages
            .into_iter()
            .enumerate()
            .map(|(i, stage)| PlannedStage {
                position: i + 1,
                stage,
            })
            .collect()
    }
}

/// Result of running a slice: the stages that executed, and the failure that
/// stopped it, if any.
#[derive(Debug, Clone, Default)]
pub struct SequenceOutcome {
    pub results: Vec<StageResult>,
    pub failure: Option<StageFailure>,
}

#[derive(Clone)]
pub struct StageExecutor {
    config: Arc<Config>,
    runner: Arc<dyn ProcessRunner>,
    ui: Arc<GateUI>,
}

impl StageExecutor {
    pub fn new(config: Arc<Config>, runner: Arc<dyn ProcessRunner>, ui: Arc<GateUI>) -> Self {
        Self { config, runner, ui }
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn ui(&self) -> &Arc<GateUI> {
        &self.ui
    }

    /// Launch a stage and capture its output, streaming progress when it is
    /// the designated progress stage. Prints nothing about pass/fail.
    pub async fn capture(&self, stage: &StageDefinition) -> ProcessOutput {
        let invocation = self.config.invocation(stage);
        if !self.config.is_progress_stage(stage) {
            let output = self.runner.run(&invocation, None).await;
            if self.config.verbose {
                for line in output.combined().lines() {
                    self.ui.stage_output(line);
                }
            }
            return output;
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        self.ui.live_start(&stage.label);
        let ui = Arc::clone(&self.ui);
        let consume = async move {
            let mut tracker = ProgressTracker::new();
            while let Some(event) = rx.recv().await {
                match event {
                    ProcessEvent::Stdout(line) | ProcessEvent::Stderr(line) => {
                        ui.stage_output(&line);
                        if let Some((current, total)) = tracker.observe(&line) {
                            ui.live_update(current, total);
                        }
                    }
                    ProcessEvent::Exit(_) => {}
                }
            }
        };
        let (output, ()) = tokio::join!(self.runner.run(&invocation, Some(tx)), consume);
        self.ui.live_finish();
        output
    }

    /// Run one stage end to end: execute, log, print.
    ///
    /// # Arguments
    /// * `planned` - stage and its display position
    /// * `total` - number of stages in the plan, for `[NN/TT]`
    /// * `logs` - run directory for the log artifact
    pub async fn run_stage(
        &self,
        planned: &PlannedStage,
        total: usize,
        logs: Option<&StageLogRun>,
    ) -> (StageResult, Option<StageFailure>) {
        let stage = &planned.stage;
        let position = planned.position;
        tracing::info!(stage = %stage.command, position, total, "Starting stage");
        self.ui
            .stage_start(position, total, &stage.command, &stage.label);

        let output = self.capture(stage).await;
        let passed = output.success();
        let status = if passed {
            StageStatus::Passed
        } else {
            StageStatus::Failed
        };
        let duration_ms = output.duration.as_millis() as u64;
        let combined = output.combined();

        let log_path = logs.and_then(|run| {
            match run.write(position, &stage.command, status, &combined) {
                Ok(path) => Some(path),
                Err(e) => {
                    tracing::warn!(stage = %stage.command, error = %e, "Could not write stage log");
                    self.ui.warn(format!("Stage log not written: {}", e));
                    None
                }
            }
        });
        let log_display = log_path.as_deref().map(|p| self.config.relative(p));

        self.ui
            .stage_end(position, total, &stage.command, passed, duration_ms);
        let reproduce = self.config.invocation(stage).display();
        self.ui.stage_digest(
            position,
            total,
            &stage.command,
            passed,
            &combined,
            &self.config.settings().runner.progress_stage,
            log_display.as_deref(),
            if passed { None } else { Some(reproduce.as_str()) },
        );

        let result = StageResult {
            command: stage.command.clone(),
            label: stage.label.clone(),
            sequence_index: stage.sequence_index,
            status,
            duration_ms,
            log_path,
        };

        let failure = if passed {
            tracing::info!(stage = %stage.command, duration_ms, "Stage passed");
            None
        } else {
            tracing::warn!(stage = %stage.command, outcome = %output.outcome, "Stage failed");
            Some(StageFailure {
                command: stage.command.clone(),
                label: stage.label.clone(),
                reproduce,
                outcome: output.outcome,
                stdout: output.stdout,
                stderr: output.stderr,
            })
        };
        (result, failure)
    }

    /// Run stages in order, stopping at the first failure.
    ///
    /// Stages after the failing one are neither executed nor reported.
    pub async fn run_sequence(
        &self,
        stages: &[PlannedStage],
        total: usize,
        logs: Option<&StageLogRun>,
    ) -> SequenceOutcome {
        let mut outcome = SequenceOutcome::default();
        for planned in stages {
            let (result, failure) = self.run_stage(planned, total, logs).await;
            outcome.results.push(result);
            if failure.is_some() {
                outcome.failure = failure;
                break;
            }
        }
        outcome
    }
}
