//! Sequential head, then two concurrent tail branches.
//!
//! Both branches run inside the same task through `tokio::join!`. Each is
//! sequential and stops at its own first failure; neither waits for the
//! other. Results from the head and both branches are merged back into
//! canonical order before the session prints the timeline.

use crate::config::Config;
use crate::errors::{GateError, GateResult, StageFailure};
use crate::pipeline::executor::{PlannedStage, SequenceOutcome, StageExecutor};
use crate::pipeline::logs::StageLogRun;
use crate::stage::StageDefinition;
use std::collections::HashSet;
use tokio::sync::Mutex;

/// A validated parallel schedule over the canonical pipeline.
#[derive(Debug, Clone)]
pub struct ParallelPlan {
    pub head: Vec<PlannedStage>,
    pub branch_a: Vec<PlannedStage>,
    pub branch_b: Vec<PlannedStage>,
    total: usize,
}

fn canonical(stage: &StageDefinition) -> PlannedStage {
    PlannedStage {
        position: stage.sequence_index + 1,
        stage: stage.clone(),
    }
}

impl ParallelPlan {
    /// Build the schedule from `[parallel]`, rejecting branch layouts that
    /// overlap, name unknown stages or leave part of the tail unscheduled.
    pub fn from_config(config: &Config) -> GateResult<Self> {
        let settings = &config.settings().parallel;
        let stages = config.pipeline.stages();
        if settings.head > stages.len() {
            return Err(GateError::Configuration(format!(
                "parallel head of {} exceeds the {} pipeline stages",
                settings.head,
                stages.len()
            )));
        }

        let resolve = |names: &[String]| -> GateResult<Vec<PlannedStage>> {
            names
                .iter()
                .map(|name| config.pipeline.index_of(name).map(|i| canonical(&stages[i])))
                .collect()
        };
        let branch_a = resolve(&settings.branch_a)?;
        let branch_b = resolve(&settings.branch_b)?;

        let mut seen = HashSet::new();
        for planned in branch_a.iter().chain(branch_b.iter()) {
            let name = planned.stage.command.as_str();
            if !seen.insert(name) {
                return Err(GateError::Configuration(format!(
                    "stage '{}' is scheduled more than once across parallel branches",
                    name
                )));
            }
            if planned.stage.sequence_index < settings.head {
                return Err(GateError::Configuration(format!(
                    "stage '{}' belongs to the sequential head and cannot run in a branch",
                    name
                )));
            }
        }

        let missing: Vec<&str> = stages[settings.head..]
            .iter()
            .map(|s| s.command.as_str())
            .filter(|name| !seen.contains(name))
            .collect();
        if !missing.is_empty() {
            return Err(GateError::Configuration(format!(
                "parallel branches do not cover: {}",
                missing.join(", ")
            )));
        }

        Ok(Self {
            head: stages[..settings.head].iter().map(canonical).collect(),
            branch_a,
            branch_b,
            total: stages.len(),
        })
    }

    /// Number of stages in the schedule.
    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Run the head, then both branches concurrently.
    ///
    /// A head failure returns immediately without starting the branches. When
    /// a branch fails, both branches still finish and are merged; the failure
    /// reported is the first one detected.
    pub async fn execute(
        &self,
        executor: &StageExecutor,
        logs: Option<&StageLogRun>,
    ) -> SequenceOutcome {
        let head = executor.run_sequence(&self.head, self.total, logs).await;
        if head.failure.is_some() {
            return head;
        }

        let first_failure: Mutex<Option<StageFailure>> = Mutex::new(None);
        let branch = |name: &'static str, plan: &[PlannedStage]| {
            let first_failure = &first_failure;
            let plan = plan.to_vec();
            async move {
                let outcome = executor.run_sequence(&plan, self.total, logs).await;
                if let Some(ref failure) = outcome.failure {
                    tracing::warn!(branch = name, stage = %failure.command, "Parallel branch failed");
                    let mut slot = first_failure.lock().await;
                    if slot.is_none() {
                        *slot = Some(failure.clone());
                    }
                }
                outcome.results
            }
        };
        let (results_a, results_b) = tokio::join!(
            branch("a", &self.branch_a),
            branch("b", &self.branch_b)
        );

        let mut results = head.results;
        results.extend(results_a);
        results.extend(results_b);
        results.sort_by_key(|r| r.sequence_index);

        SequenceOutcome {
            results,
            failure: first_failure.into_inner(),
        }
    }
}
