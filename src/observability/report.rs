//! Read-only trend summary over the history ledgers.

use super::{FlakeRecord, RunOutcome, RunRecord};
use std::collections::BTreeMap;

/// Aggregates shown by `gatehouse observability`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservabilitySummary {
    pub runs: usize,
    pub runs_passed: usize,
    pub runs_failed: usize,
    pub average_duration_ms: u64,
    /// Stage that failed most often in the window, with its count
    pub most_failed_stage: Option<(String, usize)>,
    pub flake_runs: usize,
    pub flake_runs_failed: usize,
    pub flaky_tests: u32,
}

impl ObservabilitySummary {
    pub fn build(runs: &[RunRecord], flakes: &[FlakeRecord]) -> Self {
        let runs_passed = runs.iter().filter(|r| r.outcome == RunOutcome::Passed).count();
        let total_ms: u64 = runs.iter().map(|r| r.duration_ms).sum();
        let average_duration_ms = if runs.is_empty() {
            0
        } else {
            total_ms / runs.len() as u64
        };

        let mut failures: BTreeMap<&str, usize> = BTreeMap::new();
        for run in runs {
            for stage in &run.failed_stages {
                *failures.entry(stage.as_str()).or_default() += 1;
            }
        }
        let most_failed_stage = failures
            .into_iter()
            .fold(None, |best: Option<(&str, usize)>, (stage, count)| match best {
                Some((_, top)) if top >= count => best,
                _ => Some((stage, count)),
            })
            .map(|(stage, count)| (stage.to_string(), count));

        Self {
            runs: runs.len(),
            runs_passed,
            runs_failed: runs.len() - runs_passed,
            average_duration_ms,
            most_failed_stage,
            flake_runs: flakes.len(),
            flake_runs_failed: flakes
                .iter()
                .filter(|f| f.outcome == RunOutcome::Failed)
                .count(),
            flaky_tests: flakes.iter().map(|f| f.counts.flaky).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::FlakeCounts;
    use chrono::Utc;
    use uuid::Uuid;

    fn run(outcome: RunOutcome, failed: &[&str], ms: u64) -> RunRecord {
        RunRecord {
            id: Uuid::new_v4(),
            mode: "full".to_string(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            duration_ms: ms,
            outcome,
            total_stages: 12,
            passed_stages: 0,
            failed_stages: failed.iter().map(|s| s.to_string()).collect(),
            slowest_stage: None,
            log_dir: None,
            stages: Vec::new(),
        }
    }

    #[test]
    fn test_empty_history() {
        let summary = ObservabilitySummary::build(&[], &[]);
        assert_eq!(summary, ObservabilitySummary::default());
    }

    #[test]
    fn test_totals_and_most_failed() {
        let runs = vec![
            run(RunOutcome::Passed, &[], 1000),
            run(RunOutcome::Failed, &["test"], 2000),
            run(RunOutcome::Failed, &["test"], 3000),
            run(RunOutcome::Failed, &["lint"], 2000),
        ];
        let flakes = vec![FlakeRecord {
            id: Uuid::new_v4(),
            suite: "critical".to_string(),
            started_at: Utc::now(),
            duration_ms: 10,
            outcome: RunOutcome::Failed,
            exit_code: 1,
            counts: FlakeCounts {
                passed: 3,
                failed: 1,
                flaky: 2,
                skipped: 0,
            },
        }];
        let summary = ObservabilitySummary::build(&runs, &flakes);
        assert_eq!(summary.runs, 4);
        assert_eq!(summary.runs_passed, 1);
        assert_eq!(summary.runs_failed, 3);
        assert_eq!(summary.average_duration_ms, 2000);
        assert_eq!(summary.most_failed_stage, Some(("test".to_string(), 2)));
        assert_eq!(summary.flake_runs_failed, 1);
        assert_eq!(summary.flaky_tests, 2);
    }
}
