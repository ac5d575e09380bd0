//! Run history and flake history.
//!
//! Every gate run appends exactly one [`RunRecord`] to
//! `observability/runs.jsonl`, whether it passed or failed. Flake-suite runs
//! append a [`FlakeRecord`] to `observability/flake-runs.jsonl`.

pub mod report;

use crate::errors::GateResult;
use crate::stage::{StageResult, StageStatus};
use crate::store::{JsonlStore, RecordStore};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;
use uuid::Uuid;

pub use report::ObservabilitySummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    Passed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlowestStage {
    pub command: String,
    pub duration_ms: u64,
}

/// One gate run, success or failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: Uuid,
    pub mode: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub outcome: RunOutcome,
    /// Stages planned for this run (executed or not)
    pub total_stages: usize,
    pub passed_stages: usize,
    pub failed_stages: Vec<String>,
    pub slowest_stage: Option<SlowestStage>,
    /// Workspace-relative stage log directory
    pub log_dir: Option<String>,
    #[serde(default)]
    pub stages: Vec<StageResult>,
}

impl RunRecord {
    /// Summarise executed stage results into a record.
    ///
    /// # Arguments
    /// * `planned` - number of stages the run intended to execute
    /// * `results` - executed stages in canonical order
    pub fn from_results(
        mode: &str,
        started_at: DateTime<Utc>,
        planned: usize,
        results: &[StageResult],
        log_dir: Option<String>,
    ) -> Self {
        let finished_at = Utc::now();
        let duration_ms = (finished_at - started_at).num_milliseconds().max(0) as u64;
        let failed_stages: Vec<String> = results
            .iter()
            .filter(|r| r.status == StageStatus::Failed)
            .map(|r| r.command.clone())
            .collect();
        let passed_stages = results.iter().filter(|r| r.passed()).count();
        let outcome = if failed_stages.is_empty() && passed_stages == planned {
            RunOutcome::Passed
        } else {
            RunOutcome::Failed
        };
        let slowest_stage = crate::ui::render::slowest(results).map(|s| SlowestStage {
            command: s.command.clone(),
            duration_ms: s.duration_ms,
        });

        Self {
            id: Uuid::new_v4(),
            mode: mode.to_string(),
            started_at,
            finished_at,
            duration_ms,
            outcome,
            total_stages: planned,
            passed_stages,
            failed_stages,
            slowest_stage,
            log_dir,
            stages: results.to_vec(),
        }
    }

    pub fn passed(&self) -> bool {
        self.outcome == RunOutcome::Passed
    }
}

/// Counts extracted from a flake-suite run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlakeCounts {
    pub passed: u32,
    pub failed: u32,
    pub flaky: u32,
    pub skipped: u32,
}

static COUNT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?mi)^\s*(\d+)\s+(passed|failed|flaky|skipped)\b").unwrap());

impl FlakeCounts {
    /// Read reporter summary lines such as `12 passed (30s)` or `1 flaky`.
    pub fn parse(output: &str) -> Self {
        let mut counts = Self::default();
        let cleaned = crate::util::strip_ansi(output);
        for caps in COUNT_LINE.captures_iter(&cleaned) {
            let n: u32 = caps[1].parse().unwrap_or(0);
            match caps[2].to_lowercase().as_str() {
                "passed" => counts.passed += n,
                "failed" => counts.failed += n,
                "flaky" => counts.flaky += n,
                _ => counts.skipped += n,
            }
        }
        counts
    }
}

/// One run of the high-value regression suite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlakeRecord {
    pub id: Uuid,
    pub suite: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub outcome: RunOutcome,
    pub exit_code: i32,
    pub counts: FlakeCounts,
}

/// Writes and reads the two history ledgers.
pub struct Recorder {
    runs: JsonlStore<RunRecord>,
    flakes: JsonlStore<FlakeRecord>,
}

impl Recorder {
    pub fn new(observability_dir: &Path) -> Self {
        Self {
            runs: JsonlStore::new(observability_dir.join("runs.jsonl")),
            flakes: JsonlStore::new(observability_dir.join("flake-runs.jsonl")),
        }
    }

    pub fn record_run(&self, record: &RunRecord) -> GateResult<()> {
        tracing::info!(
            mode = %record.mode,
            outcome = ?record.outcome,
            passed = record.passed_stages,
            total = record.total_stages,
            "Recording run"
        );
        self.runs.append(record)
    }

    pub fn record_flake(&self, record: &FlakeRecord) -> GateResult<()> {
        self.flakes.append(record)
    }

    /// Newest run records first.
    pub fn runs(&self, limit: Option<usize>) -> GateResult<Vec<RunRecord>> {
        self.runs.list(limit)
    }

    pub fn flakes(&self, limit: Option<usize>) -> GateResult<Vec<FlakeRecord>> {
        self.flakes.list(limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn stage(command: &str, status: StageStatus, ms: u64) -> StageResult {
        StageResult {
            command: command.to_string(),
            label: command.to_string(),
            sequence_index: 0,
            status,
            duration_ms: ms,
            log_path: None,
        }
    }

    #[test]
    fn test_record_from_passing_results() {
        let results = vec![
            stage("a", StageStatus::Passed, 10),
            stage("b", StageStatus::Passed, 30),
        ];
        let record = RunRecord::from_results("full", Utc::now(), 2, &results, None);
        assert!(record.passed());
        assert_eq!(record.passed_stages, 2);
        assert!(record.failed_stages.is_empty());
        assert_eq!(record.slowest_stage.unwrap().command, "b");
    }

    #[test]
    fn test_record_from_failed_run() {
        let results = vec![
            stage("a", StageStatus::Passed, 10),
            stage("b", StageStatus::Failed, 5),
        ];
        let record = RunRecord::from_results("full", Utc::now(), 5, &results, None);
        assert_eq!(record.outcome, RunOutcome::Failed);
        assert_eq!(record.failed_stages, vec!["b"]);
        assert_eq!(record.total_stages, 5);
    }

    #[test]
    fn test_record_with_unexecuted_stages_is_failed() {
        let results = vec![stage("a", StageStatus::Passed, 10)];
        let record = RunRecord::from_results("full", Utc::now(), 3, &results, None);
        assert_eq!(record.outcome, RunOutcome::Failed);
    }

    #[test]
    fn test_flake_counts_parse() {
        let output = "Running 9 tests\n\x1b[32m  7 passed\x1b[0m (12.1s)\n  1 flaky\n  1 failed\n";
        let counts = FlakeCounts::parse(output);
        assert_eq!(
            counts,
            FlakeCounts {
                passed: 7,
                failed: 1,
                flaky: 1,
                skipped: 0
            }
        );
    }

    #[test]
    fn test_recorder_round_trip() {
        let dir = tempdir().unwrap();
        let recorder = Recorder::new(dir.path());
        let record = RunRecord::from_results("smart", Utc::now(), 0, &[], None);
        recorder.record_run(&record).unwrap();
        recorder.record_run(&record).unwrap();
        assert_eq!(recorder.runs(None).unwrap().len(), 2);
        assert!(dir.path().join("runs.jsonl").exists());
        assert!(recorder.flakes(None).unwrap().is_empty());
    }
}
