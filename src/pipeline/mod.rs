//! Gate run modes and the plans they execute.
//!
//! | Mode                | Plan                                              |
//! |---------------------|---------------------------------------------------|
//! | `full`              | canonical pipeline, optionally bounded            |
//! | `resume`            | canonical pipeline from the recorded failure      |
//! | `retry-last-failed` | the recorded failing stage only                   |
//! | `smart`             | core verification stages plus one E2E lane        |
//! | `parallel`          | sequential head, then two concurrent branches     |
//! | `guardian`          | full pipeline wrapped in snapshot and rollback    |
//! | `check`             | configured core checks only                       |

pub mod executor;
pub mod guardian;
pub mod logs;
pub mod parallel;
pub mod session;

pub use executor::{PlannedStage, SequenceOutcome, StageExecutor};
pub use guardian::GuardianRun;
pub use parallel::ParallelPlan;
pub use session::{GateSession, RunReport};

use crate::config::Config;
use crate::errors::{GateError, GateResult};
use crate::rescue::report::last_failed_stage;
use crate::stage::StageDefinition;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Full,
    Resume,
    RetryLastFailed,
    Smart,
    Parallel,
    Guardian,
    Check,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Full => "full",
            RunMode::Resume => "resume",
            RunMode::RetryLastFailed => "retry-last-failed",
            RunMode::Smart => "smart",
            RunMode::Parallel => "parallel",
            RunMode::Guardian => "guardian",
            RunMode::Check => "check",
        }
    }
}

/// Canonical pipeline between two optional stage names (inclusive).
pub fn full_plan(
    config: &Config,
    from: Option<&str>,
    until: Option<&str>,
) -> GateResult<Vec<StageDefinition>> {
    config.pipeline.bounded(from, until)
}

fn recorded_failure(config: &Config) -> GateResult<String> {
    last_failed_stage(&config.journal).ok_or_else(|| {
        GateError::InvalidInput(format!(
            "no recorded failing stage in {}; run a gate first",
            config.relative(&config.journal.fix_request)
        ))
    })
}

/// Canonical pipeline starting at the stage named in the last fix request.
pub fn resume_plan(config: &Config) -> GateResult<Vec<StageDefinition>> {
    let stage = recorded_failure(config)?;
    tracing::info!(stage = %stage, "Resuming from recorded failure");
    config.pipeline.bounded(Some(&stage), None)
}

/// Just the stage named in the last fix request, resolved the way `rescue`
/// resolves it so manifest-only scripts can be retried too.
pub fn retry_plan(config: &Config) -> GateResult<Vec<StageDefinition>> {
    let stage = recorded_failure(config)?;
    Ok(vec![crate::rescue::resolve(config, &stage)?])
}

/// The configured core verification checks.
pub fn check_plan(config: &Config) -> GateResult<Vec<StageDefinition>> {
    config.pipeline.select(&config.settings().check.stages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StageFailure;
    use crate::pipeline::executor::tests::test_config;
    use crate::rescue::report::FixRequest;
    use crate::runner::ExitOutcome;

    fn record_failure(config: &Config, stage: &str) {
        let failure = StageFailure {
            command: stage.to_string(),
            label: stage.to_string(),
            reproduce: format!("npm run {}", stage),
            outcome: ExitOutcome::Code(1),
            stdout: String::new(),
            stderr: "x".to_string(),
        };
        FixRequest::from_failure(&failure, "full")
            .write(&config.journal, 4000)
            .unwrap();
    }

    fn names(plan: &[StageDefinition]) -> Vec<&str> {
        plan.iter().map(|s| s.command.as_str()).collect()
    }

    #[test]
    fn test_resume_starts_at_recorded_stage() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), &["a", "b", "c", "d"]);
        record_failure(&config, "c");
        assert_eq!(names(&resume_plan(&config).unwrap()), vec!["c", "d"]);
        assert_eq!(names(&retry_plan(&config).unwrap()), vec!["c"]);
    }

    #[test]
    fn test_resume_without_record_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), &["a"]);
        assert!(matches!(
            resume_plan(&config),
            Err(GateError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_full_plan_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), &["a", "b", "c", "d"]);
        let plan = full_plan(&config, Some("b"), Some("c")).unwrap();
        assert_eq!(names(&plan), vec!["b", "c"]);
        assert!(matches!(
            full_plan(&config, Some("zz"), None),
            Err(GateError::UnknownStage { .. })
        ));
    }

    #[test]
    fn test_mode_names() {
        assert_eq!(RunMode::RetryLastFailed.as_str(), "retry-last-failed");
        assert_eq!(RunMode::Guardian.as_str(), "guardian");
    }
}
