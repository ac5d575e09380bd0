//! Typed error hierarchy for the gatehouse orchestrator.
//!
//! `GateError` mirrors the failure taxonomy the commands report:
//! - `StageFailed` - an external stage exited non-zero or was signalled
//! - `Configuration` / `UnknownStage` - rejected before any stage runs
//! - `Filesystem` - snapshot, log and journal IO failures
//! - `InvalidInput` - user-supplied text or selectors that fail validation
//! - `Verification` - snapshot integrity problems, carried as an issue list

use std::path::PathBuf;

use thiserror::Error;

use crate::runner::ExitOutcome;

/// Everything the rescue path needs to describe a failed stage.
#[derive(Debug, Clone)]
pub struct StageFailure {
    pub command: String,
    pub label: String,
    /// Shell line that reproduces the failure
    pub reproduce: String,
    pub outcome: ExitOutcome,
    pub stdout: String,
    pub stderr: String,
}

impl StageFailure {
    /// Whether any output was captured before the stage died.
    pub fn has_output(&self) -> bool {
        !self.stdout.trim().is_empty() || !self.stderr.trim().is_empty()
    }
}

/// Errors raised by the gate pipeline and its supporting stores.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("Stage '{}' failed with {}", .0.command, .0.outcome)]
    StageFailed(Box<StageFailure>),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Configuration error: unknown stage '{name}'")]
    UnknownStage { name: String },

    #[error("Filesystem error at {path}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Verification failed with {} issue(s)", issues.len())]
    Verification { issues: Vec<String> },

    #[error("No guardian snapshots available")]
    NoSnapshots,

    #[error("Unknown snapshot id: {selector}")]
    SnapshotNotFound { selector: String },

    #[error("Failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type GateResult<T> = std::result::Result<T, GateError>;

impl GateError {
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GateError::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Process exit code the CLI should terminate with for this error.
    ///
    /// Stage failures propagate the stage's own code (130 for signals);
    /// everything else is an internal or configuration failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            GateError::StageFailed(failure) => failure.outcome.exit_code(),
            _ => 1,
        }
    }

    pub fn stage_failure(&self) -> Option<&StageFailure> {
        match self {
            GateError::StageFailed(failure) => Some(failure),
            _ => None,
        }
    }
}

impl From<StageFailure> for GateError {
    fn from(failure: StageFailure) -> Self {
        GateError::StageFailed(Box::new(failure))
    }
}
