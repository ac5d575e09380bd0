//! Process runner port.
//!
//! Stages are opaque external commands. The pipeline only ever sees them
//! through [`ProcessRunner`], which returns the exit outcome together with the
//! captured stdout/stderr and can optionally stream [`ProcessEvent`]s while the
//! child is still running (used by the designated progress stage).

mod command;
pub mod progress;

#[cfg(test)]
pub mod testing;

pub use command::CommandRunner;

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

/// Exit code reported for signal-terminated stages.
pub const SIGNAL_EXIT_CODE: i32 = 130;

/// How a stage process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitOutcome {
    /// Normal exit with a status code
    Code(i32),
    /// Terminated by a signal
    Signal(i32),
    /// The process could not be started at all
    LaunchError(String),
}

impl ExitOutcome {
    pub fn success(&self) -> bool {
        matches!(self, ExitOutcome::Code(0))
    }

    /// Exit code the orchestrator propagates for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            ExitOutcome::Code(code) => *code,
            ExitOutcome::Signal(_) => SIGNAL_EXIT_CODE,
            ExitOutcome::LaunchError(_) => 1,
        }
    }

    pub(crate) fn from_status(status: std::process::ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return ExitOutcome::Code(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return ExitOutcome::Signal(signal);
            }
        }
        ExitOutcome::Code(1)
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitOutcome::Code(code) => write!(f, "exit code {}", code),
            ExitOutcome::Signal(signal) => write!(f, "signal {}", signal),
            ExitOutcome::LaunchError(message) => write!(f, "launch error ({})", message),
        }
    }
}

/// Events streamed by a running stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    Stdout(String),
    Stderr(String),
    Exit(ExitOutcome),
}

/// A fully-resolved command line for one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Stage command name this invocation belongs to
    pub stage: String,
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    /// Render the invocation as a copy-pasteable shell line.
    pub fn display(&self) -> String {
        // `sh -c <line>` is shown as the line itself
        if self.program == "sh"
            && self.args.first().map(String::as_str) == Some("-c")
            && let Some(line) = self.args.get(1)
        {
            return line.clone();
        }
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Captured result of a finished stage process.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub outcome: ExitOutcome,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.outcome.success()
    }

    /// Stdout followed by stderr, the way stage logs persist them.
    pub fn combined(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }
}

/// Port for launching stage processes.
///
/// Implementations never return an error: a process that cannot be spawned is
/// reported as [`ExitOutcome::LaunchError`] so the caller treats it as a
/// failed stage.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run one invocation to completion.
    ///
    /// # Arguments
    /// * `invocation` - program and arguments to launch in the workspace
    /// * `events` - when present, each stdout/stderr line is forwarded as it
    ///   arrives, followed by a final [`ProcessEvent::Exit`]
    async fn run(
        &self,
        invocation: &Invocation,
        events: Option<UnboundedSender<ProcessEvent>>,
    ) -> ProcessOutput;
}
