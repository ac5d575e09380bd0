//! Scripted in-memory runner for pipeline tests.

use super::{ExitOutcome, Invocation, ProcessEvent, ProcessOutput, ProcessRunner};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone)]
struct Script {
    outcome: ExitOutcome,
    stdout: String,
    stderr: String,
    delay: Duration,
}

/// Replays canned outcomes per stage name and records launch order.
///
/// Stages without a script pass with empty output.
#[derive(Clone, Default)]
pub struct ScriptedRunner {
    scripts: Arc<Mutex<HashMap<String, Script>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(self, stage: &str, code: i32, stderr: &str) -> Self {
        self.script(stage, ExitOutcome::Code(code), "", stderr, 0)
    }

    pub fn pass_with(self, stage: &str, stdout: &str) -> Self {
        self.script(stage, ExitOutcome::Code(0), stdout, "", 0)
    }

    pub fn delay(self, stage: &str, millis: u64) -> Self {
        self.script(stage, ExitOutcome::Code(0), "", "", millis)
    }

    pub fn script(
        self,
        stage: &str,
        outcome: ExitOutcome,
        stdout: &str,
        stderr: &str,
        delay_ms: u64,
    ) -> Self {
        self.scripts.lock().unwrap().insert(
            stage.to_string(),
            Script {
                outcome,
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
                delay: Duration::from_millis(delay_ms),
            },
        );
        self
    }

    /// Stage names in the order they were launched.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(
        &self,
        invocation: &Invocation,
        events: Option<UnboundedSender<ProcessEvent>>,
    ) -> ProcessOutput {
        self.calls.lock().unwrap().push(invocation.stage.clone());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(&invocation.stage)
            .cloned()
            .unwrap_or(Script {
                outcome: ExitOutcome::Code(0),
                stdout: String::new(),
                stderr: String::new(),
                delay: Duration::ZERO,
            });
        if !script.delay.is_zero() {
            tokio::time::sleep(script.delay).await;
        }
        if let Some(tx) = events {
            for line in script.stdout.lines() {
                let _ = tx.send(ProcessEvent::Stdout(line.to_string()));
            }
            for line in script.stderr.lines() {
                let _ = tx.send(ProcessEvent::Stderr(line.to_string()));
            }
            let _ = tx.send(ProcessEvent::Exit(script.outcome.clone()));
        }
        ProcessOutput {
            outcome: script.outcome,
            stdout: script.stdout,
            stderr: script.stderr,
            duration: script.delay,
        }
    }
}
