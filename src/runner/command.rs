use super::{ExitOutcome, Invocation, ProcessEvent, ProcessOutput, ProcessRunner};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc::UnboundedSender;

/// Runs stage invocations as real child processes inside the workspace.
pub struct CommandRunner {
    workdir: PathBuf,
}

impl CommandRunner {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }
}

/// Drain one pipe line by line, forwarding each line when streaming.
///
/// Bytes are decoded lossily and the pipe is read to EOF, so a stage that
/// prints invalid UTF-8 never sees its output pipe closed early.
async fn collect_lines<R, F>(
    pipe: Option<R>,
    events: Option<UnboundedSender<ProcessEvent>>,
    wrap: F,
) -> String
where
    R: AsyncRead + Unpin,
    F: Fn(String) -> ProcessEvent,
{
    let mut captured = String::new();
    let Some(pipe) = pipe else {
        return captured;
    };
    let mut reader = BufReader::new(pipe);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let raw = buf.strip_suffix(b"\n").unwrap_or(&buf[..]);
                let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
                let line = String::from_utf8_lossy(raw).into_owned();
                if let Some(ref tx) = events {
                    // Receiver may already be gone; output is still captured.
                    let _ = tx.send(wrap(line.clone()));
                }
                captured.push_str(&line);
                captured.push('\n');
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::warn!(error = %e, "Stopped reading stage output");
                break;
            }
        }
    }
    captured
}

#[async_trait]
impl ProcessRunner for CommandRunner {
    async fn run(
        &self,
        invocation: &Invocation,
        events: Option<UnboundedSender<ProcessEvent>>,
    ) -> ProcessOutput {
        let start = Instant::now();
        tracing::debug!(
            stage = %invocation.stage,
            command = %invocation.display(),
            "Spawning stage process"
        );

        let spawned = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(
                    stage = %invocation.stage,
                    error = %e,
                    "Failed to spawn stage process"
                );
                let outcome = ExitOutcome::LaunchError(e.to_string());
                if let Some(ref tx) = events {
                    let _ = tx.send(ProcessEvent::Exit(outcome.clone()));
                }
                return ProcessOutput {
                    outcome,
                    stdout: String::new(),
                    stderr: format!("Failed to launch `{}`: {}\n", invocation.display(), e),
                    duration: start.elapsed(),
                };
            }
        };

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (stdout, stderr) = tokio::join!(
            collect_lines(stdout, events.clone(), ProcessEvent::Stdout),
            collect_lines(stderr, events.clone(), ProcessEvent::Stderr),
        );

        let outcome = match child.wait().await {
            Ok(status) => ExitOutcome::from_status(status),
            Err(e) => ExitOutcome::LaunchError(e.to_string()),
        };
        if let Some(ref tx) = events {
            let _ = tx.send(ProcessEvent::Exit(outcome.clone()));
        }

        let duration = start.elapsed();
        tracing::debug!(
            stage = %invocation.stage,
            outcome = %outcome,
            elapsed_ms = duration.as_millis() as u64,
            "Stage process finished"
        );

        ProcessOutput {
            outcome,
            stdout,
            stderr,
            duration,
        }
    }
}
