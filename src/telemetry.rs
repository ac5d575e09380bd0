//! Diagnostic logging setup.
//!
//! Two layers: human-readable events on stderr (filtered by `GATEHOUSE_LOG`,
//! `warn` by default, `gatehouse=debug` with `--verbose`) and JSON lines in
//! daily files under `.gatehouse/logs/`. Terminal output for the operator
//! goes through the UI, not through tracing.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// Environment variable holding the stderr filter directive.
pub const LOG_ENV: &str = "GATEHOUSE_LOG";

const LOG_FILE_PREFIX: &str = "gatehouse.log";

fn stderr_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "gatehouse=debug" } else { "warn" })
    })
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the life of the process. When `log_dir` cannot be created only the
/// stderr layer is installed. Calling this twice is harmless.
pub fn init(log_dir: Option<&Path>, verbose: bool) -> Option<WorkerGuard> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(stderr_filter(verbose));

    let file = log_dir.and_then(|dir| match std::fs::create_dir_all(dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            Some(tracing_appender::non_blocking(appender))
        }
        Err(e) => {
            eprintln!("gatehouse: file logging disabled ({}): {}", dir.display(), e);
            None
        }
    });

    match file {
        Some((writer, guard)) => {
            let file_layer = fmt::layer()
                .json()
                .with_writer(writer)
                .with_filter(EnvFilter::new("gatehouse=debug"));
            let _ = tracing_subscriber::registry()
                .with(stderr_layer)
                .with(file_layer)
                .try_init();
            Some(guard)
        }
        None => {
            let _ = tracing_subscriber::registry().with(stderr_layer).try_init();
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_init_creates_log_dir_and_is_repeatable() {
        let dir = tempdir().unwrap();
        let logs = dir.path().join("logs");
        let guard = init(Some(&logs), false);
        assert!(guard.is_some());
        assert!(logs.is_dir());
        // second install is a no-op rather than a panic
        let _again = init(Some(&logs), true);
        tracing::info!("telemetry test event");
    }
}
