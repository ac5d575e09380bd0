//! Single-stage rescue: re-run one stage and capture a fix request.

pub mod report;

pub use report::{FixRequest, last_failed_stage, sanitize_output};

use crate::config::Config;
use crate::errors::{GateError, GateResult, StageFailure};
use crate::health::manifest_scripts;
use crate::journal::Journal;
use crate::pipeline::StageExecutor;
use crate::stage::StageDefinition;
use regex::Regex;
use std::sync::LazyLock;

static STAGE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9:_-]*$").unwrap());

/// Check a user-supplied stage name before anything is launched.
pub fn validate_stage_name(name: &str) -> GateResult<&str> {
    let name = name.trim();
    if STAGE_NAME.is_match(name) {
        Ok(name)
    } else {
        Err(GateError::InvalidInput(format!("invalid stage name: '{}'", name)))
    }
}

/// Resolve a stage by name: configured stages first, then scripts listed in
/// the script manifest (run through the default runner).
pub fn resolve(config: &Config, name: &str) -> GateResult<StageDefinition> {
    if let Some(stage) = config.pipeline.find(name) {
        return Ok(stage.clone());
    }
    let listed = manifest_scripts(config)?
        .map(|scripts| scripts.contains(name))
        .unwrap_or(false);
    if listed {
        return Ok(StageDefinition {
            command: name.to_string(),
            label: name.to_string(),
            sequence_index: config.pipeline.len() + config.pipeline.auxiliary().len(),
            exec: None,
        });
    }
    Err(GateError::UnknownStage {
        name: name.to_string(),
    })
}

/// Re-run one stage. A pass writes nothing; a failure overwrites the fix
/// request, appends to the error catalog and is returned as the error.
pub async fn run_rescue(executor: &StageExecutor, name: &str) -> GateResult<()> {
    let name = validate_stage_name(name)?;
    let stage = resolve(executor.config(), name)?;
    let config = executor.config();
    let ui = executor.ui();

    ui.info(format!("Rescue: running {} ({})", stage.command, stage.label));
    let output = executor.capture(&stage).await;
    if output.success() {
        ui.success(format!(
            "Rescue: {} passed. No fix request generated.",
            stage.command
        ));
        return Ok(());
    }

    let failure = StageFailure {
        command: stage.command.clone(),
        label: stage.label.clone(),
        reproduce: config.invocation(&stage).display(),
        outcome: output.outcome,
        stdout: output.stdout,
        stderr: output.stderr,
    };
    tracing::warn!(stage = %failure.command, outcome = %failure.outcome, "Rescue stage failed");
    FixRequest::from_failure(&failure, "rescue")
        .write(&config.journal, config.settings().rescue.max_output_chars)?;
    let shown = config.relative(&config.journal.fix_request);
    ui.rescue_saved(&shown);
    Journal::new(config.journal.clone()).error_soft(&format!(
        "rescue {} failed with {}; fix request written to {}",
        failure.command, failure.outcome, shown
    ));
    Err(failure.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::executor::tests::test_config;
    use crate::runner::testing::ScriptedRunner;
    use crate::ui::GateUI;
    use std::fs;
    use std::sync::Arc;

    fn executor(root: &std::path::Path, runner: ScriptedRunner) -> StageExecutor {
        let config = test_config(root, &["lint", "unit"]);
        StageExecutor::new(config, Arc::new(runner), Arc::new(GateUI::new(false)))
    }

    #[test]
    fn test_validate_stage_name() {
        assert_eq!(validate_stage_name(" test:memory ").unwrap(), "test:memory");
        assert!(validate_stage_name("-rf").is_err());
        assert!(validate_stage_name("a b").is_err());
        assert!(validate_stage_name("x;rm").is_err());
        assert!(validate_stage_name("").is_err());
    }

    #[tokio::test]
    async fn test_pass_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(dir.path(), ScriptedRunner::new());
        run_rescue(&exec, "lint").await.unwrap();
        assert!(!exec.config().journal.fix_request.exists());
    }

    #[tokio::test]
    async fn test_failure_writes_fix_request_and_propagates_code() {
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(dir.path(), ScriptedRunner::new().fail("unit", 9, "\x1b[31mboom\x1b[0m\r\n"));
        let err = run_rescue(&exec, "unit").await.unwrap_err();
        assert_eq!(err.exit_code(), 9);

        let doc = fs::read_to_string(&exec.config().journal.fix_request).unwrap();
        assert!(doc.contains("- Failing stage: unit"));
        assert!(doc.contains("- Failing command: npm run --silent unit"));
        assert!(doc.contains("boom\n"));
        assert!(!doc.contains('\x1b'));
    }

    #[tokio::test]
    async fn test_manifest_script_runs_ad_hoc() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("package.json"),
            r#"{"scripts": {"test:extra": "node x.js"}}"#,
        )
        .unwrap();
        let runner = ScriptedRunner::new();
        let exec = executor(dir.path(), runner.clone());
        run_rescue(&exec, "test:extra").await.unwrap();
        assert_eq!(runner.calls(), vec!["test:extra"]);
    }

    #[tokio::test]
    async fn test_failed_manifest_script_can_be_retried() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("package.json"),
            r#"{"scripts": {"test:extra": "node x.js"}}"#,
        )
        .unwrap();
        let exec = executor(dir.path(), ScriptedRunner::new().fail("test:extra", 2, "bad"));
        assert!(run_rescue(&exec, "test:extra").await.is_err());

        let plan = crate::pipeline::retry_plan(exec.config()).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].command, "test:extra");
        assert!(plan[0].exec.is_none());
    }

    #[tokio::test]
    async fn test_unknown_stage_rejected_before_launch() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new();
        let exec = executor(dir.path(), runner.clone());
        assert!(matches!(
            run_rescue(&exec, "nope").await,
            Err(GateError::UnknownStage { .. })
        ));
        assert!(runner.calls().is_empty());
    }
}
