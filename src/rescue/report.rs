//! The fix-request document and its structured sidecar.
//!
//! One failure at a time: each write overwrites both files. `resume` and
//! `retry-last-failed` read the sidecar, falling back to the markdown
//! `- Failing stage:` line when the sidecar is missing or unreadable.

use crate::config::JournalPaths;
use crate::errors::{GateError, GateResult, StageFailure};
use crate::journal::ensure_inside;
use crate::util::strip_ansi;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;

const STAGE_LINE_PREFIX: &str = "- Failing stage: ";

/// Clean captured output for embedding in markdown.
///
/// Line endings are normalized, ANSI escapes removed, and anything outside
/// tab/newline/printable ASCII becomes `?`. Output longer than `max_chars`
/// is cut with a `...[truncated N chars]` marker.
pub fn sanitize_output(raw: &str, max_chars: usize) -> String {
    let cleaned: String = strip_ansi(raw)
        .chars()
        .map(|c| match c {
            '\t' | '\n' | ' '..='~' => c,
            _ => '?',
        })
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return "(no output)".to_string();
    }
    let len = cleaned.chars().count();
    if len <= max_chars {
        return cleaned.to_string();
    }
    let head: String = cleaned.chars().take(max_chars).collect();
    format!("{}\n...[truncated {} chars]", head, len - max_chars)
}

/// Machine-readable record of the last failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixRequest {
    pub failing_stage: String,
    pub failing_command: String,
    pub status: String,
    pub exit_code: i32,
    /// Mode that produced the failure (`full`, `rescue`, `guardian`, ...)
    pub source: String,
    pub generated_at: DateTime<Utc>,
    #[serde(skip)]
    pub stdout: String,
    #[serde(skip)]
    pub stderr: String,
}

impl FixRequest {
    pub fn from_failure(failure: &StageFailure, source: &str) -> Self {
        Self {
            failing_stage: failure.command.clone(),
            failing_command: failure.reproduce.clone(),
            status: failure.outcome.to_string(),
            exit_code: failure.outcome.exit_code(),
            source: source.to_string(),
            generated_at: Utc::now(),
            stdout: failure.stdout.clone(),
            stderr: failure.stderr.clone(),
        }
    }

    /// Render the markdown document.
    pub fn to_markdown(&self, max_chars: usize) -> String {
        let lines = [
            "# Gatehouse Fix Request".to_string(),
            String::new(),
            format!("- Generated: {}", self.generated_at.to_rfc3339()),
            format!("{}{}", STAGE_LINE_PREFIX, self.failing_stage),
            format!("- Failing command: {}", self.failing_command),
            format!("- Failure status: {}", self.status),
            format!("- Source: {}", self.source),
            String::new(),
            "## Summary".to_string(),
            "- Reproduce with the exact command above.".to_string(),
            "- Fix only the first failing root cause.".to_string(),
            "- Re-run the isolated stage, then resume the gate.".to_string(),
            String::new(),
            "## Captured Output (stdout)".to_string(),
            "```text".to_string(),
            sanitize_output(&self.stdout, max_chars),
            "```".to_string(),
            String::new(),
            "## Captured Output (stderr)".to_string(),
            "```text".to_string(),
            sanitize_output(&self.stderr, max_chars),
            "```".to_string(),
            String::new(),
            "## Recovery Checklist".to_string(),
            "1. Identify the failing stage and the exact assertion or error text.".to_string(),
            "2. Apply a minimal fix.".to_string(),
            "3. Re-run the failing stage only: `gatehouse retry-last-failed`.".to_string(),
            "4. Continue the gate from that stage: `gatehouse resume`.".to_string(),
        ];
        let mut doc = lines.join("\n");
        doc.push('\n');
        doc
    }

    /// Overwrite the fix request and its sidecar.
    pub fn write(&self, paths: &JournalPaths, max_chars: usize) -> GateResult<()> {
        ensure_inside(&paths.root, &paths.fix_request)?;
        ensure_inside(&paths.root, &paths.fix_request_sidecar)?;
        fs::create_dir_all(&paths.root).map_err(|e| GateError::filesystem(&paths.root, e))?;
        fs::write(&paths.fix_request, self.to_markdown(max_chars))
            .map_err(|e| GateError::filesystem(&paths.fix_request, e))?;
        let json = serde_json::to_string_pretty(self).map_err(|source| GateError::Json {
            path: paths.fix_request_sidecar.clone(),
            source,
        })?;
        fs::write(&paths.fix_request_sidecar, json)
            .map_err(|e| GateError::filesystem(&paths.fix_request_sidecar, e))?;
        Ok(())
    }
}

/// Stage name of the most recent recorded failure, if any.
pub fn last_failed_stage(paths: &JournalPaths) -> Option<String> {
    if let Ok(raw) = fs::read_to_string(&paths.fix_request_sidecar) {
        match serde_json::from_str::<FixRequest>(&raw) {
            Ok(request) if !request.failing_stage.trim().is_empty() => {
                return Some(request.failing_stage);
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Ignoring unreadable fix request sidecar"),
        }
    }
    let markdown = fs::read_to_string(&paths.fix_request).ok()?;
    markdown
        .lines()
        .find_map(|line| line.strip_prefix(STAGE_LINE_PREFIX))
        .map(|stage| stage.trim().to_string())
        .filter(|stage| !stage.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ExitOutcome;
    use std::path::Path;
    use tempfile::tempdir;

    fn paths(root: &Path) -> JournalPaths {
        JournalPaths {
            root: root.to_path_buf(),
            decisions: root.join("decisions.md"),
            errors: root.join("error-catalog.md"),
            fix_request: root.join("fix-request.md"),
            fix_request_sidecar: root.join("fix-request.json"),
        }
    }

    fn failure() -> StageFailure {
        StageFailure {
            command: "test:integrity".to_string(),
            label: "Validate test integrity rules".to_string(),
            reproduce: "npm run --silent test:integrity".to_string(),
            outcome: ExitOutcome::Code(2),
            stdout: "checking\r\n\x1b[31mbad rule\x1b[0m\n".to_string(),
            stderr: String::new(),
        }
    }

    #[test]
    fn test_sanitize_output_cleans_text() {
        assert_eq!(
            sanitize_output("a\r\n\x1b[1mb\x1b[0m\tc é\u{0}", 100),
            "a\nb\tc ??"
        );
    }

    #[test]
    fn test_sanitize_output_empty() {
        assert_eq!(sanitize_output("  \n\x1b[0m", 100), "(no output)");
    }

    #[test]
    fn test_sanitize_output_truncates() {
        let raw = "x".repeat(4010);
        let out = sanitize_output(&raw, 4000);
        assert!(out.starts_with(&"x".repeat(4000)));
        assert!(out.ends_with("\n...[truncated 10 chars]"));
    }

    #[test]
    fn test_markdown_contains_sections() {
        let request = FixRequest::from_failure(&failure(), "rescue");
        let doc = request.to_markdown(4000);
        assert!(doc.starts_with("# Gatehouse Fix Request\n"));
        assert!(doc.contains("- Failing stage: test:integrity\n"));
        assert!(doc.contains("- Failing command: npm run --silent test:integrity\n"));
        assert!(doc.contains("- Failure status: exit code 2\n"));
        assert!(doc.contains("```text\nchecking\nbad rule\n```"));
        assert!(doc.contains("## Captured Output (stderr)\n```text\n(no output)\n```"));
        assert!(doc.contains("## Recovery Checklist"));
    }

    #[test]
    fn test_write_then_read_sidecar() {
        let dir = tempdir().unwrap();
        let paths = paths(&dir.path().join("mem"));
        FixRequest::from_failure(&failure(), "full")
            .write(&paths, 4000)
            .unwrap();
        assert!(paths.fix_request.exists());
        assert_eq!(last_failed_stage(&paths).as_deref(), Some("test:integrity"));

        let raw = fs::read_to_string(&paths.fix_request_sidecar).unwrap();
        assert!(!raw.contains("bad rule"));
    }

    #[test]
    fn test_markdown_fallback_without_sidecar() {
        let dir = tempdir().unwrap();
        let paths = paths(&dir.path().join("mem"));
        FixRequest::from_failure(&failure(), "full")
            .write(&paths, 4000)
            .unwrap();
        fs::remove_file(&paths.fix_request_sidecar).unwrap();
        assert_eq!(last_failed_stage(&paths).as_deref(), Some("test:integrity"));

        fs::write(&paths.fix_request_sidecar, "{ not json").unwrap();
        assert_eq!(last_failed_stage(&paths).as_deref(), Some("test:integrity"));
    }

    #[test]
    fn test_no_failure_recorded() {
        let dir = tempdir().unwrap();
        let paths = paths(dir.path());
        assert_eq!(last_failed_stage(&paths), None);
    }

    #[test]
    fn test_write_overwrites_previous() {
        let dir = tempdir().unwrap();
        let paths = paths(&dir.path().join("mem"));
        FixRequest::from_failure(&failure(), "full")
            .write(&paths, 4000)
            .unwrap();
        let mut second = failure();
        second.command = "test:memory".to_string();
        second.reproduce = "npm run --silent test:memory".to_string();
        FixRequest::from_failure(&second, "full")
            .write(&paths, 4000)
            .unwrap();
        let doc = fs::read_to_string(&paths.fix_request).unwrap();
        assert!(!doc.contains("test:integrity"));
        assert_eq!(last_failed_stage(&paths).as_deref(), Some("test:memory"));
    }
}
