//! Project memory journal: decisions log and error catalog.
//!
//! Lines are appended as `- YYYY-MM-DD: message`. Messages are validated
//! before anything is written, and writes are confined to the journal root.

use crate::config::JournalPaths;
use crate::errors::{GateError, GateResult};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

/// Maximum accepted journal message length, in characters.
pub const MAX_MESSAGE_CHARS: usize = 500;

/// Validate and trim a journal message.
pub fn sanitize_message(raw: &str) -> GateResult<String> {
    let message = raw.trim();
    if message.is_empty() {
        return Err(GateError::InvalidInput("Message is required.".to_string()));
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(GateError::InvalidInput(format!(
            "Message too long. Max {} characters.",
            MAX_MESSAGE_CHARS
        )));
    }
    if message.contains('\r') || message.contains('\n') {
        return Err(GateError::InvalidInput(
            "Multiline messages are not allowed.".to_string(),
        ));
    }
    if message.chars().any(|c| (c as u32) < 0x20 || c as u32 == 0x7F) {
        return Err(GateError::InvalidInput(
            "Control characters are not allowed.".to_string(),
        ));
    }
    Ok(message.to_string())
}

/// Resolve `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Reject any target that resolves outside `root`.
pub fn ensure_inside(root: &Path, target: &Path) -> GateResult<()> {
    let root = normalize(root);
    let target = normalize(target);
    if target.starts_with(&root) {
        Ok(())
    } else {
        Err(GateError::InvalidInput(format!(
            "Refusing to write outside {}: {}",
            root.display(),
            target.display()
        )))
    }
}

pub struct Journal {
    paths: JournalPaths,
}

impl Journal {
    pub fn new(paths: JournalPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &JournalPaths {
        &self.paths
    }

    /// Append to the decisions log.
    pub fn note(&self, message: &str) -> GateResult<()> {
        self.append(&self.paths.decisions, message)
    }

    /// Append to the error catalog.
    pub fn error(&self, message: &str) -> GateResult<()> {
        self.append(&self.paths.errors, message)
    }

    /// Append without failing the caller; problems are logged.
    pub fn note_soft(&self, message: &str) {
        if let Err(e) = self.note(message) {
            tracing::warn!(error = %e, "Could not append to decisions log");
        }
    }

    pub fn error_soft(&self, message: &str) {
        if let Err(e) = self.error(message) {
            tracing::warn!(error = %e, "Could not append to error catalog");
        }
    }

    fn append(&self, file: &Path, message: &str) -> GateResult<()> {
        ensure_inside(&self.paths.root, file)?;
        let message = sanitize_message(message)?;
        if !file.exists() {
            return Err(GateError::filesystem(
                file,
                std::io::Error::new(std::io::ErrorKind::NotFound, "journal file is missing"),
            ));
        }
        let stamp = chrono::Local::now().format("%Y-%m-%d");
        let mut handle = OpenOptions::new()
            .append(true)
            .open(file)
            .map_err(|e| GateError::filesystem(file, e))?;
        write!(handle, "\n- {}: {}\n", stamp, message).map_err(|e| GateError::filesystem(file, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn journal(root: &Path) -> Journal {
        std::fs::create_dir_all(root).unwrap();
        let paths = JournalPaths {
            root: root.to_path_buf(),
            decisions: root.join("decisions.md"),
            errors: root.join("error-catalog.md"),
            fix_request: root.join("fix-request.md"),
            fix_request_sidecar: root.join("fix-request.json"),
        };
        std::fs::write(&paths.decisions, "# Decisions\n").unwrap();
        std::fs::write(&paths.errors, "# Errors\n").unwrap();
        Journal::new(paths)
    }

    #[test]
    fn test_sanitize_trims() {
        assert_eq!(sanitize_message("  hello  ").unwrap(), "hello");
    }

    #[test]
    fn test_sanitize_rejections() {
        assert!(sanitize_message("   ").is_err());
        assert!(sanitize_message(&"x".repeat(501)).is_err());
        assert!(sanitize_message(&"x".repeat(500)).is_ok());
        assert!(sanitize_message("a\nb").is_err());
        assert!(sanitize_message("a\rb").is_err());
        assert!(sanitize_message("bell\u{7}").is_err());
        assert!(sanitize_message("del\u{7f}").is_err());
        assert!(matches!(
            sanitize_message("tab\there"),
            Err(GateError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_note_appends_dated_line() {
        let dir = tempdir().unwrap();
        let journal = journal(&dir.path().join("docs/ai-memory"));
        journal.note("Switched to parallel mode").unwrap();
        let content = std::fs::read_to_string(&journal.paths().decisions).unwrap();
        let last = content.lines().last().unwrap();
        let stamp = chrono::Local::now().format("%Y-%m-%d").to_string();
        assert_eq!(last, format!("- {}: Switched to parallel mode", stamp));
        assert!(content.starts_with("# Decisions\n\n- "));
    }

    #[test]
    fn test_invalid_message_writes_nothing() {
        let dir = tempdir().unwrap();
        let journal = journal(&dir.path().join("mem"));
        assert!(journal.error("two\nlines").is_err());
        let content = std::fs::read_to_string(&journal.paths().errors).unwrap();
        assert_eq!(content, "# Errors\n");
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempdir().unwrap();
        let journal = journal(&dir.path().join("mem"));
        std::fs::remove_file(&journal.paths().errors).unwrap();
        let err = journal.error("msg").unwrap_err();
        assert!(matches!(err, GateError::Filesystem { .. }));
    }

    #[test]
    fn test_ensure_inside() {
        let root = Path::new("/work/docs/ai-memory");
        assert!(ensure_inside(root, Path::new("/work/docs/ai-memory/a.md")).is_ok());
        assert!(ensure_inside(root, Path::new("/work/docs/ai-memory/../secrets.md")).is_err());
        assert!(ensure_inside(root, Path::new("/work/docs/ai-memory-other/a.md")).is_err());
    }
}
