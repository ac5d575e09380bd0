//! Per-run stage log artifacts.
//!
//! Each gate run gets `reports/run-<millis>-<mode>/`; each executed stage
//! writes `NN-<command-token>-pass.log` or `...-fail.log` into it.

use crate::errors::{GateError, GateResult};
use crate::stage::StageStatus;
use crate::util::{now_millis, sanitize_token};
use std::fs;
use std::path::{Path, PathBuf};

/// Prefix shared by every run directory.
pub const RUN_DIR_PREFIX: &str = "run-";

#[derive(Debug, Clone)]
pub struct StageLogRun {
    dir: PathBuf,
    relative: String,
}

impl StageLogRun {
    /// Create a fresh run directory under `reports_dir`.
    ///
    /// # Arguments
    /// * `reports_dir` - parent directory for all run folders
    /// * `project_dir` - used to compute the display path
    /// * `mode` - run mode, sanitized into the folder name
    pub fn create(reports_dir: &Path, project_dir: &Path, mode: &str) -> GateResult<Self> {
        let name = format!(
            "{}{}-{}",
            RUN_DIR_PREFIX,
            now_millis(),
            sanitize_token(mode, "gate")
        );
        let dir = reports_dir.join(name);
        fs::create_dir_all(&dir).map_err(|e| GateError::filesystem(&dir, e))?;
        let relative = dir
            .strip_prefix(project_dir)
            .unwrap_or(&dir)
            .display()
            .to_string();
        Ok(Self { dir, relative })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Workspace-relative display path of the run directory.
    pub fn relative(&self) -> &str {
        &self.relative
    }

    /// File name used for a stage log.
    pub fn file_name(index: usize, command: &str, status: StageStatus) -> String {
        format!(
            "{:02}-{}-{}.log",
            index,
            sanitize_token(command, "stage"),
            status.log_suffix()
        )
    }

    /// Persist one stage's combined output and return the log path.
    pub fn write(
        &self,
        index: usize,
        command: &str,
        status: StageStatus,
        output: &str,
    ) -> GateResult<PathBuf> {
        let path = self.dir.join(Self::file_name(index, command, status));
        fs::write(&path, output).map_err(|e| GateError::filesystem(&path, e))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_name_format() {
        assert_eq!(
            StageLogRun::file_name(3, "test:sync:dist-site", StageStatus::Passed),
            "03-test-sync-dist-site-pass.log"
        );
        assert_eq!(
            StageLogRun::file_name(12, "verify:siteground", StageStatus::Failed),
            "12-verify-siteground-fail.log"
        );
    }

    #[test]
    fn test_create_and_write() {
        let dir = tempdir().unwrap();
        let reports = dir.path().join(".gatehouse/reports");
        let run = StageLogRun::create(&reports, dir.path(), "Full Gate").unwrap();
        assert!(run.dir().is_dir());
        let name = run.dir().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("run-"));
        assert!(name.ends_with("-full-gate"));
        assert!(run.relative().starts_with(".gatehouse/reports/run-"));

        let path = run.write(1, "lint", StageStatus::Failed, "boom\n").unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "boom\n");
    }
}
