//! Initialization for gatehouse workspaces.
//!
//! `gatehouse init` creates the state directory and the journal documents:
//!
//! ```text
//! .gatehouse/
//! ├── gatehouse.toml   # Stage pipeline and policies (defaults written out)
//! ├── reports/         # Per-run stage logs
//! ├── snapshots/       # Guardian snapshots
//! ├── observability/   # Run and flake history
//! └── logs/            # Diagnostic log files
//! docs/ai-memory/
//! ├── decisions.md
//! └── error-catalog.md
//! ```
//!
//! Existing files are never overwritten.

use crate::config::STATE_DIR;
use crate::gate_config::{CONFIG_FILE, GateToml};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

const DECISIONS_HEADER: &str = "# Decisions\n\nOne line per decision, newest last.\n";
const ERRORS_HEADER: &str = "# Error Catalog\n\nOne line per failure and its resolution.\n";

/// Result of initializing a workspace.
#[derive(Debug)]
pub struct InitResult {
    /// Path to the `.gatehouse` directory
    pub state_dir: PathBuf,
    /// Whether the directory was newly created (false if it already existed)
    pub created: bool,
    /// Files written by this call
    pub written: Vec<PathBuf>,
}

fn write_if_missing(path: &Path, content: &str, written: &mut Vec<PathBuf>) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    std::fs::write(path, content)
        .with_context(|| format!("Failed to create file: {}", path.display()))?;
    written.push(path.to_path_buf());
    Ok(())
}

/// Initialize a gatehouse workspace in the given directory.
///
/// # Arguments
/// * `project_dir` - The root directory of the project
pub fn init_project(project_dir: &Path) -> Result<InitResult> {
    let state_dir = project_dir.join(STATE_DIR);
    let created = !state_dir.exists();

    for sub in ["reports", "snapshots", "observability", "logs"] {
        let dir = state_dir.join(sub);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    }

    let mut written = Vec::new();
    let config_path = state_dir.join(CONFIG_FILE);
    let settings = if config_path.exists() {
        GateToml::load(&config_path)?
    } else {
        let settings = GateToml::default();
        settings.save(&config_path)?;
        written.push(config_path);
        settings
    };

    let journal_root = project_dir.join(&settings.journal.root);
    write_if_missing(
        &journal_root.join(&settings.journal.decisions),
        DECISIONS_HEADER,
        &mut written,
    )?;
    write_if_missing(
        &journal_root.join(&settings.journal.errors),
        ERRORS_HEADER,
        &mut written,
    )?;

    Ok(InitResult {
        state_dir,
        created,
        written,
    })
}

/// Check if a project already has a gatehouse state directory.
pub fn is_initialized(project_dir: &Path) -> bool {
    project_dir.join(STATE_DIR).exists()
}
