use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::errors::{GateError, GateResult};
use crate::gate_config::GateToml;
use crate::runner::Invocation;
use crate::stage::{Pipeline, StageDefinition};

/// Name of the per-workspace state directory.
pub const STATE_DIR: &str = ".gatehouse";

/// Resolved locations of the project memory documents.
#[derive(Debug, Clone)]
pub struct JournalPaths {
    pub root: PathBuf,
    pub decisions: PathBuf,
    pub errors: PathBuf,
    pub fix_request: PathBuf,
    /// Structured companion of the fix request, read by `resume`
    pub fix_request_sidecar: PathBuf,
}

/// Runtime configuration for gatehouse.
///
/// Built once per invocation from `gatehouse.toml` and then shared read-only
/// (as `Arc<Config>`) by the runner, pipeline, snapshot manager and recorder.
#[derive(Debug, Clone)]
pub struct Config {
    pub project_dir: PathBuf,
    pub state_dir: PathBuf,
    pub reports_dir: PathBuf,
    pub snapshots_dir: PathBuf,
    pub observability_dir: PathBuf,
    pub log_dir: PathBuf,
    pub journal: JournalPaths,
    pub pipeline: Pipeline,
    pub verbose: bool,
    /// The underlying file configuration
    settings: GateToml,
}

impl Config {
    /// Load `.gatehouse/gatehouse.toml` (or defaults) for a project directory.
    pub fn load(project_dir: &Path, verbose: bool) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let settings = GateToml::load_or_default(&project_dir.join(STATE_DIR))?;
        Ok(Self::from_toml(project_dir, settings, verbose)?)
    }

    /// Build a validated configuration from parsed settings.
    pub fn from_toml(project_dir: PathBuf, settings: GateToml, verbose: bool) -> GateResult<Self> {
        let problems = settings.validate();
        if !problems.is_empty() {
            return Err(GateError::Configuration(problems.join("; ")));
        }

        let state_dir = project_dir.join(STATE_DIR);
        let journal_root = project_dir.join(&settings.journal.root);
        let fix_request = journal_root.join(&settings.journal.fix_request);
        let journal = JournalPaths {
            decisions: journal_root.join(&settings.journal.decisions),
            errors: journal_root.join(&settings.journal.errors),
            fix_request_sidecar: fix_request.with_extension("json"),
            fix_request,
            root: journal_root,
        };
        let pipeline = Pipeline::from_toml(&settings.stages, &settings.auxiliary);

        Ok(Self {
            reports_dir: state_dir.join("reports"),
            snapshots_dir: state_dir.join("snapshots"),
            observability_dir: state_dir.join("observability"),
            log_dir: state_dir.join("logs"),
            state_dir,
            project_dir,
            journal,
            pipeline,
            verbose,
            settings,
        })
    }

    pub fn settings(&self) -> &GateToml {
        &self.settings
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.reports_dir)
            .context("Failed to create reports directory")?;
        std::fs::create_dir_all(&self.snapshots_dir)
            .context("Failed to create snapshots directory")?;
        std::fs::create_dir_all(&self.observability_dir)
            .context("Failed to create observability directory")?;
        std::fs::create_dir_all(&self.log_dir).context("Failed to create log directory")?;
        Ok(())
    }

    /// Turn a stage into the process the runner launches.
    pub fn invocation(&self, stage: &StageDefinition) -> Invocation {
        match stage.exec {
            Some(ref line) => Invocation {
                stage: stage.command.clone(),
                program: "sh".to_string(),
                args: vec!["-c".to_string(), line.clone()],
            },
            None => {
                let runner = &self.settings.runner;
                let mut args = runner.args.clone();
                args.push(stage.command.clone());
                Invocation {
                    stage: stage.command.clone(),
                    program: runner.program.clone(),
                    args,
                }
            }
        }
    }

    /// Whether a stage streams output into the live progress bar.
    pub fn is_progress_stage(&self, stage: &StageDefinition) -> bool {
        stage.command == self.settings.runner.progress_stage
    }

    /// Display a path relative to the project directory when possible.
    pub fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.project_dir)
            .unwrap_or(path)
            .display()
            .to_string()
    }
}
