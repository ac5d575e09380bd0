//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module          | Commands handled                                              |
//! |-----------------|---------------------------------------------------------------|
//! | `run`           | `Full`, `Resume`, `RetryLastFailed`, `Smart`, `Parallel`,      |
//! |                 | `Guardian`, `Check`, `Flake`                                  |
//! | `snapshot`      | `Snapshot`                                                    |
//! | `rescue`        | `Rescue`                                                      |
//! | `history`       | `Observability`, `Retention`                                  |
//! | `health`        | `Doctor`, `Status`                                            |
//! | `journal`       | `Note`, `Error`                                               |
//! | `project`       | `Init`, `Stages`                                              |

pub mod health;
pub mod history;
pub mod journal;
pub mod project;
pub mod rescue;
pub mod run;
pub mod snapshot;

pub use health::{cmd_doctor, cmd_status};
pub use history::{cmd_observability, cmd_retention};
pub use journal::{cmd_error, cmd_note};
pub use project::{cmd_init, cmd_stages};
pub use rescue::cmd_rescue;
pub use run::{
    cmd_check, cmd_flake, cmd_full, cmd_guardian, cmd_parallel, cmd_resume,
    cmd_retry_last_failed, cmd_smart,
};
pub use snapshot::cmd_snapshot;

use anyhow::Result;
use gatehouse::config::Config;
use gatehouse::pipeline::{GateSession, StageExecutor};
use gatehouse::runner::{CommandRunner, ProcessRunner};
use gatehouse::ui::GateUI;
use std::path::Path;
use std::sync::Arc;

/// Loaded configuration plus the terminal UI, shared by the run commands.
pub struct Workspace {
    pub config: Arc<Config>,
    pub ui: Arc<GateUI>,
}

impl Workspace {
    pub fn open(project_dir: &Path, verbose: bool) -> Result<Self> {
        let config = Config::load(project_dir, verbose)?;
        config.ensure_directories()?;
        Ok(Self {
            config: Arc::new(config),
            ui: Arc::new(GateUI::new(verbose)),
        })
    }

    fn runner(&self) -> Arc<dyn ProcessRunner> {
        Arc::new(CommandRunner::new(&self.config.project_dir))
    }

    pub fn executor(&self) -> StageExecutor {
        StageExecutor::new(self.config.clone(), self.runner(), self.ui.clone())
    }

    pub fn session(&self) -> GateSession {
        GateSession::new(self.config.clone(), self.runner(), self.ui.clone())
    }
}
