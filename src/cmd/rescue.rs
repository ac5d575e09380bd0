//! Single-stage rescue command.

use anyhow::Result;
use std::path::Path;

use super::super::Cli;
use super::Workspace;

pub async fn cmd_rescue(project_dir: &Path, cli: &Cli, stage: &str) -> Result<()> {
    let ws = Workspace::open(project_dir, cli.verbose)?;
    gatehouse::rescue::run_rescue(&ws.executor(), stage).await?;
    Ok(())
}
