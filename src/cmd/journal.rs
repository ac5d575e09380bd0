//! Journal commands: `note` and `error`.

use anyhow::Result;
use std::path::Path;

use gatehouse::config::Config;
use gatehouse::journal::Journal;

fn journal(project_dir: &Path) -> Result<(Config, Journal)> {
    let config = Config::load(project_dir, false)?;
    let journal = Journal::new(config.journal.clone());
    Ok((config, journal))
}

pub fn cmd_note(project_dir: &Path, message: &str) -> Result<()> {
    let (config, journal) = journal(project_dir)?;
    journal.note(message)?;
    println!(
        "Decision logged in {}",
        config.relative(&config.journal.decisions)
    );
    Ok(())
}

pub fn cmd_error(project_dir: &Path, message: &str) -> Result<()> {
    let (config, journal) = journal(project_dir)?;
    journal.error(message)?;
    println!(
        "Error logged in {}",
        config.relative(&config.journal.errors)
    );
    Ok(())
}
