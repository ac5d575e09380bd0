//! Workspace setup and pipeline listing commands.

use anyhow::Result;
use std::path::Path;

use gatehouse::config::Config;

pub fn cmd_init(project_dir: &Path) -> Result<()> {
    use gatehouse::init::init_project;

    let result = init_project(project_dir)?;

    if result.created {
        println!(
            "Initialized gatehouse workspace at {}",
            result.state_dir.display()
        );
    } else {
        println!(
            "Gatehouse workspace already initialized at {}",
            result.state_dir.display()
        );
    }
    for path in &result.written {
        println!("  created {}", path.strip_prefix(project_dir).unwrap_or(path).display());
    }
    println!();
    println!("Next steps:");
    println!("  1. Edit .gatehouse/gatehouse.toml to describe your stages");
    println!("  2. Run `gatehouse doctor` to check the workspace");
    println!("  3. Run `gatehouse full` to gate a release");

    Ok(())
}

pub fn cmd_stages(project_dir: &Path) -> Result<()> {
    let config = Config::load(project_dir, false)?;

    println!("Pipeline:");
    for stage in config.pipeline.stages() {
        println!(
            "  {:02}. {:<24} {}",
            stage.sequence_index + 1,
            stage.command,
            stage.label
        );
    }
    if !config.pipeline.auxiliary().is_empty() {
        println!();
        println!("Auxiliary:");
        for stage in config.pipeline.auxiliary() {
            println!("  --  {:<24} {}", stage.command, stage.label);
        }
    }
    Ok(())
}
