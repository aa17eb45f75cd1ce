//! Config commands

use crate::config::Config;
use crate::output::OutputFormat;
use crate::ConfigCommands;
use anyhow::bail;
use std::path::Path;

pub async fn handle(
    action: ConfigCommands,
    path: &Path,
    current: Config,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match action {
        ConfigCommands::Init { force } => {
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            Config::default().save(path)?;
            println!("Configuration initialized at {}", path.display());
        }
        ConfigCommands::Show => {
            format.print(&current);
        }
    }
    Ok(())
}
