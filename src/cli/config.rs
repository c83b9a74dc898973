use std::path::Path;

use crate::cli::ConfigCommands;
use envault::config::Config;
use envault::error::{Result, VaultError};
use envault::vault;

pub fn run(dir: &Path, cmd: &ConfigCommands) -> Result<()> {
    match cmd {
        ConfigCommands::Show => show(dir),
    }
}

fn show(dir: &Path) -> Result<()> {
    let config = Config::load(&vault::config_path(dir))?;
    print!(
        "{}",
        toml::to_string_pretty(&config).map_err(|e| VaultError::Serialization(e.to_string()))?
    );
    Ok(())
}
