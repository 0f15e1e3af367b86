//! Config commands: show.

use crate::cmd::ConfigCommand;
use anyhow::Result;
use mcore::MeshworkConfig;

/// Dispatch config subcommands.
pub fn run(action: &ConfigCommand, config: &MeshworkConfig) -> Result<()> {
    match action {
        ConfigCommand::Show => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}
