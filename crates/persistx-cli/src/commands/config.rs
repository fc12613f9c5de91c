//! Configuration command
//!
//! Usage: persistx config show [--config <PATH>]

use super::DescriptorArgs;
use clap::{Args, Subcommand};
use persistx_core::{Configuration, ExError};

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the flattened settings (credentials redacted)
    Show(DescriptorArgs),
}

pub fn execute(args: ConfigArgs) -> Result<(), Box<dyn std::error::Error>> {
    match args.command {
        ConfigCommand::Show(descriptor) => show(descriptor),
    }
}

fn show(args: DescriptorArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Configuration::load(args.path()).map_err(ExError::from)?;
    for (key, value) in config.properties() {
        println!("{} = {}", key, value);
    }
    Ok(())
}
