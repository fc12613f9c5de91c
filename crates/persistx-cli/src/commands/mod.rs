//! CLI command implementations

pub mod check;
pub mod config;
pub mod load;

use clap::Args;
use persistx_core::Configuration;
use std::path::PathBuf;

/// Descriptor selection shared by every command
#[derive(Debug, Args)]
pub struct DescriptorArgs {
    /// Path to the persistence descriptor (defaults to $PERSISTX_CONFIG or ./persistx.toml)
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,
}

impl DescriptorArgs {
    pub fn path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(Configuration::default_descriptor)
    }
}
