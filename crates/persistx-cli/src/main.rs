//! PersistX CLI
//!
//! Command-line interface for checking a persistence descriptor and
//! exercising the second-level cache

use clap::{Parser, Subcommand};
use persistx_core::logging_facility::{init, Profile};

mod commands;

#[derive(Debug, Parser)]
#[command(name = "persistx")]
#[command(about = "PersistX - session factory and second-level cache tooling", long_about = None)]
struct Cli {
    /// Emit JSON log lines instead of human-readable ones
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Initialize the session factory, open a session and shut down
    Check(commands::check::CheckArgs),
    /// Load an entity across several sessions and report cache statistics
    Load(commands::load::LoadArgs),
    /// Configuration operations
    Config(commands::config::ConfigArgs),
}

fn main() {
    let cli = Cli::parse();
    init(if cli.json_logs {
        Profile::Production
    } else {
        Profile::Development
    });

    let result = match cli.command {
        Commands::Check(args) => commands::check::execute(args),
        Commands::Load(args) => commands::load::execute(args),
        Commands::Config(args) => commands::config::execute(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
