//! Descriptor check command
//!
//! Usage: persistx check [--config <PATH>]

use super::DescriptorArgs;
use clap::Args;
use persistx_store::{SqliteBackend, SqliteProvider};

#[derive(Debug, Args)]
pub struct CheckArgs {
    #[command(flatten)]
    pub descriptor: DescriptorArgs,
}

/// Build the factory, round-trip one session, then shut down
pub fn execute(args: CheckArgs) -> Result<(), Box<dyn std::error::Error>> {
    let provider = SqliteProvider::new(SqliteBackend, args.descriptor.path());
    let factory = provider.session_factory()?;

    let outcome = factory.open_session().and_then(|mut session| {
        session.ping()?;
        session.close()
    });
    drop(factory);
    let shutdown = provider.shutdown();

    outcome?;
    shutdown?;
    println!("ok");
    Ok(())
}
