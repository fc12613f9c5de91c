//! Entity load command
//!
//! Usage: persistx load --entity <NAME> --id <ID> [--sessions <N>] [--config <PATH>]

use super::DescriptorArgs;
use clap::Args;
use persistx_store::{SqliteBackend, SqliteProvider};

#[derive(Debug, Args)]
pub struct LoadArgs {
    /// Entity (table) name
    #[arg(long)]
    pub entity: String,

    /// Primary key
    #[arg(long)]
    pub id: i64,

    /// Number of separate sessions to load the entity in
    #[arg(long, default_value_t = 2)]
    pub sessions: u32,

    #[command(flatten)]
    pub descriptor: DescriptorArgs,
}

/// Load the entity once per session and print the record plus statistics
pub fn execute(args: LoadArgs) -> Result<(), Box<dyn std::error::Error>> {
    let provider = SqliteProvider::new(SqliteBackend, args.descriptor.path());
    let factory = provider.session_factory()?;

    let mut record = None;
    for _ in 0..args.sessions.max(1) {
        let mut session = factory.open_session()?;
        record = session.load(&args.entity, args.id)?;
        session.close()?;
    }

    let stats = factory.statistics();
    let report = serde_json::json!({
        "entity": args.entity,
        "id": args.id,
        "record": record,
        "statistics": {
            "sessions_opened": stats.sessions_opened,
            "queries_executed": stats.queries_executed,
            "second_level_cache": {
                "hits": stats.second_level_cache.hits,
                "misses": stats.second_level_cache.misses,
                "puts": stats.second_level_cache.puts,
                "evictions": stats.second_level_cache.evictions,
            },
        },
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    drop(factory);
    provider.shutdown()?;
    Ok(())
}
