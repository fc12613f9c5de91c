//! Database connection management
//!
//! Opens SQLite connections for a configured [`DatabaseLocation`]

use crate::errors::{from_rusqlite, Result};
use persistx_core::config::ConnectionSettings;
use persistx_core::DatabaseLocation;
use rusqlite::{Connection, OpenFlags};
use std::time::Duration;

/// Concrete SQLite target for one registry
///
/// Each `Memory` registry gets its own named shared-cache database, so all
/// pooled connections see the same data while separate registries stay
/// isolated.
#[derive(Debug, Clone)]
pub struct Target {
    uri: String,
    in_memory: bool,
}

impl Target {
    pub fn new(location: &DatabaseLocation, registry_id: &str) -> Self {
        match location {
            DatabaseLocation::Memory => Self {
                uri: format!("file:persistx-{}?mode=memory&cache=shared", registry_id),
                in_memory: true,
            },
            DatabaseLocation::File(path) => Self {
                uri: path.display().to_string(),
                in_memory: false,
            },
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn is_in_memory(&self) -> bool {
        self.in_memory
    }
}

/// Open a connection to `target` and apply the configured pragmas
pub fn open(target: &Target, settings: &ConnectionSettings) -> Result<Connection> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_URI
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let conn = Connection::open_with_flags(target.uri(), flags).map_err(from_rusqlite)?;
    configure(&conn, target, settings)?;
    Ok(conn)
}

/// Configure a connection with the descriptor's settings
pub fn configure(conn: &Connection, target: &Target, settings: &ConnectionSettings) -> Result<()> {
    conn.busy_timeout(Duration::from_millis(settings.acquire_timeout_ms))
        .map_err(from_rusqlite)?;

    let foreign_keys = if settings.foreign_keys { "ON" } else { "OFF" };
    conn.execute_batch(&format!("PRAGMA foreign_keys = {};", foreign_keys))
        .map_err(from_rusqlite)?;

    if !target.is_in_memory() {
        // WAL lets pooled readers proceed while one session writes
        let _mode: String = conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .map_err(from_rusqlite)?;
    }

    Ok(())
}
