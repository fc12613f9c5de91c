//! Mapping runner
//!
//! Applies mapping resources with checksums and idempotency

use crate::errors::{checksum_mismatch, from_rusqlite, io_error, mapping_error, Result};
use crate::mappings::checksums::compute_checksum;
use persistx_core::schema::OP_APPLY_MAPPINGS;
use persistx_core::{log_op_end, log_op_error, log_op_start};
use rusqlite::{Connection, OptionalExtension};
use std::path::{Component, Path, PathBuf};
use std::time::Instant;

/// A mapping loaded into memory
#[derive(Debug, Clone)]
pub struct MappingResource {
    /// Path relative to the descriptor directory, `/`-separated; recorded in
    /// `schema_mappings`
    pub id: String,
    pub sql: String,
}

impl MappingResource {
    /// Read `path`, naming it relative to `base_dir`
    ///
    /// Paths outside `base_dir` keep their full form as id.
    pub fn read(base_dir: &Path, path: &Path) -> Result<Self> {
        let sql =
            std::fs::read_to_string(path).map_err(|e| io_error("read_mapping", path, e))?;
        Ok(Self {
            id: mapping_id(base_dir, path),
            sql,
        })
    }
}

fn mapping_id(base_dir: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(base_dir).unwrap_or(path);
    relative
        .components()
        .filter(|c| *c != Component::CurDir)
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Apply every mapping resource in order; returns how many were newly applied
///
/// `base_dir` is the descriptor directory the resource ids are relative to.
pub fn apply_mappings(conn: &mut Connection, base_dir: &Path, paths: &[PathBuf]) -> Result<usize> {
    let started = Instant::now();
    log_op_start!(OP_APPLY_MAPPINGS, resources = paths.len());

    let result = paths
        .iter()
        .map(|p| MappingResource::read(base_dir, p))
        .collect::<Result<Vec<_>>>()
        .and_then(|resources| apply_resources(conn, &resources));

    match &result {
        Ok(applied) => {
            log_op_end!(
                OP_APPLY_MAPPINGS,
                duration_ms = started.elapsed().as_millis() as u64,
                applied = *applied,
            );
        }
        Err(err) => {
            log_op_error!(
                OP_APPLY_MAPPINGS,
                *err,
                duration_ms = started.elapsed().as_millis() as u64,
            );
        }
    }
    result
}

fn apply_resources(conn: &mut Connection, resources: &[MappingResource]) -> Result<usize> {
    create_mapping_table(conn)?;

    let mut applied = 0;
    for resource in resources {
        if apply_mapping(conn, resource)? {
            applied += 1;
        }
    }
    Ok(applied)
}

/// Create the schema_mappings table if it doesn't exist
fn create_mapping_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_mappings (
            id INTEGER PRIMARY KEY,
            mapping_id TEXT NOT NULL UNIQUE,
            applied_at INTEGER NOT NULL,
            checksum TEXT NOT NULL
        )",
        [],
    )
    .map_err(from_rusqlite)?;

    Ok(())
}

/// Apply a single mapping unless already applied; true if it ran
fn apply_mapping(conn: &mut Connection, resource: &MappingResource) -> Result<bool> {
    let checksum = compute_checksum(&resource.sql);

    let recorded: Option<String> = conn
        .query_row(
            "SELECT checksum FROM schema_mappings WHERE mapping_id = ?1",
            [&resource.id],
            |row| row.get(0),
        )
        .optional()
        .map_err(from_rusqlite)?;

    if let Some(recorded) = recorded {
        if recorded != checksum {
            return Err(checksum_mismatch(&resource.id, &recorded, &checksum));
        }
        return Ok(false);
    }

    let tx = conn.transaction().map_err(from_rusqlite)?;

    tx.execute_batch(&resource.sql)
        .map_err(|e| mapping_error(&resource.id, &e.to_string()))?;

    let now = chrono::Utc::now().timestamp();
    tx.execute(
        "INSERT INTO schema_mappings (mapping_id, applied_at, checksum) VALUES (?1, ?2, ?3)",
        rusqlite::params![resource.id, now, checksum],
    )
    .map_err(from_rusqlite)?;

    tx.commit().map_err(from_rusqlite)?;

    tracing::debug!(mapping_id = %resource.id, "mapping applied");
    Ok(true)
}
