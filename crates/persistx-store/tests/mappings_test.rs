// Integration tests for mapping resources
// Covers: idempotent application, checksum tracking, tamper detection

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::EMPLOYEE_MAPPING;
use persistx_core::ExErrorKind;
use persistx_store::mappings::{apply_mappings, compute_checksum};
use persistx_store::{SqliteBackend, SqliteProvider};
use rusqlite::Connection;
use tempfile::TempDir;

fn write_mapping(dir: &TempDir, name: &str, sql: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, sql).unwrap();
    path
}

#[test]
fn test_apply_mappings_on_empty_db() {
    // Given: an empty database and one mapping file
    let dir = TempDir::new().unwrap();
    let mapping = write_mapping(&dir, "employee.sql", EMPLOYEE_MAPPING);
    let mut conn = Connection::open_in_memory().unwrap();

    // When: mappings are applied
    let applied = apply_mappings(&mut conn, dir.path(), &[mapping]).unwrap();

    // Then: the entity table and the bookkeeping table exist
    assert_eq!(applied, 1);
    let tables = get_table_names(&conn);
    assert!(tables.contains(&"employee".to_string()));
    assert!(tables.contains(&"schema_mappings".to_string()));
}

#[test]
fn test_mapping_idempotency() {
    let dir = TempDir::new().unwrap();
    let mapping = write_mapping(&dir, "employee.sql", EMPLOYEE_MAPPING);
    let mut conn = Connection::open_in_memory().unwrap();

    apply_mappings(&mut conn, dir.path(), std::slice::from_ref(&mapping)).unwrap();
    let applied = apply_mappings(&mut conn, dir.path(), &[mapping]).unwrap();

    assert_eq!(applied, 0, "Re-running mappings should apply nothing");
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM schema_mappings", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn test_checksum_recorded() {
    let dir = TempDir::new().unwrap();
    let mapping = write_mapping(&dir, "employee.sql", EMPLOYEE_MAPPING);
    let mut conn = Connection::open_in_memory().unwrap();
    apply_mappings(&mut conn, dir.path(), &[mapping]).unwrap();

    let checksum: String = conn
        .query_row(
            "SELECT checksum FROM schema_mappings WHERE mapping_id = ?1",
            ["employee.sql"],
            |row| row.get(0),
        )
        .unwrap();

    assert_eq!(checksum, compute_checksum(EMPLOYEE_MAPPING));
}

#[test]
fn test_same_file_name_in_different_directories_are_distinct_mappings() {
    // Given: two mappings sharing a file name under different directories
    let dir = TempDir::new().unwrap();
    let hr = write_mapping(&dir, "hr/employee.sql", EMPLOYEE_MAPPING);
    let audit = write_mapping(
        &dir,
        "audit/employee.sql",
        "CREATE TABLE employee_audit (id INTEGER PRIMARY KEY, note TEXT);",
    );
    let mut conn = Connection::open_in_memory().unwrap();

    // When: both are applied
    let applied = apply_mappings(&mut conn, dir.path(), &[hr, audit]).unwrap();

    // Then: each is recorded under its descriptor-relative path
    assert_eq!(applied, 2);
    let ids: Vec<String> = conn
        .prepare("SELECT mapping_id FROM schema_mappings ORDER BY mapping_id")
        .unwrap()
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(ids, vec!["audit/employee.sql", "hr/employee.sql"]);
    assert!(get_table_names(&conn).contains(&"employee_audit".to_string()));
}

#[test]
fn test_edited_mapping_is_rejected() {
    // Given: a mapping applied to a database
    let dir = TempDir::new().unwrap();
    let mapping = write_mapping(&dir, "employee.sql", EMPLOYEE_MAPPING);
    let mut conn = Connection::open_in_memory().unwrap();
    apply_mappings(&mut conn, dir.path(), std::slice::from_ref(&mapping)).unwrap();

    // When: the file changes and mappings are applied again
    std::fs::write(&mapping, "CREATE TABLE employee (id INTEGER PRIMARY KEY);").unwrap();
    let err = apply_mappings(&mut conn, dir.path(), &[mapping]).unwrap_err();

    // Then: the checksum mismatch is reported
    assert_eq!(err.kind(), ExErrorKind::ConstraintViolation);
    assert!(err.message().contains("employee.sql"));
}

#[test]
fn test_edited_mapping_fails_provider_initialization() {
    // Given: a file database initialized once
    let dir = TempDir::new().unwrap();
    let mapping = write_mapping(&dir, "employee.sql", EMPLOYEE_MAPPING);
    let descriptor = dir.path().join("persistx.toml");
    std::fs::write(
        &descriptor,
        "[connection]\nurl = \"sqlite://app.db\"\n[mappings]\nresources = [\"employee.sql\"]\n",
    )
    .unwrap();
    let provider = SqliteProvider::new(SqliteBackend, &descriptor);
    provider.initialize().unwrap();
    provider.shutdown().unwrap();

    // When: the mapping is edited and a new provider starts
    std::fs::write(&mapping, "CREATE TABLE employee (id INTEGER PRIMARY KEY, extra TEXT);")
        .unwrap();
    let provider = SqliteProvider::new(SqliteBackend, &descriptor);

    // Then: initialization fails with the mismatch as root cause
    let err = provider.initialize().unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::Initialization);
    assert_eq!(err.root_cause().kind(), ExErrorKind::ConstraintViolation);
}

// Helper function to get all table names from the database
fn get_table_names(conn: &Connection) -> Vec<String> {
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
        .unwrap();

    let tables = stmt
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<String>, _>>()
        .unwrap();

    tables
}
