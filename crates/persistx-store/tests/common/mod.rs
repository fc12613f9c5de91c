#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use persistx_core::Record;
use std::path::PathBuf;
use tempfile::TempDir;

pub const EMPLOYEE_MAPPING: &str = "
CREATE TABLE employee (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    role TEXT,
    salary INTEGER
);
";

pub const COUNTRY_MAPPING: &str = "
CREATE TABLE country (
    id INTEGER PRIMARY KEY,
    code TEXT NOT NULL
);
";

/// A temp directory holding a descriptor and its mapping resources
pub struct Fixture {
    pub dir: TempDir,
    pub descriptor: PathBuf,
}

impl Fixture {
    /// Write `descriptor` plus `schema/employee.sql` and `schema/country.sql`
    pub fn new(descriptor: &str) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let schema = dir.path().join("schema");
        std::fs::create_dir_all(&schema).unwrap();
        std::fs::write(schema.join("employee.sql"), EMPLOYEE_MAPPING).unwrap();
        std::fs::write(schema.join("country.sql"), COUNTRY_MAPPING).unwrap();
        let path = dir.path().join("persistx.toml");
        std::fs::write(&path, descriptor).unwrap();
        Self {
            dir,
            descriptor: path,
        }
    }
}

/// In-memory store with both mappings and the given `[cache]` body
pub fn memory_descriptor(cache_section: &str) -> String {
    format!(
        r#"
[connection]
url = "sqlite::memory:"
pool_size = 3
acquire_timeout_ms = 500

[mappings]
resources = ["schema/employee.sql", "schema/country.sql"]

{}
"#,
        cache_section
    )
}

pub fn employee(name: &str, role: &str) -> Record {
    let mut record = Record::new();
    record.insert("name".to_string(), serde_json::json!(name));
    record.insert("role".to_string(), serde_json::json!(role));
    record
}
