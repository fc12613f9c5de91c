//! SQLite session
//!
//! Holds one pooled connection for its lifetime. Loads go through the
//! per-session identity map first, then the shared second-level cache, then
//! the database. Writes update or invalidate the second-level cache according
//! to the entity region's [`CacheStrategy`].

use crate::errors::{
    from_rusqlite, invalid_identifier, read_only_violation, transaction_state, Result,
};
use crate::factory::SessionCounters;
use crate::pool::PooledConnection;
use persistx_core::config::is_identifier;
use persistx_core::errors::session_closed;
use persistx_core::cache::region_name;
use persistx_core::{CacheManager, CacheStrategy, Record, Session};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Primary key column every mapped entity table must declare
pub const ID_COLUMN: &str = "id";

type EntityKey = (String, i64);

/// Cache write deferred until commit
struct StagedWrite {
    entity: String,
    id: i64,
    record: Option<Record>,
}

pub struct SqliteSession {
    id: String,
    conn: Option<PooledConnection>,
    cache: Arc<CacheManager>,
    counters: Arc<SessionCounters>,
    first_level: HashMap<EntityKey, Record>,
    staged: Vec<StagedWrite>,
    in_transaction: bool,
}

impl SqliteSession {
    pub(crate) fn new(
        conn: PooledConnection,
        cache: Arc<CacheManager>,
        counters: Arc<SessionCounters>,
    ) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            conn: Some(conn),
            cache,
            counters,
            first_level: HashMap::new(),
            staged: Vec::new(),
            in_transaction: false,
        }
    }

    /// Entries currently held in this session's identity map
    pub fn first_level_len(&self) -> usize {
        self.first_level.len()
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    fn count_query(&self) {
        self.counters.queries_executed.fetch_add(1, Ordering::Relaxed);
    }

    fn record_cache_write(
        &mut self,
        entity: &str,
        id: i64,
        strategy: Option<CacheStrategy>,
        fresh: Option<Record>,
    ) {
        let Some(strategy) = strategy else {
            return;
        };
        match strategy {
            // Inserts into read-only regions are cached lazily on first load
            CacheStrategy::ReadOnly => {}
            CacheStrategy::NonstrictReadWrite => {
                self.cache.invalidate(entity, id);
                // Another session may reload the old row before commit
                if self.in_transaction {
                    self.staged.push(StagedWrite {
                        entity: entity.to_string(),
                        id,
                        record: None,
                    });
                }
            }
            CacheStrategy::ReadWrite | CacheStrategy::Transactional if self.in_transaction => {
                if strategy == CacheStrategy::ReadWrite {
                    self.cache.invalidate(entity, id);
                }
                self.staged.push(StagedWrite {
                    entity: entity.to_string(),
                    id,
                    record: fresh,
                });
            }
            CacheStrategy::ReadWrite | CacheStrategy::Transactional => match fresh {
                Some(record) => self.cache.put(entity, id, record),
                None => {
                    self.cache.invalidate(entity, id);
                }
            },
        }
    }
}

impl Session for SqliteSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    fn ping(&mut self) -> Result<()> {
        let conn = connection(&self.conn, "session.ping")?;
        let _one: i64 = conn
            .query_row("SELECT 1", [], |row| row.get(0))
            .map_err(from_rusqlite)?;
        self.count_query();
        Ok(())
    }

    fn execute(&mut self, sql: &str) -> Result<usize> {
        let conn = connection(&self.conn, "session.execute")?;
        let changed = conn.execute(sql, []).map_err(from_rusqlite)?;
        self.count_query();
        // Raw statements bypass entity tracking, so nothing cached can be trusted
        self.first_level.clear();
        self.cache.clear();
        Ok(changed)
    }

    fn load(&mut self, entity: &str, id: i64) -> Result<Option<Record>> {
        let conn = connection(&self.conn, "session.load")?;
        let entity = entity_name("session.load", entity)?;
        let entity = entity.as_str();

        let key = (entity.to_string(), id);
        if let Some(record) = self.first_level.get(&key) {
            return Ok(Some(record.clone()));
        }

        let cached = self.cache.strategy_for(entity).is_some();
        if cached {
            if let Some(record) = self.cache.get(entity, id) {
                tracing::trace!(session_id = %self.id, region = entity, id, "second-level cache hit");
                self.first_level.insert(key, record.clone());
                return Ok(Some(record));
            }
        }

        let row = select_row(conn, entity, id)?;
        self.count_query();
        if let Some(record) = &row {
            // Rows read inside a transaction may include uncommitted writes
            if cached && !self.in_transaction {
                self.cache.put(entity, id, record.clone());
            }
            self.first_level.insert(key, record.clone());
        }
        Ok(row)
    }

    fn save(&mut self, entity: &str, id: i64, record: Record) -> Result<()> {
        let conn = connection(&self.conn, "session.save")?;
        let entity = entity_name("session.save", entity)?;
        let entity = entity.as_str();
        let columns: Vec<&str> = record
            .keys()
            .map(String::as_str)
            .filter(|c| *c != ID_COLUMN)
            .collect();
        for column in &columns {
            ensure_identifier("session.save", column)?;
        }

        let strategy = self.cache.strategy_for(entity);
        if strategy == Some(CacheStrategy::ReadOnly) {
            let exists = row_exists(conn, entity, id)?;
            self.count_query();
            if exists {
                return Err(read_only_violation(entity, id));
            }
        }

        upsert(conn, entity, id, &record, &columns)?;
        let fresh = select_row(conn, entity, id)?;
        self.counters.queries_executed.fetch_add(2, Ordering::Relaxed);

        let key = (entity.to_string(), id);
        match &fresh {
            Some(row) => {
                self.first_level.insert(key, row.clone());
            }
            None => {
                self.first_level.remove(&key);
            }
        }
        self.record_cache_write(entity, id, strategy, fresh);
        Ok(())
    }

    fn begin(&mut self) -> Result<()> {
        let conn = connection(&self.conn, "session.begin")?;
        if self.in_transaction {
            return Err(transaction_state("session.begin", "a transaction is already active"));
        }
        conn.execute_batch("BEGIN").map_err(from_rusqlite)?;
        self.in_transaction = true;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        let conn = connection(&self.conn, "session.commit")?;
        if !self.in_transaction {
            return Err(transaction_state("session.commit", "no active transaction"));
        }
        conn.execute_batch("COMMIT").map_err(from_rusqlite)?;
        self.in_transaction = false;
        for write in self.staged.drain(..) {
            match write.record {
                Some(record) => self.cache.put(&write.entity, write.id, record),
                None => {
                    self.cache.invalidate(&write.entity, write.id);
                }
            }
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        let conn = connection(&self.conn, "session.rollback")?;
        if !self.in_transaction {
            return Err(transaction_state("session.rollback", "no active transaction"));
        }
        conn.execute_batch("ROLLBACK").map_err(from_rusqlite)?;
        self.in_transaction = false;
        self.staged.clear();
        self.first_level.clear();
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.conn.is_none() {
            return Ok(());
        }
        let rolled_back = if self.in_transaction {
            self.rollback()
        } else {
            Ok(())
        };
        self.conn = None;
        self.first_level.clear();
        self.staged.clear();
        self.counters.sessions_closed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(session_id = %self.id, "session closed");
        rolled_back
    }
}

impl Drop for SqliteSession {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(session_id = %self.id, error = %err, "failed to close session on drop");
        }
    }
}

fn connection<'a>(conn: &'a Option<PooledConnection>, op: &str) -> Result<&'a Connection> {
    conn.as_deref().ok_or_else(|| session_closed(op))
}

/// Validated entity name, folded to its region name
///
/// Used for SQL, the identity map and the second-level cache alike, so
/// `Employee` and `employee` resolve to one table, one key and one strategy.
fn entity_name(op: &str, entity: &str) -> Result<String> {
    ensure_identifier(op, entity)?;
    Ok(region_name(entity))
}

fn ensure_identifier(op: &str, name: &str) -> Result<()> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(invalid_identifier(op, name))
    }
}

fn row_exists(conn: &Connection, entity: &str, id: i64) -> Result<bool> {
    let sql = format!("SELECT 1 FROM \"{}\" WHERE \"{}\" = ?1", entity, ID_COLUMN);
    conn.query_row(&sql, [id], |_| Ok(()))
        .optional()
        .map(|found| found.is_some())
        .map_err(from_rusqlite)
}

fn select_row(conn: &Connection, entity: &str, id: i64) -> Result<Option<Record>> {
    let sql = format!("SELECT * FROM \"{}\" WHERE \"{}\" = ?1", entity, ID_COLUMN);
    let mut stmt = conn.prepare(&sql).map_err(from_rusqlite)?;
    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();
    stmt.query_row([id], |row| row_to_record(row, &columns))
        .optional()
        .map_err(from_rusqlite)
}

fn upsert(
    conn: &Connection,
    entity: &str,
    id: i64,
    record: &Record,
    columns: &[&str],
) -> Result<usize> {
    let names: Vec<String> = std::iter::once(ID_COLUMN)
        .chain(columns.iter().copied())
        .map(|c| format!("\"{}\"", c))
        .collect();
    let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{}", i)).collect();
    let on_conflict = if columns.is_empty() {
        "DO NOTHING".to_string()
    } else {
        let assignments: Vec<String> = columns
            .iter()
            .map(|c| format!("\"{0}\" = excluded.\"{0}\"", c))
            .collect();
        format!("DO UPDATE SET {}", assignments.join(", "))
    };
    let sql = format!(
        "INSERT INTO \"{}\" ({}) VALUES ({}) ON CONFLICT(\"{}\") {}",
        entity,
        names.join(", "),
        placeholders.join(", "),
        ID_COLUMN,
        on_conflict
    );

    let values = std::iter::once(SqlValue::Integer(id)).chain(
        columns
            .iter()
            .map(|c| record.get(*c).map(to_sql_value).unwrap_or(SqlValue::Null)),
    );
    conn.execute(&sql, params_from_iter(values))
        .map_err(from_rusqlite)
}

fn row_to_record(row: &Row<'_>, columns: &[String]) -> rusqlite::Result<Record> {
    let mut record = Record::new();
    for (idx, name) in columns.iter().enumerate() {
        let value = match row.get_ref(idx)? {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(v) => Value::from(v),
            ValueRef::Real(v) => serde_json::Number::from_f64(v)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ValueRef::Text(text) => Value::String(String::from_utf8_lossy(text).into_owned()),
            ValueRef::Blob(bytes) => Value::String(hex::encode(bytes)),
        };
        record.insert(name.clone(), value);
    }
    Ok(record)
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => n.as_f64().map(SqlValue::Real).unwrap_or(SqlValue::Null),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}
