//! SQLite session factory

use crate::errors::Result;
use crate::registry::SqliteRegistry;
use crate::session::SqliteSession;
use persistx_core::errors::registry_closed;
use persistx_core::schema::OP_OPEN_SESSION;
use persistx_core::{FactoryStatistics, ResourceRegistry, Session, SessionFactory};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters shared between a factory and the sessions it opened
#[derive(Debug, Default)]
pub struct SessionCounters {
    pub sessions_opened: AtomicU64,
    pub sessions_closed: AtomicU64,
    pub queries_executed: AtomicU64,
}

pub struct SqliteSessionFactory {
    registry: Arc<SqliteRegistry>,
    counters: Arc<SessionCounters>,
}

impl SqliteSessionFactory {
    pub fn new(registry: Arc<SqliteRegistry>) -> Self {
        Self {
            registry,
            counters: Arc::new(SessionCounters::default()),
        }
    }

    pub fn registry(&self) -> &Arc<SqliteRegistry> {
        &self.registry
    }

    /// Open a session with its concrete type
    ///
    /// # Errors
    ///
    /// `RegistryClosed` once the registry was destroyed; `Timeout` when the
    /// pool stays exhausted.
    pub fn open_sqlite_session(&self) -> Result<SqliteSession> {
        if self.registry.is_closed() {
            return Err(registry_closed(OP_OPEN_SESSION));
        }
        let conn = self.registry.pool().checkout()?;
        let session = SqliteSession::new(
            conn,
            Arc::clone(self.registry.cache()),
            Arc::clone(&self.counters),
        );
        self.counters.sessions_opened.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            op = OP_OPEN_SESSION,
            registry_id = self.registry.id(),
            session_id = session.id(),
            "session opened"
        );
        Ok(session)
    }
}

impl SessionFactory for SqliteSessionFactory {
    fn open_session(&self) -> Result<Box<dyn Session>> {
        Ok(Box::new(self.open_sqlite_session()?))
    }

    fn is_closed(&self) -> bool {
        self.registry.is_closed()
    }

    fn statistics(&self) -> FactoryStatistics {
        FactoryStatistics {
            sessions_opened: self.counters.sessions_opened.load(Ordering::Relaxed),
            sessions_closed: self.counters.sessions_closed.load(Ordering::Relaxed),
            queries_executed: self.counters.queries_executed.load(Ordering::Relaxed),
            second_level_cache: self.registry.cache().statistics(),
        }
    }
}
