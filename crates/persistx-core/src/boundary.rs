//! Capability traits at the framework boundary
//!
//! The provider only ever talks to these traits, so the SQLite backend in
//! `persistx-store` can be swapped for a mock in tests.

use crate::cache::CacheStatistics;
use crate::config::Configuration;
use crate::errors::Result;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A single entity row: column name to value
pub type Record = BTreeMap<String, serde_json::Value>;

/// Framework-managed infrastructure (connection pool, cache manager)
pub trait ResourceRegistry: Send + Sync {
    /// Stable identifier, used in logs
    fn id(&self) -> &str;

    /// True once `destroy` has completed
    fn is_closed(&self) -> bool;

    /// Release every resource held by the registry
    ///
    /// # Errors
    ///
    /// Returns the teardown failure of the underlying resources. Calling
    /// `destroy` on an already destroyed registry is a no-op.
    fn destroy(&self) -> Result<()>;
}

/// Counters reported by a session factory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FactoryStatistics {
    pub sessions_opened: u64,
    pub sessions_closed: u64,
    pub queries_executed: u64,
    pub second_level_cache: CacheStatistics,
}

/// Long-lived handle producing short-lived sessions
pub trait SessionFactory: Send + Sync {
    /// Open a new session
    ///
    /// # Errors
    ///
    /// `RegistryClosed` once the owning registry was destroyed; `Timeout`
    /// when no connection became available in time.
    fn open_session(&self) -> Result<Box<dyn Session>>;

    /// True once the owning registry was destroyed
    fn is_closed(&self) -> bool;

    fn statistics(&self) -> FactoryStatistics;
}

/// A unit of database interaction with its own first-level cache
pub trait Session: Send {
    fn id(&self) -> &str;

    fn is_open(&self) -> bool;

    /// Round-trip to the store
    ///
    /// # Errors
    ///
    /// `SessionClosed` after `close`; `Persistence` on driver failure.
    fn ping(&mut self) -> Result<()>;

    /// Execute a statement that returns no rows; yields the changed row count
    ///
    /// # Errors
    ///
    /// `SessionClosed` after `close`; `Persistence` on driver failure.
    fn execute(&mut self, sql: &str) -> Result<usize>;

    /// Load an entity by primary key, consulting the first- then second-level cache
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a bad entity name; `Persistence` on driver failure.
    fn load(&mut self, entity: &str, id: i64) -> Result<Option<Record>>;

    /// Insert or update an entity, honouring the region's cache strategy
    ///
    /// # Errors
    ///
    /// `CacheStrategyViolation` when modifying an entity in a read-only
    /// region; `InvalidInput` for bad names; `Persistence` on driver failure.
    fn save(&mut self, entity: &str, id: i64, record: Record) -> Result<()>;

    /// # Errors
    ///
    /// `TransactionState` when a transaction is already active.
    fn begin(&mut self) -> Result<()>;

    /// # Errors
    ///
    /// `TransactionState` when no transaction is active.
    fn commit(&mut self) -> Result<()>;

    /// # Errors
    ///
    /// `TransactionState` when no transaction is active.
    fn rollback(&mut self) -> Result<()>;

    /// Return the connection to the pool; later calls are no-ops
    ///
    /// # Errors
    ///
    /// Propagates a failed rollback of an open transaction.
    fn close(&mut self) -> Result<()>;
}

/// Builds the registry and the session factory from a configuration
pub trait Backend: Send + Sync {
    type Registry: ResourceRegistry + 'static;

    /// # Errors
    ///
    /// Any failure acquiring infrastructure (unreachable store, bad mappings).
    fn build_registry(&self, config: &Configuration) -> Result<Arc<Self::Registry>>;

    /// # Errors
    ///
    /// Any failure constructing the factory on top of `registry`.
    fn build_session_factory(
        &self,
        config: &Configuration,
        registry: Arc<Self::Registry>,
    ) -> Result<Arc<dyn SessionFactory>>;
}
