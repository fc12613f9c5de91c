//! PersistX Store - SQLite backend for the session factory provider
//!
//! Provides:
//! - A fixed-size rusqlite connection pool
//! - `SqliteRegistry`: pool plus second-level cache manager
//! - Mapping resources applied with checksums
//! - `SqliteSessionFactory` and `SqliteSession`
//! - `SqliteBackend`, the `Backend` implementation tying it together

pub mod backend;
pub mod db;
pub mod errors;
pub mod factory;
pub mod mappings;
pub mod pool;
pub mod registry;
pub mod session;

// Re-export key types
pub use backend::SqliteBackend;
pub use errors::Result;
pub use factory::SqliteSessionFactory;
pub use registry::SqliteRegistry;
pub use session::SqliteSession;

/// Provider wired to the SQLite backend
pub type SqliteProvider = persistx_core::SessionFactoryProvider<SqliteBackend>;
