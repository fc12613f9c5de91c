//! PersistX Core - session factory lifecycle and second-level cache model
//!
//! This crate provides:
//! - `SessionFactoryProvider`: single, guarded construction of the session
//!   factory plus explicit shutdown of its resource registry
//! - Capability traits (`ResourceRegistry`, `SessionFactory`, `Session`,
//!   `Backend`) at the framework boundary
//! - Descriptor loading and validation (`Configuration`)
//! - The second-level cache model (`CacheStrategy`, `CacheManager`)
//! - The error and structured logging facilities

pub mod boundary;
pub mod cache;
pub mod config;
pub mod errors;
pub mod logging_facility;
pub mod provider;

pub use persistx_core_types::schema;

// Re-export commonly used types
pub use boundary::{Backend, FactoryStatistics, Record, ResourceRegistry, Session, SessionFactory};
pub use cache::{CacheManager, CacheStatistics, CacheStrategy};
pub use config::{Configuration, DatabaseLocation};
pub use errors::{ConfigError, ExError, ExErrorKind, Result};
pub use provider::{ProviderState, SessionFactoryProvider};
