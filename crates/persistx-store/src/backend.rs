//! SQLite backend wiring
//!
//! Builds a [`SqliteRegistry`] (pool + cache manager, mappings applied) and a
//! [`SqliteSessionFactory`] on top of it.

use crate::db::Target;
use crate::errors::Result;
use crate::factory::SqliteSessionFactory;
use crate::mappings::apply_mappings;
use crate::pool::ConnectionPool;
use crate::registry::SqliteRegistry;
use persistx_core::errors::registry_closed;
use persistx_core::{Backend, Configuration, ResourceRegistry, SessionFactory};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteBackend;

impl Backend for SqliteBackend {
    type Registry = SqliteRegistry;

    fn build_registry(&self, config: &Configuration) -> Result<Arc<SqliteRegistry>> {
        let id = uuid::Uuid::now_v7().to_string();
        let target = Target::new(config.database(), &id);
        let pool = ConnectionPool::open(&target, config.connection())?;

        let applied = pool
            .checkout()
            .and_then(|mut conn| apply_mappings(&mut conn, config.base_dir(), &config.mapping_paths()));
        let applied = match applied {
            Ok(applied) => applied,
            Err(err) => {
                if let Err(close_err) = pool.close() {
                    tracing::warn!(registry_id = %id, error = %close_err, "failed to close pool");
                }
                return Err(err);
            }
        };

        tracing::info!(
            registry_id = %id,
            database = target.uri(),
            pool_size = pool.size(),
            username = config.connection().username.as_deref().unwrap_or(""),
            second_level_cache = config.second_level_cache_enabled(),
            mappings_applied = applied,
            "sqlite registry built"
        );
        Ok(Arc::new(SqliteRegistry::new(
            id,
            target,
            pool,
            config.cache_manager(),
        )))
    }

    fn build_session_factory(
        &self,
        _config: &Configuration,
        registry: Arc<SqliteRegistry>,
    ) -> Result<Arc<dyn SessionFactory>> {
        if registry.is_closed() {
            return Err(registry_closed("build_session_factory"));
        }
        Ok(Arc::new(SqliteSessionFactory::new(registry)))
    }
}
