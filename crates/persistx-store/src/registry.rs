//! SQLite resource registry
//!
//! Bundles the connection pool and the second-level cache manager of one
//! session factory. Destroying it closes the pool and empties the cache.

use crate::db::Target;
use crate::errors::Result;
use crate::pool::ConnectionPool;
use persistx_core::{CacheManager, ResourceRegistry};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

pub struct SqliteRegistry {
    id: String,
    target: Target,
    pool: Arc<ConnectionPool>,
    cache: Arc<CacheManager>,
    destroyed: AtomicBool,
    destroy_count: AtomicUsize,
}

impl SqliteRegistry {
    pub fn new(id: String, target: Target, pool: Arc<ConnectionPool>, cache: CacheManager) -> Self {
        Self {
            id,
            target,
            pool,
            cache: Arc::new(cache),
            destroyed: AtomicBool::new(false),
            destroy_count: AtomicUsize::new(0),
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    /// How many times teardown actually ran (0 or 1)
    pub fn destroy_count(&self) -> usize {
        self.destroy_count.load(Ordering::SeqCst)
    }
}

impl ResourceRegistry for SqliteRegistry {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_closed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    fn destroy(&self) -> Result<()> {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.destroy_count.fetch_add(1, Ordering::SeqCst);
        self.cache.clear();
        let closed = self.pool.close();
        tracing::info!(
            registry_id = %self.id,
            ok = closed.is_ok(),
            "resource registry destroyed"
        );
        closed
    }
}
