//! Mock backend for provider tests

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use persistx_core::errors::{registry_closed, ExError, ExErrorKind, Result};
use persistx_core::{
    Backend, Configuration, FactoryStatistics, Record, ResourceRegistry, Session, SessionFactory,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const VALID_DESCRIPTOR: &str = r#"
[connection]
url = "sqlite::memory:"
pool_size = 2
"#;

/// Write `content` as `persistx.toml` inside a fresh temp dir
pub fn write_descriptor(content: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("persistx.toml");
    std::fs::write(&path, content).expect("write descriptor");
    (dir, path)
}

#[derive(Default)]
pub struct MockRegistry {
    closed: AtomicBool,
    pub destroy_calls: AtomicUsize,
    fail_destroy: bool,
}

impl ResourceRegistry for MockRegistry {
    fn id(&self) -> &str {
        "mock-registry"
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn destroy(&self) -> Result<()> {
        self.destroy_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        if self.fail_destroy {
            return Err(ExError::new(ExErrorKind::Persistence).with_message("pool refused to close"));
        }
        Ok(())
    }
}

pub struct MockFactory {
    registry: Arc<MockRegistry>,
}

impl SessionFactory for MockFactory {
    fn open_session(&self) -> Result<Box<dyn Session>> {
        if self.registry.is_closed() {
            return Err(registry_closed("mock.open_session"));
        }
        Ok(Box::new(MockSession { open: true }))
    }

    fn is_closed(&self) -> bool {
        self.registry.is_closed()
    }

    fn statistics(&self) -> FactoryStatistics {
        FactoryStatistics::default()
    }
}

pub struct MockSession {
    open: bool,
}

impl Session for MockSession {
    fn id(&self) -> &str {
        "mock-session"
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn ping(&mut self) -> Result<()> {
        Ok(())
    }

    fn execute(&mut self, _sql: &str) -> Result<usize> {
        Ok(0)
    }

    fn load(&mut self, _entity: &str, _id: i64) -> Result<Option<Record>> {
        Ok(None)
    }

    fn save(&mut self, _entity: &str, _id: i64, _record: Record) -> Result<()> {
        Ok(())
    }

    fn begin(&mut self) -> Result<()> {
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.open = false;
        Ok(())
    }
}

/// Backend that counts builds and can be told to fail
#[derive(Default)]
pub struct MockBackend {
    pub registry_builds: AtomicUsize,
    pub factory_builds: AtomicUsize,
    pub fail_factory: bool,
    pub fail_destroy: bool,
    pub build_delay: Option<Duration>,
    pub last_registry: std::sync::Mutex<Option<Arc<MockRegistry>>>,
}

impl MockBackend {
    pub fn last_registry(&self) -> Arc<MockRegistry> {
        self.last_registry
            .lock()
            .unwrap()
            .clone()
            .expect("registry was built")
    }
}

impl Backend for MockBackend {
    type Registry = MockRegistry;

    fn build_registry(&self, _config: &Configuration) -> Result<Arc<MockRegistry>> {
        if let Some(delay) = self.build_delay {
            std::thread::sleep(delay);
        }
        self.registry_builds.fetch_add(1, Ordering::SeqCst);
        let registry = Arc::new(MockRegistry {
            fail_destroy: self.fail_destroy,
            ..MockRegistry::default()
        });
        *self.last_registry.lock().unwrap() = Some(Arc::clone(&registry));
        Ok(registry)
    }

    fn build_session_factory(
        &self,
        _config: &Configuration,
        registry: Arc<MockRegistry>,
    ) -> Result<Arc<dyn SessionFactory>> {
        self.factory_builds.fetch_add(1, Ordering::SeqCst);
        if self.fail_factory {
            return Err(ExError::new(ExErrorKind::Persistence).with_message("factory construction failed"));
        }
        Ok(Arc::new(MockFactory { registry }))
    }
}
