//! Process-scoped session factory provider
//!
//! [`SessionFactoryProvider`] owns the one registry and the one session
//! factory of an application context. Construction happens under a mutex,
//! so concurrent first callers build at most once. After [`shutdown`] the
//! provider is terminal: the accessor fails with `UseAfterShutdown`.
//!
//! [`shutdown`]: SessionFactoryProvider::shutdown

use crate::boundary::{Backend, ResourceRegistry, SessionFactory};
use crate::config::Configuration;
use crate::errors::{initialization_error, ExError, ExErrorKind, Result};
use crate::schema::{OP_INITIALIZE, OP_SHUTDOWN};
use crate::{log_op_end, log_op_error, log_op_start};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Observable lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderState {
    Uninitialized,
    Ready,
    ShutDown,
}

enum Slot<R> {
    Uninitialized,
    Ready {
        registry: Arc<R>,
        factory: Arc<dyn SessionFactory>,
    },
    ShutDown,
}

pub struct SessionFactoryProvider<B: Backend> {
    backend: B,
    descriptor: PathBuf,
    slot: Mutex<Slot<B::Registry>>,
}

impl<B: Backend> SessionFactoryProvider<B> {
    /// Create a provider; nothing is loaded until first use
    pub fn new(backend: B, descriptor: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            descriptor: descriptor.into(),
            slot: Mutex::new(Slot::Uninitialized),
        }
    }

    /// Provider reading [`Configuration::default_descriptor`]
    pub fn with_default_descriptor(backend: B) -> Self {
        Self::new(backend, Configuration::default_descriptor())
    }

    pub fn descriptor(&self) -> &Path {
        &self.descriptor
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn state(&self) -> ProviderState {
        match &*self.lock() {
            Slot::Uninitialized => ProviderState::Uninitialized,
            Slot::Ready { .. } => ProviderState::Ready,
            Slot::ShutDown => ProviderState::ShutDown,
        }
    }

    /// Build the factory eagerly at application startup
    ///
    /// # Errors
    ///
    /// Same as [`session_factory`](Self::session_factory).
    pub fn initialize(&self) -> Result<()> {
        self.session_factory().map(|_| ())
    }

    /// Shared session factory, built on first call
    ///
    /// Every successful call returns the same `Arc`.
    ///
    /// # Errors
    ///
    /// `Initialization` (with the cause as source) when loading the
    /// descriptor or building the registry/factory fails; nothing is
    /// retained and the next call tries again. `UseAfterShutdown` once
    /// [`shutdown`](Self::shutdown) ran.
    pub fn session_factory(&self) -> Result<Arc<dyn SessionFactory>> {
        let mut slot = self.lock();
        match &*slot {
            Slot::Ready { factory, .. } => return Ok(Arc::clone(factory)),
            Slot::ShutDown => {
                return Err(ExError::new(ExErrorKind::UseAfterShutdown)
                    .with_op("provider.session_factory")
                    .with_message("session factory requested after shutdown"))
            }
            Slot::Uninitialized => {}
        }

        let started = Instant::now();
        let descriptor = self.descriptor.display().to_string();
        log_op_start!(OP_INITIALIZE, descriptor = %descriptor);

        match self.build() {
            Ok((registry, factory)) => {
                log_op_end!(
                    OP_INITIALIZE,
                    duration_ms = started.elapsed().as_millis() as u64,
                    descriptor = %descriptor,
                    registry_id = registry.id(),
                );
                *slot = Slot::Ready {
                    registry,
                    factory: Arc::clone(&factory),
                };
                Ok(factory)
            }
            Err(err) => {
                log_op_error!(
                    OP_INITIALIZE,
                    err,
                    duration_ms = started.elapsed().as_millis() as u64,
                    descriptor = %descriptor,
                );
                Err(err)
            }
        }
    }

    /// Destroy the registry, if one was built
    ///
    /// No-op when nothing was ever built or when already shut down.
    ///
    /// # Errors
    ///
    /// Propagates the registry's teardown failure. The provider is shut down
    /// regardless.
    pub fn shutdown(&self) -> Result<()> {
        let mut slot = self.lock();
        let (registry, factory) = match std::mem::replace(&mut *slot, Slot::ShutDown) {
            Slot::Ready { registry, factory } => (registry, factory),
            Slot::Uninitialized => {
                *slot = Slot::Uninitialized;
                tracing::debug!(op = OP_SHUTDOWN, "nothing to shut down");
                return Ok(());
            }
            Slot::ShutDown => return Ok(()),
        };
        drop(factory);

        let started = Instant::now();
        log_op_start!(OP_SHUTDOWN, registry_id = registry.id());
        match registry.destroy() {
            Ok(()) => {
                log_op_end!(
                    OP_SHUTDOWN,
                    duration_ms = started.elapsed().as_millis() as u64,
                    registry_id = registry.id(),
                );
                Ok(())
            }
            Err(err) => {
                log_op_error!(
                    OP_SHUTDOWN,
                    err,
                    duration_ms = started.elapsed().as_millis() as u64,
                    registry_id = registry.id(),
                );
                Err(err)
            }
        }
    }

    fn build(&self) -> Result<(Arc<B::Registry>, Arc<dyn SessionFactory>)> {
        let config = Configuration::load(&self.descriptor)
            .map_err(|err| initialization_error(err.into()))?;
        tracing::info!(op = OP_INITIALIZE, descriptor = %config.descriptor().display(), "configuration loaded");

        let registry = self
            .backend
            .build_registry(&config)
            .map_err(initialization_error)?;
        tracing::info!(
            op = OP_INITIALIZE,
            registry_id = registry.id(),
            "resource registry created"
        );

        match self
            .backend
            .build_session_factory(&config, Arc::clone(&registry))
        {
            Ok(factory) => Ok((registry, factory)),
            Err(err) => {
                if let Err(teardown) = registry.destroy() {
                    tracing::warn!(
                        op = OP_INITIALIZE,
                        registry_id = registry.id(),
                        error = %teardown,
                        "failed to release registry after factory construction error"
                    );
                }
                Err(initialization_error(err))
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot<B::Registry>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
