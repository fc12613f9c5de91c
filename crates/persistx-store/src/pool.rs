//! Fixed-size connection pool
//!
//! All connections are opened up front, so an unreachable store fails the
//! registry build instead of the first session.

use crate::db::{self, Target};
use crate::errors::{from_rusqlite, Result};
use persistx_core::config::ConnectionSettings;
use persistx_core::errors::{registry_closed, ExError, ExErrorKind};
use rusqlite::Connection;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

struct PoolState {
    idle: Vec<Connection>,
    checked_out: usize,
    closed: bool,
}

pub struct ConnectionPool {
    state: Mutex<PoolState>,
    available: Condvar,
    size: usize,
    acquire_timeout: Duration,
}

impl ConnectionPool {
    /// Open `settings.pool_size` connections to `target`
    pub fn open(target: &Target, settings: &ConnectionSettings) -> Result<Arc<Self>> {
        let size = settings.pool_size as usize;
        let idle = (0..size)
            .map(|_| db::open(target, settings))
            .collect::<Result<Vec<_>>>()?;
        Ok(Arc::new(Self {
            state: Mutex::new(PoolState {
                idle,
                checked_out: 0,
                closed: false,
            }),
            available: Condvar::new(),
            size,
            acquire_timeout: Duration::from_millis(settings.acquire_timeout_ms),
        }))
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn idle_count(&self) -> usize {
        self.lock().idle.len()
    }

    pub fn checked_out(&self) -> usize {
        self.lock().checked_out
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Take a connection, waiting up to the acquire timeout
    ///
    /// # Errors
    ///
    /// `RegistryClosed` after `close`; `Timeout` if every connection stays
    /// checked out for the whole acquire timeout.
    pub fn checkout(self: &Arc<Self>) -> Result<PooledConnection> {
        let deadline = Instant::now() + self.acquire_timeout;
        let mut state = self.lock();
        loop {
            if state.closed {
                return Err(registry_closed("pool.checkout"));
            }
            if let Some(conn) = state.idle.pop() {
                state.checked_out += 1;
                return Ok(PooledConnection {
                    conn: Some(conn),
                    pool: Arc::clone(self),
                });
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(ExError::new(ExErrorKind::Timeout)
                    .with_op("pool.checkout")
                    .with_message(format!(
                        "no connection available within {} ms ({} in use)",
                        self.acquire_timeout.as_millis(),
                        state.checked_out
                    )));
            }
            let (guard, _timeout) = self
                .available
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
        }
    }

    /// Close every idle connection and refuse further checkouts
    ///
    /// Connections still checked out are closed when they are returned.
    ///
    /// # Errors
    ///
    /// The first driver error raised while closing; remaining connections
    /// are still closed.
    pub fn close(&self) -> Result<()> {
        let idle = {
            let mut state = self.lock();
            state.closed = true;
            std::mem::take(&mut state.idle)
        };
        self.available.notify_all();

        let mut first_error = None;
        for conn in idle {
            if let Err((_conn, err)) = conn.close() {
                first_error.get_or_insert(from_rusqlite(err));
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn checkin(&self, conn: Connection) {
        let mut state = self.lock();
        state.checked_out = state.checked_out.saturating_sub(1);
        if state.closed {
            drop(state);
            if let Err((_conn, err)) = conn.close() {
                tracing::warn!(error = %err, "failed to close returned connection");
            }
            return;
        }
        state.idle.push(conn);
        drop(state);
        self.available.notify_one();
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A checked-out connection; returns to the pool on drop
pub struct PooledConnection {
    conn: Option<Connection>,
    pool: Arc<ConnectionPool>,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn
            .as_ref()
            .expect("connection is only taken out on drop")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn
            .as_mut()
            .expect("connection is only taken out on drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.checkin(conn);
        }
    }
}
