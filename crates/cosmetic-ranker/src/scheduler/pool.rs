//! Bounded pool of reusable connections.

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tracing::{debug, info, warn};

const WAIT_SAMPLES: usize = 1000;

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("timed out after {0:?} waiting for a pooled connection")]
    Timeout(Duration),
    #[error("connection pool is closed")]
    Closed,
    #[error("failed to open connection: {0}")]
    Connect(String),
}

/// Opens and health-checks connections for a [`ConnectionPool`].
#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    type Connection: Send + 'static;

    async fn connect(&self) -> Result<Self::Connection, PoolError>;

    async fn is_valid(&self, _connection: &mut Self::Connection) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub min_size: usize,
    pub max_size: usize,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_size: 5,
            max_size: 20,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PoolStats {
    pub created: u64,
    pub active: usize,
    pub idle: usize,
    pub acquired: u64,
    pub timeouts: u64,
    pub average_wait_ms: f64,
}

#[derive(Default)]
struct PoolCounters {
    created: u64,
    active: usize,
    acquired: u64,
    timeouts: u64,
    waits: VecDeque<Duration>,
}

struct Idle<C> {
    connection: C,
    since: Instant,
}

struct PoolShared<F: ConnectionFactory> {
    factory: F,
    config: PoolConfig,
    permits: Arc<Semaphore>,
    idle: Mutex<VecDeque<Idle<F::Connection>>>,
    counters: Mutex<PoolCounters>,
    closed: AtomicBool,
}

impl<F: ConnectionFactory> PoolShared<F> {
    fn idle(&self) -> MutexGuard<'_, VecDeque<Idle<F::Connection>>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn counters(&self) -> MutexGuard<'_, PoolCounters> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, connection: Option<F::Connection>) {
        self.counters().active -= 1;
        if let Some(connection) = connection {
            if !self.closed.load(Ordering::Acquire) {
                self.idle().push_back(Idle {
                    connection,
                    since: Instant::now(),
                });
            }
        }
    }
}

/// Pool bounded to `max_size` live connections. Waiters give up after `acquire_timeout`.
pub struct ConnectionPool<F: ConnectionFactory> {
    shared: Arc<PoolShared<F>>,
}

impl<F: ConnectionFactory> ConnectionPool<F> {
    pub fn new(factory: F, config: PoolConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_size));
        Self {
            shared: Arc::new(PoolShared {
                factory,
                config,
                permits,
                idle: Mutex::new(VecDeque::new()),
                counters: Mutex::new(PoolCounters::default()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    pub fn factory(&self) -> &F {
        &self.shared.factory
    }

    /// Opens `min_size` connections up front.
    pub async fn initialize(&self) -> Result<(), PoolError> {
        let wanted = self.shared.config.min_size.min(self.shared.config.max_size);
        for _ in 0..wanted {
            let connection = self.shared.factory.connect().await?;
            self.shared.counters().created += 1;
            self.shared.idle().push_back(Idle {
                connection,
                since: Instant::now(),
            });
        }
        info!(connections = wanted, "connection pool initialized");
        Ok(())
    }

    pub async fn acquire(&self) -> Result<PooledConnection<F>, PoolError> {
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(PoolError::Closed);
        }
        let started = Instant::now();
        let timeout = self.shared.config.acquire_timeout;
        let waiting = Arc::clone(&self.shared.permits).acquire_owned();
        let permit = match tokio::time::timeout(timeout, waiting).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(PoolError::Closed),
            Err(_) => {
                self.shared.counters().timeouts += 1;
                warn!(?timeout, "connection pool exhausted");
                return Err(PoolError::Timeout(timeout));
            }
        };

        let connection = match self.reuse_idle().await {
            Some(connection) => connection,
            None => {
                let connection = self.shared.factory.connect().await?;
                self.shared.counters().created += 1;
                connection
            }
        };

        {
            let mut counters = self.shared.counters();
            counters.active += 1;
            counters.acquired += 1;
            if counters.waits.len() == WAIT_SAMPLES {
                counters.waits.pop_front();
            }
            counters.waits.push_back(started.elapsed());
        }

        Ok(PooledConnection {
            connection: Some(connection),
            shared: Arc::clone(&self.shared),
            _permit: permit,
        })
    }

    async fn reuse_idle(&self) -> Option<F::Connection> {
        loop {
            let candidate = self.shared.idle().pop_front()?;
            if candidate.since.elapsed() > self.shared.config.idle_timeout {
                debug!("dropping connection past idle timeout");
                continue;
            }
            let mut connection = candidate.connection;
            if self.shared.factory.is_valid(&mut connection).await {
                return Some(connection);
            }
            debug!("dropping connection that failed validation");
        }
    }

    pub fn stats(&self) -> PoolStats {
        let idle = self.shared.idle().len();
        let counters = self.shared.counters();
        let average_wait_ms = if counters.waits.is_empty() {
            0.0
        } else {
            let total: Duration = counters.waits.iter().sum();
            total.as_secs_f64() * 1000.0 / counters.waits.len() as f64
        };
        PoolStats {
            created: counters.created,
            active: counters.active,
            idle,
            acquired: counters.acquired,
            timeouts: counters.timeouts,
            average_wait_ms,
        }
    }

    /// Rejects new acquisitions and drops idle connections. Borrowed ones close on release.
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
        self.shared.permits.close();
        self.shared.idle().clear();
        info!("connection pool closed");
    }
}

/// Connection on loan from a pool; returned on drop.
pub struct PooledConnection<F: ConnectionFactory> {
    connection: Option<F::Connection>,
    shared: Arc<PoolShared<F>>,
    _permit: OwnedSemaphorePermit,
}

impl<F: ConnectionFactory> PooledConnection<F> {
    /// Closes the connection instead of returning it, e.g. after an I/O failure.
    pub fn discard(mut self) {
        self.connection.take();
    }
}

impl<F: ConnectionFactory> Deref for PooledConnection<F> {
    type Target = F::Connection;

    fn deref(&self) -> &Self::Target {
        self.connection
            .as_ref()
            .unwrap_or_else(|| unreachable!("connection present until drop"))
    }
}

impl<F: ConnectionFactory> DerefMut for PooledConnection<F> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.connection
            .as_mut()
            .unwrap_or_else(|| unreachable!("connection present until drop"))
    }
}

impl<F: ConnectionFactory> Drop for PooledConnection<F> {
    fn drop(&mut self) {
        self.shared.release(self.connection.take());
    }
}
