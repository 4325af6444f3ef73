//! bb8-backed connection pools and read/write routing.

mod manager;

use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use bb8::{Pool, PooledConnection};
use tokio::sync::RwLock;

use crate::config::{ConnectionConfig, Endpoint, PoolConfig};
use crate::driver::Driver;
use crate::error::SqlDispatchError;
use crate::query::{ConnectionRole, QueryKind};

pub use manager::{DriverManager, ManagedConnection};

/// A connection checked out of a [`ConnectionPool`]; returns on drop.
pub type PooledDriverConnection<D> = PooledConnection<'static, DriverManager<D>>;

/// One bb8 pool over a set of endpoints. The pool itself is built on first
/// use and replaced by a fresh one after [`ConnectionPool::drain`].
pub struct ConnectionPool<D: Driver> {
    driver: Arc<D>,
    endpoints: Vec<Endpoint>,
    role: ConnectionRole,
    config: PoolConfig,
    next_id: Arc<AtomicU64>,
    pool: RwLock<Option<Pool<DriverManager<D>>>>,
}

impl<D: Driver> ConnectionPool<D> {
    /// # Errors
    /// Returns `SqlDispatchError::ConfigError` when `endpoints` is empty.
    pub fn new(
        driver: Arc<D>,
        endpoints: Vec<Endpoint>,
        role: ConnectionRole,
        config: PoolConfig,
        next_id: Arc<AtomicU64>,
    ) -> Result<Self, SqlDispatchError> {
        if endpoints.is_empty() {
            return Err(SqlDispatchError::ConfigError(format!(
                "no endpoints for the {role:?} pool"
            )));
        }
        if config.max_connections == 0 || config.min_connections > config.max_connections {
            return Err(SqlDispatchError::ConfigError(format!(
                "invalid pool bounds: min {} max {}",
                config.min_connections, config.max_connections
            )));
        }
        Ok(Self {
            driver,
            endpoints,
            role,
            config,
            next_id,
            pool: RwLock::new(None),
        })
    }

    #[must_use]
    pub fn role(&self) -> ConnectionRole {
        self.role
    }

    #[must_use]
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    fn build(&self) -> Result<Pool<DriverManager<D>>, SqlDispatchError> {
        let manager = DriverManager::new(
            Arc::clone(&self.driver),
            self.endpoints.clone(),
            self.role,
            Arc::clone(&self.next_id),
        )?;
        Ok(Pool::builder()
            .max_size(self.config.max_connections)
            .min_idle(Some(self.config.min_connections))
            .idle_timeout(Some(self.config.idle_timeout()))
            .connection_timeout(self.config.acquire_timeout())
            .test_on_check_out(false)
            .retry_connection(false)
            .build_unchecked(manager))
    }

    async fn current(&self) -> Result<Pool<DriverManager<D>>, SqlDispatchError> {
        if let Some(pool) = self.pool.read().await.as_ref() {
            return Ok(pool.clone());
        }
        let mut guard = self.pool.write().await;
        if let Some(pool) = guard.as_ref() {
            return Ok(pool.clone());
        }
        let pool = self.build()?;
        *guard = Some(pool.clone());
        Ok(pool)
    }

    /// Check out a connection, opening one when none is idle.
    ///
    /// # Errors
    /// Returns the driver's connect error, or `SqlDispatchError::PoolError`
    /// when `acquire_timeout_ms` elapses.
    pub async fn acquire(&self) -> Result<PooledDriverConnection<D>, SqlDispatchError> {
        let pool = self.current().await?;
        pool.get_owned().await.map_err(SqlDispatchError::from)
    }

    /// Drop the current pool. Idle connections close now, checked-out ones
    /// when they are released; the next acquire builds a new pool.
    pub async fn drain(&self) {
        if self.pool.write().await.take().is_some() {
            tracing::info!(role = ?self.role, "drained connection pool");
        }
    }

    /// `(open, idle)` connection counts; zeros before first use.
    pub async fn stats(&self) -> (u32, u32) {
        self.pool.read().await.as_ref().map_or((0, 0), |pool| {
            let state = pool.state();
            (state.connections, state.idle_connections)
        })
    }
}

/// Routes a statement to the pool for its kind.
pub enum PoolRouter<D: Driver> {
    Single(ConnectionPool<D>),
    Replicated {
        read: ConnectionPool<D>,
        write: ConnectionPool<D>,
    },
}

impl<D: Driver> PoolRouter<D> {
    /// Pools for `config`; `None` when the config has no pool section.
    ///
    /// # Errors
    /// Returns `SqlDispatchError::ConfigError` for an empty endpoint list.
    pub fn from_config(
        driver: &Arc<D>,
        config: &ConnectionConfig,
        next_id: &Arc<AtomicU64>,
    ) -> Result<Option<Self>, SqlDispatchError> {
        let Some(pool_config) = config.pool.clone() else {
            return Ok(None);
        };
        let write = ConnectionPool::new(
            Arc::clone(driver),
            vec![config.write_endpoint()],
            ConnectionRole::Write,
            pool_config.clone(),
            Arc::clone(next_id),
        )?;
        if !config.is_replicated() {
            return Ok(Some(PoolRouter::Single(write)));
        }
        let read = ConnectionPool::new(
            Arc::clone(driver),
            config.read_endpoints(),
            ConnectionRole::Read,
            pool_config,
            Arc::clone(next_id),
        )?;
        Ok(Some(PoolRouter::Replicated { read, write }))
    }

    /// The pool a statement of `kind` runs on. Only plain reads go to replicas.
    #[must_use]
    pub fn pool_for(&self, kind: QueryKind) -> &ConnectionPool<D> {
        match self {
            PoolRouter::Single(pool) => pool,
            PoolRouter::Replicated { read, .. } if kind.is_read() => read,
            PoolRouter::Replicated { write, .. } => write,
        }
    }

    /// # Errors
    /// See [`ConnectionPool::acquire`].
    pub async fn acquire(&self, kind: QueryKind) -> Result<PooledDriverConnection<D>, SqlDispatchError> {
        self.pool_for(kind).acquire().await
    }

    pub async fn drain(&self) {
        match self {
            PoolRouter::Single(pool) => pool.drain().await,
            PoolRouter::Replicated { read, write } => {
                tokio::join!(read.drain(), write.drain());
            }
        }
    }
}
