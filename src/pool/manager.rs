use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use bb8::ManageConnection;

use crate::config::Endpoint;
use crate::driver::Driver;
use crate::error::SqlDispatchError;
use crate::query::{ConnectionBinding, ConnectionRole};

/// bb8 manager that opens driver connections, rotating across `endpoints`.
pub struct DriverManager<D: Driver> {
    driver: Arc<D>,
    endpoints: Vec<Endpoint>,
    role: ConnectionRole,
    next_endpoint: AtomicUsize,
    next_id: Arc<AtomicU64>,
}

impl<D: Driver> DriverManager<D> {
    /// # Errors
    /// Returns `SqlDispatchError::ConfigError` when `endpoints` is empty.
    pub fn new(
        driver: Arc<D>,
        endpoints: Vec<Endpoint>,
        role: ConnectionRole,
        next_id: Arc<AtomicU64>,
    ) -> Result<Self, SqlDispatchError> {
        if endpoints.is_empty() {
            return Err(SqlDispatchError::ConfigError(format!(
                "no endpoints for the {role:?} pool"
            )));
        }
        Ok(Self {
            driver,
            endpoints,
            role,
            next_endpoint: AtomicUsize::new(0),
            next_id,
        })
    }

    #[must_use]
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }
}

/// A pooled driver connection and where it points.
pub struct ManagedConnection<D: Driver> {
    conn: D::Connection,
    endpoint: Endpoint,
    role: ConnectionRole,
    id: u64,
    broken: bool,
}

impl<D: Driver> ManagedConnection<D> {
    pub fn connection_mut(&mut self) -> &mut D::Connection {
        &mut self.conn
    }

    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn binding(&self) -> ConnectionBinding {
        ConnectionBinding {
            endpoint: self.endpoint.to_string(),
            role: self.role,
            connection_id: self.id,
        }
    }

    /// Destroy this connection on release instead of returning it to the pool.
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }

    #[must_use]
    pub fn is_broken(&self) -> bool {
        self.broken
    }
}

impl<D: Driver> ManageConnection for DriverManager<D> {
    type Connection = ManagedConnection<D>;
    type Error = SqlDispatchError;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let idx = self.next_endpoint.fetch_add(1, Ordering::Relaxed) % self.endpoints.len();
        let endpoint = self.endpoints[idx].clone();
        let driver = Arc::clone(&self.driver);
        let role = self.role;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        async move {
            let conn = driver.connect(&endpoint).await?;
            tracing::info!(endpoint = %endpoint, ?role, connection_id = id, "opened pooled connection");
            Ok(ManagedConnection {
                conn,
                endpoint,
                role,
                id,
                broken: false,
            })
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async move { self.driver.ping(&mut conn.conn).await }
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        if conn.broken {
            tracing::warn!(
                endpoint = %conn.endpoint,
                connection_id = conn.id,
                "discarding dead pooled connection"
            );
        }
        conn.broken
    }
}
