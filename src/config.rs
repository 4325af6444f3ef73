use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SqlDispatchError;
use crate::types::Dialect;

/// Where to connect. Unset fields are inherited from the top-level
/// [`ConnectionConfig`] when the endpoint is resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoint {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Database name, or the file path for `SQLite`.
    pub database: Option<String>,
}

impl Endpoint {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Endpoint for an on-disk (or `:memory:`) `SQLite` database.
    #[must_use]
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            database: Some(path.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    fn inherit(&self, base: &Endpoint) -> Endpoint {
        Endpoint {
            host: self.host.clone().or_else(|| base.host.clone()),
            port: self.port.or(base.port),
            username: self.username.clone().or_else(|| base.username.clone()),
            password: self.password.clone().or_else(|| base.password.clone()),
            database: self.database.clone().or_else(|| base.database.clone()),
        }
    }
}

/// `host:port/database`, without credentials.
impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(host) = &self.host {
            f.write_str(host)?;
            if let Some(port) = self.port {
                write!(f, ":{port}")?;
            }
            f.write_str("/")?;
        }
        f.write_str(self.database.as_deref().unwrap_or(""))
    }
}

/// Connection pool sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    /// Idle connections above `min_connections` are closed after this long.
    pub max_idle_time_ms: u64,
    pub acquire_timeout_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 0,
            max_idle_time_ms: 1000,
            acquire_timeout_ms: 30_000,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.max_idle_time_ms)
    }

    #[must_use]
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

/// Separate read replicas and write primary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicationConfig {
    pub read: Vec<Endpoint>,
    pub write: Option<Endpoint>,
}

fn default_pool() -> Option<PoolConfig> {
    Some(PoolConfig::default())
}

/// Everything a [`QueryManager`](crate::manager::QueryManager) needs.
///
/// ```rust
/// use sql_dispatch::prelude::*;
///
/// let config: ConnectionConfig = serde_json::from_str(
///     r#"{"dialect": "postgres", "host": "db", "database": "app",
///         "replication": {"read": [{"host": "replica-1"}, {"host": "replica-2"}]}}"#,
/// ).unwrap();
/// let reads = config.read_endpoints();
/// assert_eq!(reads[1].host.as_deref(), Some("replica-2"));
/// assert_eq!(reads[1].database.as_deref(), Some("app"));
/// assert_eq!(reads[1].port, Some(5432));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub dialect: Dialect,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    /// Admission bound on simultaneously active queries.
    #[serde(default = "ConnectionConfig::default_max_concurrent_queries")]
    pub max_concurrent_queries: usize,
    /// When false, submissions bypass the waiting queue and start at once.
    #[serde(default = "ConnectionConfig::default_queue")]
    pub queue: bool,
    /// `None` runs every query on one shared connection.
    #[serde(default = "default_pool")]
    pub pool: Option<PoolConfig>,
    #[serde(default)]
    pub replication: Option<ReplicationConfig>,
    /// Quiet period after which the shared connection is closed.
    #[serde(default = "ConnectionConfig::default_idle_disconnect_ms")]
    pub idle_disconnect_ms: u64,
}

impl ConnectionConfig {
    fn default_max_concurrent_queries() -> usize {
        50
    }

    fn default_queue() -> bool {
        true
    }

    fn default_idle_disconnect_ms() -> u64 {
        100
    }

    #[must_use]
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            host: None,
            port: None,
            username: None,
            password: None,
            database: None,
            max_concurrent_queries: Self::default_max_concurrent_queries(),
            queue: Self::default_queue(),
            pool: default_pool(),
            replication: None,
            idle_disconnect_ms: Self::default_idle_disconnect_ms(),
        }
    }

    #[must_use]
    pub fn builder(dialect: Dialect) -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::new(dialect)
    }

    /// Parse and validate a JSON configuration.
    ///
    /// # Errors
    /// Returns `SqlDispatchError::ConfigError` for malformed JSON, an unknown
    /// dialect, or values rejected by [`ConnectionConfig::validate`].
    pub fn from_json_str(json: &str) -> Result<Self, SqlDispatchError> {
        let config: ConnectionConfig = serde_json::from_str(json)
            .map_err(|e| SqlDispatchError::ConfigError(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// Returns `SqlDispatchError::ConfigError` when a bound is zero or the
    /// pool minimum exceeds its maximum.
    pub fn validate(&self) -> Result<(), SqlDispatchError> {
        if self.max_concurrent_queries == 0 {
            return Err(SqlDispatchError::ConfigError(
                "max_concurrent_queries must be at least 1".into(),
            ));
        }
        if let Some(pool) = &self.pool {
            if pool.max_connections == 0 {
                return Err(SqlDispatchError::ConfigError(
                    "pool.max_connections must be at least 1".into(),
                ));
            }
            if pool.min_connections > pool.max_connections {
                return Err(SqlDispatchError::ConfigError(format!(
                    "pool.min_connections ({}) exceeds pool.max_connections ({})",
                    pool.min_connections, pool.max_connections
                )));
            }
        }
        if self.replication.is_some() && self.pool.is_none() {
            return Err(SqlDispatchError::ConfigError(
                "replication needs a pool".into(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn idle_disconnect(&self) -> Duration {
        Duration::from_millis(self.idle_disconnect_ms)
    }

    #[must_use]
    pub fn is_replicated(&self) -> bool {
        self.replication.is_some()
    }

    fn base_endpoint(&self) -> Endpoint {
        Endpoint {
            host: self.host.clone(),
            port: self.port.or_else(|| self.dialect.default_port()),
            username: self.username.clone(),
            password: self.password.clone(),
            database: self.database.clone(),
        }
    }

    /// Fill unset fields of `endpoint` from the top level.
    #[must_use]
    pub fn resolve(&self, endpoint: &Endpoint) -> Endpoint {
        endpoint.inherit(&self.base_endpoint())
    }

    /// Primary endpoint: the replication write target or the top level.
    #[must_use]
    pub fn write_endpoint(&self) -> Endpoint {
        match self.replication.as_ref().and_then(|r| r.write.as_ref()) {
            Some(write) => self.resolve(write),
            None => self.base_endpoint(),
        }
    }

    /// Read replicas in configured order; the write endpoint when none are set.
    #[must_use]
    pub fn read_endpoints(&self) -> Vec<Endpoint> {
        match &self.replication {
            Some(replication) if !replication.read.is_empty() => replication
                .read
                .iter()
                .map(|endpoint| self.resolve(endpoint))
                .collect(),
            _ => vec![self.write_endpoint()],
        }
    }
}

/// Fluent builder for [`ConnectionConfig`].
#[derive(Debug, Clone)]
pub struct ConnectionConfigBuilder {
    config: ConnectionConfig,
}

impl ConnectionConfigBuilder {
    #[must_use]
    pub fn new(dialect: Dialect) -> Self {
        Self {
            config: ConnectionConfig::new(dialect),
        }
    }

    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = Some(host.into());
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = Some(port);
        self
    }

    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.username = Some(username.into());
        self.config.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.config.database = Some(database.into());
        self
    }

    #[must_use]
    pub fn max_concurrent_queries(mut self, max: usize) -> Self {
        self.config.max_concurrent_queries = max;
        self
    }

    #[must_use]
    pub fn queue(mut self, queue: bool) -> Self {
        self.config.queue = queue;
        self
    }

    #[must_use]
    pub fn pool(mut self, pool: PoolConfig) -> Self {
        self.config.pool = Some(pool);
        self
    }

    /// Run every query on a single shared connection.
    #[must_use]
    pub fn no_pool(mut self) -> Self {
        self.config.pool = None;
        self
    }

    #[must_use]
    pub fn max_connections(mut self, max: u32) -> Self {
        self.config.pool.get_or_insert_with(PoolConfig::default).max_connections = max;
        self
    }

    #[must_use]
    pub fn read_replica(mut self, endpoint: Endpoint) -> Self {
        self.config
            .replication
            .get_or_insert_with(ReplicationConfig::default)
            .read
            .push(endpoint);
        self
    }

    #[must_use]
    pub fn write_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.config
            .replication
            .get_or_insert_with(ReplicationConfig::default)
            .write = Some(endpoint);
        self
    }

    #[must_use]
    pub fn idle_disconnect_ms(mut self, ms: u64) -> Self {
        self.config.idle_disconnect_ms = ms;
        self
    }

    #[must_use]
    pub fn finish(self) -> ConnectionConfig {
        self.config
    }

    /// # Errors
    /// Returns `SqlDispatchError::ConfigError` when validation fails.
    pub fn build(self) -> Result<ConnectionConfig, SqlDispatchError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
