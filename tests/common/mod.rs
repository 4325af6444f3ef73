#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sql_dispatch::prelude::*;

/// One statement as the mock saw it, recorded when it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Executed {
    pub sql: String,
    pub endpoint: String,
    pub connection: usize,
}

/// Shared, inspectable state behind [`MockDriver`].
#[derive(Default)]
pub struct MockState {
    pub executed: Mutex<Vec<Executed>>,
    pub connects: AtomicUsize,
    pub closes: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
    pub delay_ms: AtomicU64,
    pub fail_connect: AtomicBool,
    pub pending_work: AtomicBool,
    /// Statements containing one of these fail with an execution error.
    pub failing: Mutex<Vec<String>>,
    /// Statements containing one of these fail and kill their connection.
    pub fatal: Mutex<Vec<String>>,
    next_connection: AtomicUsize,
}

impl MockState {
    pub fn executed(&self) -> Vec<Executed> {
        self.executed.lock().unwrap().clone()
    }

    pub fn statements(&self) -> Vec<String> {
        self.executed().into_iter().map(|e| e.sql).collect()
    }

    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms
            .store(u64::try_from(delay.as_millis()).unwrap(), Ordering::SeqCst);
    }

    pub fn fail_on(&self, marker: &str) {
        self.failing.lock().unwrap().push(marker.to_string());
    }

    pub fn kill_on(&self, marker: &str) {
        self.fatal.lock().unwrap().push(marker.to_string());
    }
}

/// In-process driver that records every statement instead of talking to a
/// database. `SELECT`s return one row `(id, sql)`, `INSERT`s report id 42.
#[derive(Clone)]
pub struct MockDriver {
    pub state: Arc<MockState>,
    dialect: Dialect,
}

impl MockDriver {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            state: Arc::new(MockState::default()),
            dialect,
        }
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        self.state.set_delay(delay);
        self
    }
}

pub struct MockConnection {
    pub endpoint: String,
    pub id: usize,
}

#[async_trait]
impl Driver for MockDriver {
    type Connection = MockConnection;

    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn connect(&self, endpoint: &Endpoint) -> Result<MockConnection, SqlDispatchError> {
        tokio::time::sleep(Duration::from_millis(1)).await;
        if self.state.fail_connect.load(Ordering::SeqCst) {
            return Err(SqlDispatchError::ConnectionError(format!(
                "refused by {endpoint}"
            )));
        }
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        Ok(MockConnection {
            endpoint: endpoint
                .host
                .clone()
                .unwrap_or_else(|| endpoint.to_string()),
            id: self.state.next_connection.fetch_add(1, Ordering::SeqCst),
        })
    }

    async fn execute(
        &self,
        conn: &mut MockConnection,
        sql: &str,
    ) -> Result<DriverOutput, SqlDispatchError> {
        self.state.executed.lock().unwrap().push(Executed {
            sql: sql.to_string(),
            endpoint: conn.endpoint.clone(),
            connection: conn.id,
        });
        let now = self.state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self.state.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);

        let hits = |list: &Mutex<Vec<String>>| {
            list.lock()
                .unwrap()
                .iter()
                .any(|marker| sql.contains(marker.as_str()))
        };
        if hits(&self.state.fatal) {
            return Err(SqlDispatchError::connection_lost(format!(
                "connection reset during {sql}"
            )));
        }
        if hits(&self.state.failing) {
            return Err(SqlDispatchError::execution(format!("rejected {sql}")));
        }

        let upper = sql.trim_start().to_ascii_uppercase();
        if upper.starts_with("SELECT") || upper.starts_with("WITH") {
            Ok(DriverOutput::rows(
                vec!["id".into(), "sql".into()],
                vec![vec![RowValues::Int(1), RowValues::Text(sql.to_string())]],
            ))
        } else if upper.starts_with("INSERT") {
            Ok(DriverOutput::affected(1, Some(42)))
        } else {
            Ok(DriverOutput::affected(0, None))
        }
    }

    async fn close(&self, _conn: MockConnection) -> Result<(), SqlDispatchError> {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn has_pending_work(&self, _conn: &MockConnection) -> bool {
        self.state.pending_work.load(Ordering::SeqCst)
    }
}

/// Unpooled manager over a fresh mock driver.
pub fn shared_manager(
    max_concurrent: usize,
    delay: Duration,
) -> (QueryManager<MockDriver>, Arc<MockState>) {
    let driver = MockDriver::new(Dialect::Mysql).with_delay(delay);
    let state = Arc::clone(&driver.state);
    let config = ConnectionConfig::builder(Dialect::Mysql)
        .host("primary")
        .database("app")
        .max_concurrent_queries(max_concurrent)
        .no_pool()
        .build()
        .unwrap();
    (QueryManager::new(driver, config).unwrap(), state)
}

/// Pooled manager over a fresh mock driver.
pub fn pooled_manager(
    max_concurrent: usize,
    max_connections: u32,
    delay: Duration,
) -> (QueryManager<MockDriver>, Arc<MockState>) {
    let driver = MockDriver::new(Dialect::Postgres).with_delay(delay);
    let state = Arc::clone(&driver.state);
    let config = ConnectionConfig::builder(Dialect::Postgres)
        .host("primary")
        .database("app")
        .max_concurrent_queries(max_concurrent)
        .max_connections(max_connections)
        .build()
        .unwrap();
    (QueryManager::new(driver, config).unwrap(), state)
}
