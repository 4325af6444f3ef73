//! The query manager: admission control in front of a pool or a single
//! shared connection.
//!
//! Every submitted statement becomes a [`QueryHandle`]. At most
//! `max_concurrent_queries` handles are active at once; the rest wait in
//! submission order. Active handles run on a pooled connection (routed by
//! [`PoolRouter`]) or, without a pool, on one lazily opened shared
//! connection that is closed again after `idle_disconnect_ms` of quiet.

mod queue;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::config::{ConnectionConfig, Endpoint};
use crate::driver::{Driver, DriverOutput};
use crate::error::SqlDispatchError;
use crate::pool::PoolRouter;
use crate::query::{
    ConnectionBinding, ConnectionRole, LogFn, Logging, QueryFuture, QueryHandle, QueryKind,
    QueryOptions, QueryOutcome, ResultContext, classify_output,
};
use crate::results::ResultSet;
use crate::statement::{ColumnMap, MigrationPlan, QueryGenerator, column_map_from_table_info};
use crate::types::{Dialect, RowValues};

use queue::Admission;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

/// Result of [`QueryManager::run_plan`].
#[derive(Debug)]
pub struct PlanReport {
    /// Steps that ran successfully, in order.
    pub applied: usize,
    pub total: usize,
    /// Error of the step that stopped the plan.
    pub error: Option<SqlDispatchError>,
}

impl PlanReport {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.error.is_none() && self.applied == self.total
    }

    /// # Errors
    /// Returns the error of the failed step.
    pub fn into_result(self) -> Result<usize, SqlDispatchError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.applied),
        }
    }
}

struct QueueItem {
    handle: Arc<QueryHandle>,
    options: QueryOptions,
    context: Option<Arc<dyn ResultContext>>,
}

/// Something holding or waiting for an admission slot.
enum Work {
    Query(QueueItem),
    /// A migration plan; signalled once its slot is granted.
    Plan(oneshot::Sender<()>),
}

/// Admission slot held by a running plan; released on drop.
struct PlanSlot<D: Driver> {
    inner: Arc<Inner<D>>,
}

impl<D: Driver> Drop for PlanSlot<D> {
    fn drop(&mut self) {
        self.inner.release();
    }
}

struct SharedConnection<D: Driver> {
    conn: D::Connection,
    endpoint: Endpoint,
    id: u64,
}

struct Inner<D: Driver> {
    driver: Arc<D>,
    config: ConnectionConfig,
    generator: QueryGenerator,
    pools: Option<PoolRouter<D>>,
    shared: tokio::sync::Mutex<Option<SharedConnection<D>>>,
    status: Mutex<ConnectionStatus>,
    queue: Mutex<Admission<Work>>,
    idle_timer: Mutex<Option<CancellationToken>>,
    logger: Mutex<Option<LogFn>>,
    next_query_id: AtomicU64,
    next_connection_id: Arc<AtomicU64>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn same_family(a: Dialect, b: Dialect) -> bool {
    let mysql = |d| matches!(d, Dialect::Mysql | Dialect::Mariadb);
    a == b || (mysql(a) && mysql(b))
}

fn as_connection_error(err: SqlDispatchError) -> SqlDispatchError {
    match err {
        SqlDispatchError::ConnectionError(_) => err,
        other => SqlDispatchError::ConnectionError(other.to_string()),
    }
}

/// Cheap to clone; clones share one queue and one set of connections.
///
/// ```rust,no_run
/// use sql_dispatch::prelude::*;
///
/// # async fn demo() -> Result<(), SqlDispatchError> {
/// let config = ConnectionConfig::builder(Dialect::Sqlite)
///     .database("app.db")
///     .no_pool()
///     .build()?;
/// let manager = QueryManager::new(SqliteDriver::new(), config)?;
/// let outcome = manager.submit("SELECT 1 AS one", QueryOptions::new()).await?;
/// assert_eq!(outcome.rows().map(ResultSet::len), Some(1));
/// # Ok(())
/// # }
/// ```
pub struct QueryManager<D: Driver> {
    inner: Arc<Inner<D>>,
}

impl<D: Driver> Clone for QueryManager<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: Driver> QueryManager<D> {
    /// Nothing connects until the first query or [`QueryManager::connect`].
    ///
    /// # Errors
    /// Returns `SqlDispatchError::ConfigError` for an invalid configuration or
    /// a driver whose dialect differs from the configured one.
    pub fn new(driver: D, config: ConnectionConfig) -> Result<Self, SqlDispatchError> {
        config.validate()?;
        if !same_family(driver.dialect(), config.dialect) {
            return Err(SqlDispatchError::ConfigError(format!(
                "driver speaks {} but the configuration names {}",
                driver.dialect(),
                config.dialect
            )));
        }

        let driver = Arc::new(driver);
        let next_connection_id = Arc::new(AtomicU64::new(1));
        let pools = PoolRouter::from_config(&driver, &config, &next_connection_id)?;
        let queue = Admission::new(config.max_concurrent_queries, config.queue);

        Ok(Self {
            inner: Arc::new(Inner {
                driver,
                generator: QueryGenerator::new(config.dialect),
                config,
                pools,
                shared: tokio::sync::Mutex::new(None),
                status: Mutex::new(ConnectionStatus::Disconnected),
                queue: Mutex::new(queue),
                idle_timer: Mutex::new(None),
                logger: Mutex::new(None),
                next_query_id: AtomicU64::new(1),
                next_connection_id,
            }),
        })
    }

    /// Receives every executed statement whose options use `Logging::Default`.
    pub fn set_logger<F>(&self, logger: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        *lock(&self.inner.logger) = Some(Arc::new(logger));
    }

    pub fn clear_logger(&self) {
        *lock(&self.inner.logger) = None;
    }

    #[must_use]
    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn driver(&self) -> &D {
        &self.inner.driver
    }

    /// Statement generator for the configured dialect.
    #[must_use]
    pub fn generator(&self) -> &QueryGenerator {
        &self.inner.generator
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        *lock(&self.inner.status)
    }

    /// Queries currently executing or waiting for a connection.
    #[must_use]
    pub fn active_count(&self) -> usize {
        lock(&self.inner.queue).active()
    }

    /// Queries held back by admission control.
    #[must_use]
    pub fn waiting_count(&self) -> usize {
        lock(&self.inner.queue).waiting()
    }

    /// Highest `active_count` observed so far.
    #[must_use]
    pub fn peak_active(&self) -> usize {
        lock(&self.inner.queue).peak()
    }

    /// Queue `sql` and return a future for its result. The statement starts
    /// immediately when admission allows, otherwise after every earlier
    /// waiting statement has started.
    ///
    /// # Panics
    /// Panics when called outside a Tokio runtime.
    pub fn dispatch(
        &self,
        sql: impl Into<String>,
        options: QueryOptions,
        context: Option<Arc<dyn ResultContext>>,
    ) -> QueryFuture {
        let sql = sql.into();
        let kind = QueryKind::classify(&sql, options.kind);
        let id = self.inner.next_query_id.fetch_add(1, Ordering::Relaxed);
        let (handle, future) = QueryHandle::new(id, sql, kind);

        self.inner.cancel_idle_timer();
        let item = QueueItem {
            handle,
            options,
            context,
        };
        let ready = lock(&self.inner.queue).submit(Work::Query(item));
        match ready {
            Some(item) => self.inner.spawn(item),
            None => tracing::trace!(target: "sql_dispatch::query", id, "queued"),
        }
        future
    }

    /// Run `sql` and wait for its classified result.
    ///
    /// # Errors
    /// Returns the connection, pool, or driver error that failed this query.
    pub async fn submit(
        &self,
        sql: impl Into<String>,
        options: QueryOptions,
    ) -> Result<QueryOutcome, SqlDispatchError> {
        self.dispatch(sql, options, None).await
    }

    /// [`QueryManager::submit`] with a result context for field mapping and
    /// insert ids.
    ///
    /// # Errors
    /// Returns the connection, pool, or driver error that failed this query.
    pub async fn submit_with(
        &self,
        sql: impl Into<String>,
        options: QueryOptions,
        context: Arc<dyn ResultContext>,
    ) -> Result<QueryOutcome, SqlDispatchError> {
        self.dispatch(sql, options, Some(context)).await
    }

    /// Open the shared connection, or check one out of the write pool.
    ///
    /// # Errors
    /// Returns the connection error; the manager stays disconnected.
    pub async fn connect(&self) -> Result<(), SqlDispatchError> {
        match &self.inner.pools {
            Some(pools) => {
                self.inner.set_status(ConnectionStatus::Connecting);
                match pools.acquire(QueryKind::Raw).await {
                    Ok(conn) => {
                        drop(conn);
                        self.inner.set_status(ConnectionStatus::Connected);
                        Ok(())
                    }
                    Err(err) => {
                        self.inner.set_status(ConnectionStatus::Disconnected);
                        Err(as_connection_error(err))
                    }
                }
            }
            None => {
                let mut guard = self.inner.shared.lock().await;
                if guard.is_none() {
                    *guard = Some(self.inner.open_shared().await?);
                }
                Ok(())
            }
        }
    }

    /// Close the shared connection and drain pools. Queries already running
    /// keep their connections until they finish.
    pub async fn disconnect(&self) {
        self.inner.cancel_idle_timer();
        if let Some(pools) = &self.inner.pools {
            pools.drain().await;
        }
        let shared = self.inner.shared.lock().await.take();
        if let Some(shared) = shared {
            self.inner.close_shared(shared).await;
        }
        self.inner.set_status(ConnectionStatus::Disconnected);
    }

    /// # Errors
    /// See [`QueryManager::connect`].
    pub async fn reconnect(&self) -> Result<(), SqlDispatchError> {
        self.disconnect().await;
        self.connect().await
    }

    /// Column description rows for `table`.
    ///
    /// # Errors
    /// Returns the driver error, or `SqlDispatchError::ExecutionError` when
    /// the statement did not produce rows.
    pub async fn describe_table(&self, table: &str) -> Result<ResultSet, SqlDispatchError> {
        let sql = self.inner.generator.describe_table_query(table);
        match self
            .submit(sql, QueryOptions::new().kind(QueryKind::Describe).raw())
            .await?
        {
            QueryOutcome::Rows(rs) => Ok(rs),
            other => Err(SqlDispatchError::execution(format!(
                "describe {table} returned {other:?}"
            ))),
        }
    }

    /// Current columns of `table` as generator input for column migrations.
    /// Expects `PRAGMA table_info` shaped rows.
    ///
    /// # Errors
    /// See [`QueryManager::describe_table`] and
    /// [`column_map_from_table_info`].
    pub async fn column_map(&self, table: &str) -> Result<ColumnMap, SqlDispatchError> {
        let info = self.describe_table(table).await?;
        column_map_from_table_info(&info)
    }

    /// # Errors
    /// Returns the driver error.
    pub async fn show_tables(&self) -> Result<Vec<String>, SqlDispatchError> {
        let sql = self.inner.generator.show_tables_query();
        match self
            .submit(sql, QueryOptions::new().kind(QueryKind::ShowTables))
            .await?
        {
            QueryOutcome::Tables(tables) => Ok(tables),
            _ => Ok(Vec::new()),
        }
    }

    /// Server version string.
    ///
    /// # Errors
    /// Returns the driver error.
    pub async fn version(&self) -> Result<Option<RowValues>, SqlDispatchError> {
        let sql = self.inner.generator.version_query();
        match self
            .submit(sql, QueryOptions::new().kind(QueryKind::Version))
            .await?
        {
            QueryOutcome::Scalar(value) => Ok(value),
            _ => Ok(None),
        }
    }

    /// Execute `plan` one step at a time, stopping at the first failure.
    /// Steps that already ran are not undone.
    ///
    /// The plan takes one admission slot for its whole run and every step
    /// runs on the same connection (the shared one, or one checked out of the
    /// write pool), so SQLite temporary tables survive from step to step.
    pub async fn run_plan(&self, plan: &MigrationPlan) -> PlanReport {
        let mut report = PlanReport {
            applied: 0,
            total: plan.len(),
            error: None,
        };
        if plan.is_empty() {
            return report;
        }
        let Some(_slot) = self.inner.reserve().await else {
            report.error = Some(SqlDispatchError::ConnectionError(
                "query manager shut down before the plan was admitted".into(),
            ));
            return report;
        };

        let result = match &self.inner.pools {
            Some(pools) => self.inner.run_plan_pooled(pools, plan, &mut report).await,
            None => self.inner.run_plan_shared(plan, &mut report).await,
        };
        if let Err(err) = result {
            tracing::warn!(
                step = report.applied,
                total = report.total,
                error = %err,
                "migration plan stopped"
            );
            report.error = Some(err);
        }
        report
    }
}

impl<D: Driver> Inner<D> {
    fn set_status(&self, status: ConnectionStatus) {
        *lock(&self.status) = status;
    }

    fn status(&self) -> ConnectionStatus {
        *lock(&self.status)
    }

    fn spawn(self: &Arc<Self>, work: Work) {
        match work {
            Work::Query(item) => {
                let inner = Arc::clone(self);
                tokio::spawn(async move { inner.run(item).await });
            }
            Work::Plan(ready) => {
                // the plan was dropped while waiting
                if ready.send(()).is_err() {
                    self.release();
                }
            }
        }
    }

    /// Give back one admission slot and start whatever it admits.
    fn release(self: &Arc<Self>) {
        let admitted = lock(&self.queue).finish();
        for next in admitted {
            self.spawn(next);
        }
        self.arm_idle_timer();
    }

    /// Wait for an admission slot in FIFO order with the queries.
    async fn reserve(self: &Arc<Self>) -> Option<PlanSlot<D>> {
        self.cancel_idle_timer();
        let (tx, rx) = oneshot::channel();
        let admitted = lock(&self.queue).submit(Work::Plan(tx)).is_some();
        if !admitted && rx.await.is_err() {
            return None;
        }
        Some(PlanSlot {
            inner: Arc::clone(self),
        })
    }

    async fn run_plan_pooled(
        &self,
        pools: &PoolRouter<D>,
        plan: &MigrationPlan,
        report: &mut PlanReport,
    ) -> Result<(), SqlDispatchError> {
        let mut conn = pools.acquire(QueryKind::Raw).await?;
        self.set_status(ConnectionStatus::Connected);
        for step in plan.steps() {
            self.log_plan_step(conn.id(), step);
            if let Err(err) = self.driver.execute(conn.connection_mut(), step).await {
                if self.driver.is_connection_lost(&err) {
                    conn.mark_broken();
                }
                return Err(err);
            }
            report.applied += 1;
        }
        Ok(())
    }

    async fn run_plan_shared(
        &self,
        plan: &MigrationPlan,
        report: &mut PlanReport,
    ) -> Result<(), SqlDispatchError> {
        let mut guard = self.shared.lock().await;
        if guard.is_none() {
            *guard = Some(self.open_shared().await?);
        }
        let Some(shared) = guard.as_mut() else {
            return Err(SqlDispatchError::ConnectionError(
                "shared connection unavailable".into(),
            ));
        };
        for step in plan.steps() {
            self.log_plan_step(shared.id, step);
            if let Err(err) = self.driver.execute(&mut shared.conn, step).await {
                if self.driver.is_connection_lost(&err) {
                    tracing::warn!(connection_id = shared.id, "shared connection lost");
                    if let Some(dead) = guard.take() {
                        self.close_shared(dead).await;
                    }
                    self.set_status(ConnectionStatus::Disconnected);
                }
                return Err(err);
            }
            report.applied += 1;
        }
        Ok(())
    }

    fn log_plan_step(&self, connection_id: u64, step: &str) {
        tracing::debug!(
            target: "sql_dispatch::query",
            connection_id,
            sql = step,
            "executing plan step"
        );
        let logger = lock(&self.logger).clone();
        if let Some(log) = logger {
            log(&format!("Executing (plan): {step}"));
        }
    }

    async fn run(self: Arc<Self>, item: QueueItem) {
        self.log_statement(&item);
        let result = self.execute(&item).await;
        if let Err(err) = &result {
            tracing::debug!(
                target: "sql_dispatch::query",
                id = item.handle.id(),
                error = %err,
                "query failed"
            );
        }

        let admitted = lock(&self.queue).finish();
        item.handle.complete(result);
        for next in admitted {
            self.spawn(next);
        }
        self.arm_idle_timer();
    }

    fn log_statement(&self, item: &QueueItem) {
        let handle = &item.handle;
        tracing::debug!(
            target: "sql_dispatch::query",
            id = handle.id(),
            kind = handle.kind().as_str(),
            sql = handle.sql(),
            "executing"
        );
        let logger = match &item.options.logging {
            Logging::Default => lock(&self.logger).clone(),
            Logging::Disabled => None,
            Logging::Custom(log) => Some(Arc::clone(log)),
        };
        if let Some(log) = logger {
            log(&format!("Executing ({}): {}", handle.id(), handle.sql()));
        }
    }

    async fn execute(&self, item: &QueueItem) -> Result<QueryOutcome, SqlDispatchError> {
        let output = match &self.pools {
            Some(pools) => self.execute_pooled(pools, &item.handle).await?,
            None => self.execute_shared(&item.handle).await?,
        };
        Ok(classify_output(
            item.handle.kind(),
            output,
            &item.options,
            item.context.as_deref(),
        ))
    }

    async fn execute_pooled(
        &self,
        pools: &PoolRouter<D>,
        handle: &QueryHandle,
    ) -> Result<DriverOutput, SqlDispatchError> {
        let mut conn = pools.acquire(handle.kind()).await?;
        self.set_status(ConnectionStatus::Connected);
        handle.bind(conn.binding());

        let result = self.driver.execute(conn.connection_mut(), handle.sql()).await;
        if let Err(err) = &result {
            if self.driver.is_connection_lost(err) {
                conn.mark_broken();
            }
        }
        result
    }

    async fn execute_shared(&self, handle: &QueryHandle) -> Result<DriverOutput, SqlDispatchError> {
        let mut guard = self.shared.lock().await;
        if guard.is_none() {
            *guard = Some(self.open_shared().await?);
        }
        let Some(shared) = guard.as_mut() else {
            return Err(SqlDispatchError::ConnectionError(
                "shared connection unavailable".into(),
            ));
        };
        handle.bind(ConnectionBinding {
            endpoint: shared.endpoint.to_string(),
            role: ConnectionRole::Shared,
            connection_id: shared.id,
        });

        let result = self.driver.execute(&mut shared.conn, handle.sql()).await;
        if let Err(err) = &result {
            if self.driver.is_connection_lost(err) {
                tracing::warn!(connection_id = shared.id, "shared connection lost");
                if let Some(dead) = guard.take() {
                    self.close_shared(dead).await;
                }
                self.set_status(ConnectionStatus::Disconnected);
            }
        }
        result
    }

    async fn open_shared(&self) -> Result<SharedConnection<D>, SqlDispatchError> {
        self.set_status(ConnectionStatus::Connecting);
        let endpoint = self.config.write_endpoint();
        match self.driver.connect(&endpoint).await {
            Ok(conn) => {
                let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
                self.set_status(ConnectionStatus::Connected);
                tracing::info!(endpoint = %endpoint, connection_id = id, "connected");
                Ok(SharedConnection { conn, endpoint, id })
            }
            Err(err) => {
                self.set_status(ConnectionStatus::Disconnected);
                tracing::warn!(endpoint = %endpoint, error = %err, "connect failed");
                Err(as_connection_error(err))
            }
        }
    }

    async fn close_shared(&self, shared: SharedConnection<D>) {
        let id = shared.id;
        if let Err(err) = self.driver.close(shared.conn).await {
            tracing::warn!(connection_id = id, error = %err, "error while closing connection");
        }
        tracing::info!(connection_id = id, "disconnected");
    }

    fn cancel_idle_timer(&self) {
        if let Some(token) = lock(&self.idle_timer).take() {
            token.cancel();
        }
    }

    /// Restart the idle-disconnect countdown for the shared connection.
    fn arm_idle_timer(self: &Arc<Self>) {
        if self.pools.is_some() {
            return;
        }
        let token = CancellationToken::new();
        if let Some(previous) = lock(&self.idle_timer).replace(token.clone()) {
            previous.cancel();
        }
        let weak = Arc::downgrade(self);
        let delay = self.config.idle_disconnect();
        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    if let Some(inner) = weak.upgrade() {
                        inner.idle_disconnect().await;
                    }
                }
            }
        });
    }

    async fn idle_disconnect(&self) {
        if self.status() != ConnectionStatus::Connected || !lock(&self.queue).is_idle() {
            return;
        }
        let mut guard = self.shared.lock().await;
        if !lock(&self.queue).is_idle() {
            return;
        }
        match guard.as_ref() {
            Some(shared) if !self.driver.has_pending_work(&shared.conn) => {}
            _ => return,
        }
        if let Some(shared) = guard.take() {
            self.set_status(ConnectionStatus::Disconnected);
            tracing::info!(connection_id = shared.id, "closing idle connection");
            self.close_shared(shared).await;
        }
    }
}
