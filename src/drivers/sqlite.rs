use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::types::Value;
use tokio::sync::Mutex;
use tokio::task::spawn_blocking;

use crate::config::Endpoint;
use crate::driver::{Driver, DriverOutput};
use crate::error::SqlDispatchError;
use crate::types::{Dialect, RowValues};

/// Runs statements through `rusqlite` on the blocking thread pool.
#[derive(Debug, Clone, Default)]
pub struct SqliteDriver {
    wal: bool,
}

impl SqliteDriver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch each new connection to WAL journaling.
    #[must_use]
    pub fn with_wal(mut self) -> Self {
        self.wal = true;
        self
    }
}

/// One open `SQLite` database handle.
#[derive(Clone)]
pub struct SqliteConnection {
    conn: Arc<Mutex<rusqlite::Connection>>,
}

impl SqliteConnection {
    async fn run<F, R>(&self, func: F) -> Result<R, SqlDispatchError>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<R, SqlDispatchError> + Send + 'static,
        R: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        spawn_blocking(move || {
            let mut guard = conn.blocking_lock();
            func(&mut guard)
        })
        .await
        .map_err(|e| SqlDispatchError::execution(format!("sqlite spawn_blocking join error: {e}")))?
    }
}

fn extract_value(row: &rusqlite::Row, idx: usize) -> Result<RowValues, SqlDispatchError> {
    let value: Value = row.get(idx)?;
    Ok(match value {
        Value::Null => RowValues::Null,
        Value::Integer(i) => RowValues::Int(i),
        Value::Real(f) => RowValues::Float(f),
        Value::Text(s) => RowValues::Text(s),
        Value::Blob(b) => RowValues::Blob(b),
    })
}

fn run_statement(conn: &mut rusqlite::Connection, sql: &str) -> Result<DriverOutput, SqlDispatchError> {
    let mut stmt = conn.prepare(sql)?;
    let column_count = stmt.column_count();

    if column_count == 0 {
        let affected = stmt.execute([])?;
        drop(stmt);
        let rowid = conn.last_insert_rowid();
        return Ok(DriverOutput::affected(
            affected,
            (affected > 0 && rowid > 0).then_some(rowid),
        ));
    }

    let columns: Vec<String> = stmt
        .column_names()
        .iter()
        .map(std::string::ToString::to_string)
        .collect();
    let mut rows = Vec::new();
    let mut cursor = stmt.query([])?;
    while let Some(row) = cursor.next()? {
        let mut values = Vec::with_capacity(column_count);
        for idx in 0..column_count {
            values.push(extract_value(row, idx)?);
        }
        rows.push(values);
    }
    Ok(DriverOutput::rows(columns, rows))
}

#[async_trait]
impl Driver for SqliteDriver {
    type Connection = SqliteConnection;

    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    /// Opens `endpoint.database` as a file path; `:memory:` when unset.
    async fn connect(&self, endpoint: &Endpoint) -> Result<SqliteConnection, SqlDispatchError> {
        let path = endpoint
            .database
            .clone()
            .unwrap_or_else(|| ":memory:".to_string());
        let wal = self.wal;
        let conn = spawn_blocking(move || -> Result<rusqlite::Connection, SqlDispatchError> {
            let conn = rusqlite::Connection::open(&path)
                .map_err(|e| SqlDispatchError::ConnectionError(format!("{path}: {e}")))?;
            if wal {
                conn.execute_batch("PRAGMA journal_mode = WAL;")?;
            }
            Ok(conn)
        })
        .await
        .map_err(|e| SqlDispatchError::ConnectionError(format!("sqlite open join error: {e}")))??;

        Ok(SqliteConnection {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn execute(
        &self,
        conn: &mut SqliteConnection,
        sql: &str,
    ) -> Result<DriverOutput, SqlDispatchError> {
        let sql = sql.to_owned();
        conn.run(move |guard| run_statement(guard, &sql)).await
    }

    async fn ping(&self, conn: &mut SqliteConnection) -> Result<(), SqlDispatchError> {
        conn.run(|guard| {
            guard.execute_batch("SELECT 1;")?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn executes_ddl_dml_and_selects() {
        let driver = SqliteDriver::new();
        let mut conn = driver.connect(&Endpoint::sqlite(":memory:")).await.unwrap();

        driver
            .execute(&mut conn, "CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT);")
            .await
            .unwrap();
        let inserted = driver
            .execute(&mut conn, "INSERT INTO t (name) VALUES ('a');")
            .await
            .unwrap();
        assert_eq!(inserted.rows_affected, 1);
        assert_eq!(inserted.last_insert_id, Some(1));

        let out = driver.execute(&mut conn, "SELECT id, name FROM t;").await.unwrap();
        assert_eq!(out.columns, vec!["id", "name"]);
        assert_eq!(out.rows, vec![vec![RowValues::Int(1), RowValues::Text("a".into())]]);
    }

    #[tokio::test]
    async fn syntax_errors_surface_as_sqlite_errors() {
        let driver = SqliteDriver::new();
        let mut conn = driver.connect(&Endpoint::default()).await.unwrap();
        let err = driver.execute(&mut conn, "SELEKT 1").await.unwrap_err();
        assert!(matches!(err, SqlDispatchError::SqliteError(_)));
        assert!(!driver.is_connection_lost(&err));
    }
}
