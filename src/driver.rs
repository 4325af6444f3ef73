//! The seam between the manager and a concrete database client.

use async_trait::async_trait;

use crate::config::Endpoint;
use crate::error::SqlDispatchError;
use crate::results::ResultSet;
use crate::types::{Dialect, RowValues};

/// Raw result of one statement, before classification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriverOutput {
    pub columns: Vec<String>,
    /// Row-major values.
    pub rows: Vec<Vec<RowValues>>,
    pub rows_affected: usize,
    pub last_insert_id: Option<i64>,
}

impl DriverOutput {
    /// Output of a statement that returned rows.
    #[must_use]
    pub fn rows(columns: Vec<String>, rows: Vec<Vec<RowValues>>) -> Self {
        let rows_affected = rows.len();
        Self {
            columns,
            rows,
            rows_affected,
            last_insert_id: None,
        }
    }

    /// Output of a statement that only changed rows.
    #[must_use]
    pub fn affected(rows_affected: usize, last_insert_id: Option<i64>) -> Self {
        Self {
            rows_affected,
            last_insert_id,
            ..Self::default()
        }
    }

    /// Convert columnar buffers (one `Vec` per column) into row-major output.
    /// Short columns are padded with `NULL`.
    #[must_use]
    pub fn from_columns(columns: Vec<(String, Vec<RowValues>)>) -> Self {
        let height = columns.iter().map(|(_, values)| values.len()).max().unwrap_or(0);
        let mut rows = vec![Vec::with_capacity(columns.len()); height];
        let mut names = Vec::with_capacity(columns.len());
        for (name, values) in columns {
            names.push(name);
            let mut values = values.into_iter();
            for row in &mut rows {
                row.push(values.next().unwrap_or(RowValues::Null));
            }
        }
        Self::rows(names, rows)
    }

    #[must_use]
    pub fn into_result_set(self) -> ResultSet {
        let mut rs = ResultSet::from_rows(self.columns, self.rows);
        rs.rows_affected = self.rows_affected;
        rs
    }
}

/// What the manager needs from a database client: open a connection, run one
/// statement of SQL text on it, close it.
#[async_trait]
pub trait Driver: Send + Sync + 'static {
    type Connection: Send + 'static;

    fn dialect(&self) -> Dialect;

    async fn connect(&self, endpoint: &Endpoint) -> Result<Self::Connection, SqlDispatchError>;

    async fn execute(
        &self,
        conn: &mut Self::Connection,
        sql: &str,
    ) -> Result<DriverOutput, SqlDispatchError>;

    async fn close(&self, conn: Self::Connection) -> Result<(), SqlDispatchError> {
        drop(conn);
        Ok(())
    }

    /// Cheap liveness probe used when the pool validates a connection.
    async fn ping(&self, _conn: &mut Self::Connection) -> Result<(), SqlDispatchError> {
        Ok(())
    }

    /// True when `err` means the connection it came from is unusable.
    fn is_connection_lost(&self, err: &SqlDispatchError) -> bool {
        err.is_connection_lost()
    }

    /// True while the client still has statements of its own in flight on
    /// `conn`; the idle timer never closes such a connection.
    fn has_pending_work(&self, _conn: &Self::Connection) -> bool {
        false
    }
}
