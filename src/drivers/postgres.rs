use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_postgres::{Client, NoTls, SimpleQueryMessage};

use crate::config::Endpoint;
use crate::driver::{Driver, DriverOutput};
use crate::error::SqlDispatchError;
use crate::types::{Dialect, RowValues};

/// Runs statements over the simple query protocol. Values come back as text.
#[derive(Debug, Clone, Default)]
pub struct PostgresDriver;

impl PostgresDriver {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// A client plus the task driving its socket.
pub struct PostgresConnection {
    client: Client,
    task: JoinHandle<()>,
}

fn map_pg_error(err: tokio_postgres::Error) -> SqlDispatchError {
    if err.is_closed() {
        SqlDispatchError::connection_lost(err.to_string())
    } else {
        SqlDispatchError::PostgresError(err)
    }
}

#[async_trait]
impl Driver for PostgresDriver {
    type Connection = PostgresConnection;

    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn connect(&self, endpoint: &Endpoint) -> Result<PostgresConnection, SqlDispatchError> {
        let mut cfg = tokio_postgres::Config::new();
        if let Some(host) = &endpoint.host {
            cfg.host(host);
        }
        if let Some(port) = endpoint.port {
            cfg.port(port);
        }
        if let Some(user) = &endpoint.username {
            cfg.user(user);
        }
        if let Some(password) = &endpoint.password {
            cfg.password(password);
        }
        if let Some(dbname) = &endpoint.database {
            cfg.dbname(dbname);
        }

        let (client, connection) = cfg
            .connect(NoTls)
            .await
            .map_err(|e| SqlDispatchError::ConnectionError(format!("{endpoint}: {e}")))?;
        let label = endpoint.to_string();
        let task = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(endpoint = %label, error = %e, "postgres connection terminated");
            }
        });
        Ok(PostgresConnection { client, task })
    }

    async fn execute(
        &self,
        conn: &mut PostgresConnection,
        sql: &str,
    ) -> Result<DriverOutput, SqlDispatchError> {
        let messages = conn.client.simple_query(sql).await.map_err(map_pg_error)?;

        let mut columns: Vec<String> = Vec::new();
        let mut rows = Vec::new();
        let mut affected = 0usize;
        for message in messages {
            match message {
                SimpleQueryMessage::Row(row) => {
                    if columns.is_empty() {
                        columns = row.columns().iter().map(|c| c.name().to_string()).collect();
                    }
                    let values = (0..row.len())
                        .map(|idx| {
                            row.get(idx)
                                .map_or(RowValues::Null, |text| RowValues::Text(text.to_string()))
                        })
                        .collect();
                    rows.push(values);
                }
                SimpleQueryMessage::CommandComplete(count) => {
                    affected = usize::try_from(count).unwrap_or(usize::MAX);
                }
                _ => {}
            }
        }

        if columns.is_empty() && rows.is_empty() {
            return Ok(DriverOutput::affected(affected, None));
        }
        let mut out = DriverOutput::rows(columns, rows);
        out.rows_affected = affected;
        Ok(out)
    }

    async fn close(&self, conn: PostgresConnection) -> Result<(), SqlDispatchError> {
        drop(conn.client);
        conn.task.abort();
        Ok(())
    }

    async fn ping(&self, conn: &mut PostgresConnection) -> Result<(), SqlDispatchError> {
        if conn.client.is_closed() {
            return Err(SqlDispatchError::connection_lost("postgres client is closed"));
        }
        conn.client.simple_query("SELECT 1").await.map_err(map_pg_error)?;
        Ok(())
    }
}
