use thiserror::Error;

#[cfg(feature = "sqlite")]
use rusqlite;
#[cfg(feature = "postgres")]
use tokio_postgres;

#[derive(Debug, Error)]
pub enum SqlDispatchError {
    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[cfg(feature = "postgres")]
    #[error(transparent)]
    PostgresError(#[from] tokio_postgres::Error),

    #[error("Unsupported dialect: {0}")]
    UnsupportedDialect(String),

    #[error("Unsupported where operator: {0}")]
    UnsupportedOperator(String),

    #[error("Malformed statement spec: {0}")]
    MalformedStatementSpec(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Pool error: {0}")]
    PoolError(String),

    /// Error reported by the driver while running a statement. `connection_lost`
    /// marks the connection as dead so it is destroyed instead of reused.
    #[error("SQL execution error: {message}")]
    ExecutionError {
        message: String,
        connection_lost: bool,
    },

    #[error("Unimplemented feature: {0}")]
    Unimplemented(String),

    #[error("Other database error: {0}")]
    Other(String),
}

impl SqlDispatchError {
    /// Shorthand for an execution error on a connection that is still usable.
    #[must_use]
    pub fn execution(message: impl Into<String>) -> Self {
        SqlDispatchError::ExecutionError {
            message: message.into(),
            connection_lost: false,
        }
    }

    /// Execution error that also invalidates the connection it ran on.
    #[must_use]
    pub fn connection_lost(message: impl Into<String>) -> Self {
        SqlDispatchError::ExecutionError {
            message: message.into(),
            connection_lost: true,
        }
    }

    #[must_use]
    pub fn is_connection_lost(&self) -> bool {
        matches!(
            self,
            SqlDispatchError::ExecutionError {
                connection_lost: true,
                ..
            }
        )
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        SqlDispatchError::MalformedStatementSpec(message.into())
    }
}

impl From<bb8::RunError<SqlDispatchError>> for SqlDispatchError {
    fn from(err: bb8::RunError<SqlDispatchError>) -> Self {
        match err {
            bb8::RunError::User(e) => e,
            bb8::RunError::TimedOut => {
                SqlDispatchError::PoolError("timed out waiting for a pooled connection".into())
            }
        }
    }
}
