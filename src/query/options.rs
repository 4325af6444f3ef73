use std::fmt;
use std::sync::Arc;

use super::kind::QueryKind;

/// Callback receiving each executed statement.
pub type LogFn = Arc<dyn Fn(&str) + Send + Sync>;

/// Per-query logging choice.
#[derive(Clone, Default)]
pub enum Logging {
    /// Manager-level logger if one is configured, plus tracing.
    #[default]
    Default,
    /// Nothing beyond tracing.
    Disabled,
    /// This callback instead of the manager-level logger.
    Custom(LogFn),
}

impl fmt::Debug for Logging {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Logging::Default => f.write_str("Default"),
            Logging::Disabled => f.write_str("Disabled"),
            Logging::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// How one submitted statement is executed and its result shaped.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Overrides classification from the SQL text.
    pub kind: Option<QueryKind>,
    /// Skip the context's field map.
    pub raw: bool,
    /// Return only the first row.
    pub plain: bool,
    /// Return one named column of the first row.
    pub scalar_column: Option<String>,
    pub logging: Logging,
}

impl QueryOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn kind(mut self, kind: QueryKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn raw(mut self) -> Self {
        self.raw = true;
        self
    }

    #[must_use]
    pub fn plain(mut self) -> Self {
        self.plain = true;
        self
    }

    #[must_use]
    pub fn scalar(mut self, column: impl Into<String>) -> Self {
        self.scalar_column = Some(column.into());
        self
    }

    #[must_use]
    pub fn logging(mut self, logging: Logging) -> Self {
        self.logging = logging;
        self
    }

    #[must_use]
    pub fn log_with<F>(self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.logging(Logging::Custom(Arc::new(f)))
    }
}
