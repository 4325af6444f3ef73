//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::config::{
    ConnectionConfig, ConnectionConfigBuilder, Endpoint, PoolConfig, ReplicationConfig,
};
pub use crate::dialect::{DialectProfile, LockMode, profile, profile_by_name};
pub use crate::driver::{Driver, DriverOutput};
pub use crate::error::SqlDispatchError;
pub use crate::manager::{ConnectionStatus, PlanReport, QueryManager};
pub use crate::query::{
    ConnectionBinding, ConnectionRole, HandleState, Logging, QueryFuture, QueryHandle, QueryKind,
    QueryOptions, QueryOutcome, RecordContext, ResultContext,
};
pub use crate::quoting::{QuoteOptions, escape_literal, quote_identifier, quote_identifier_for};
pub use crate::results::{CustomDbRow, ResultSet};
pub use crate::statement::{
    Attribute, ColumnMap, CreateTableOptions, CteJoin, CteRecursive, CteSpec, DeleteOptions,
    GeneratorOptions, IndexField, IndexKind, IndexSpec, InsertOptions, MigrationPlan,
    QueryGenerator, SelectOptions, SortDirection, UpdateOptions,
};
pub use crate::translation::{PlaceholderStyle, inline_bindings, number_placeholders};
pub use crate::types::{Dialect, RowValues};
pub use crate::where_clause::{
    ColumnFilter, CompileOptions, CompiledWhere, Operand, OperatorKey, UnknownOperatorPolicy,
    WhereInput, WhereOperator, compile_where,
};

#[cfg(feature = "postgres")]
pub use crate::drivers::PostgresDriver;
#[cfg(feature = "sqlite")]
pub use crate::drivers::SqliteDriver;
