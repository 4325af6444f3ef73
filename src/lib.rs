//! Query dispatch and dialect-aware SQL generation for `PostgreSQL`,
//! `MySQL`/`MariaDB`, and `SQLite`.
//!
//! Two halves:
//!
//! - [`statement::QueryGenerator`] turns structured input (tables, columns,
//!   [`where_clause::WhereInput`] filters, CTE specs) into SQL text for one
//!   dialect. It is pure and never touches a connection.
//! - [`manager::QueryManager`] runs SQL text through a [`driver::Driver`],
//!   bounding how many statements are active at once, queueing the rest in
//!   FIFO order, and routing reads and writes to replicated pools.
//!
//! ```rust
//! use sql_dispatch::prelude::*;
//!
//! let generator = QueryGenerator::new(Dialect::Postgres);
//! let sql = generator
//!     .select_query(
//!         "users",
//!         &SelectOptions::new()
//!             .filter(WhereInput::column("age", ColumnFilter::op(WhereOperator::Gte, 18)))
//!             .limit(10),
//!     )
//!     .unwrap();
//! assert_eq!(sql, "SELECT * FROM \"users\" WHERE \"age\" >= 18 LIMIT 10;");
//! ```

pub mod config;
pub mod dialect;
pub mod driver;
pub mod drivers;
pub mod error;
pub mod manager;
pub mod pool;
pub mod prelude;
pub mod query;
pub mod quoting;
pub mod results;
pub mod statement;
pub mod translation;
pub mod types;
pub mod where_clause;

pub use config::{ConnectionConfig, ConnectionConfigBuilder, Endpoint, PoolConfig, ReplicationConfig};
pub use driver::{Driver, DriverOutput};
pub use error::SqlDispatchError;
pub use manager::{ConnectionStatus, PlanReport, QueryManager};
pub use results::{CustomDbRow, ResultSet};
pub use statement::QueryGenerator;
pub use types::{Dialect, RowValues};
