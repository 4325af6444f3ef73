//! Bundled [`Driver`](crate::driver::Driver) implementations.
//!
//! `MySQL`/`MariaDB` statements are generated by the crate, but connecting to
//! them needs a caller-supplied driver.

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub use postgres::{PostgresConnection, PostgresDriver};
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteConnection, SqliteDriver};
