//! Per-dialect quoting, literal formatting, and feature flags.
//!
//! Each supported dialect implements [`DialectProfile`] once; callers pick a
//! profile through [`profile`] or [`profile_by_name`] instead of branching on
//! the dialect themselves.

use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDateTime;
use lazy_static::lazy_static;

use crate::error::SqlDispatchError;
use crate::types::Dialect;

mod mysql;
mod postgres;
mod sqlite;

pub use mysql::MysqlProfile;
pub use postgres::PostgresProfile;
pub use sqlite::SqliteProfile;

/// Row-locking mode appended to a SELECT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Update,
    Share,
}

/// How a dialect bounds the number of rows a DELETE touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteLimitStyle {
    /// `DELETE ... LIMIT n`
    Native,
    /// `DELETE ... WHERE <key> IN (SELECT <key> ... LIMIT n)`, keyed on the primary key.
    PrimaryKeySubquery,
    /// Same subquery shape keyed on the implicit `rowid`.
    RowidSubquery,
}

/// How a dialect spells "insert, skipping rows that violate a unique key".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertIgnoreStyle {
    /// `INSERT IGNORE INTO`
    Ignore,
    /// `INSERT OR IGNORE INTO`
    OrIgnore,
    /// `... ON CONFLICT DO NOTHING`
    OnConflictDoNothing,
}

/// Static capability table for one dialect.
#[derive(Debug, Clone, Copy)]
pub struct DialectFeatures {
    pub limit_offset_order_in_cte: bool,
    pub native_alter_column: bool,
    pub delete_limit: DeleteLimitStyle,
    pub update_limit: bool,
    pub insert_ignore: InsertIgnoreStyle,
    pub returning: bool,
    pub engine_clause: bool,
    pub inline_references: bool,
    pub inline_single_primary_key: bool,
    pub concurrent_index: bool,
    pub partial_index: bool,
    pub index_kinds: bool,
    pub truncate: bool,
}

/// Quoting, literal escaping, and feature flags for a single SQL dialect.
pub trait DialectProfile: Send + Sync + fmt::Debug {
    fn dialect(&self) -> Dialect;

    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    /// Character wrapped around quoted identifiers.
    fn quote_char(&self) -> char;

    /// Whether the dialect may leave identifiers unquoted when asked to.
    fn allows_unquoted_identifiers(&self) -> bool {
        false
    }

    fn is_reserved_word(&self, _word: &str) -> bool {
        false
    }

    /// Quoted, escaped string literal.
    fn escape_string(&self, value: &str) -> String;

    fn boolean_literal(&self, value: bool) -> &'static str;

    fn timestamp_literal(&self, value: &NaiveDateTime) -> String {
        format!("'{} +00:00'", value.format("%Y-%m-%d %H:%M:%S%.3f"))
    }

    fn blob_literal(&self, bytes: &[u8]) -> String {
        format!("X'{}'", hex(bytes))
    }

    fn features(&self) -> &DialectFeatures;

    /// `LIMIT`/`OFFSET` fragment with a leading space, or empty.
    fn limit_clause(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        match (limit, offset) {
            (None, Some(offset)) => format!(" LIMIT {offset}, 10000000000000"),
            (Some(limit), Some(offset)) => format!(" LIMIT {offset}, {limit}"),
            (Some(limit), None) => format!(" LIMIT {limit}"),
            (None, None) => String::new(),
        }
    }

    /// Locking clause for the mode, `None` when the dialect has no row locks.
    fn lock_clause(&self, lock: LockMode) -> Option<&'static str>;

    /// Statement renaming a table; names are already quoted.
    fn rename_table(&self, before: &str, after: &str) -> String {
        format!("ALTER TABLE {before} RENAME TO {after};")
    }

    /// Statement listing user tables.
    fn show_tables(&self) -> String;

    /// Statement describing a table's columns; `table` is already quoted.
    fn describe_table(&self, table: &str) -> String;

    /// Statement listing a table's indexes; `table` is already quoted.
    fn show_indexes(&self, table: &str) -> String;

    fn version_query(&self) -> &'static str;
}

pub(crate) fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write;

    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

static POSTGRES: PostgresProfile = PostgresProfile;
static MYSQL: MysqlProfile = MysqlProfile::mysql();
static MARIADB: MysqlProfile = MysqlProfile::mariadb();
static SQLITE: SqliteProfile = SqliteProfile;

lazy_static! {
    static ref REGISTRY: HashMap<&'static str, &'static dyn DialectProfile> = {
        [Dialect::Postgres, Dialect::Mysql, Dialect::Mariadb, Dialect::Sqlite]
            .into_iter()
            .map(|d| (d.name(), profile(d)))
            .collect()
    };
}

/// Profile for a dialect.
#[must_use]
pub fn profile(dialect: Dialect) -> &'static dyn DialectProfile {
    match dialect {
        Dialect::Postgres => &POSTGRES,
        Dialect::Mysql => &MYSQL,
        Dialect::Mariadb => &MARIADB,
        Dialect::Sqlite => &SQLITE,
    }
}

/// Profile looked up by dialect name (case-insensitive).
///
/// # Errors
/// Returns `SqlDispatchError::UnsupportedDialect` for names outside the supported set.
pub fn profile_by_name(name: &str) -> Result<&'static dyn DialectProfile, SqlDispatchError> {
    REGISTRY
        .get(name.trim().to_ascii_lowercase().as_str())
        .copied()
        .ok_or_else(|| SqlDispatchError::UnsupportedDialect(name.to_string()))
}
