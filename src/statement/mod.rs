//! Dialect-aware statement generation.
//!
//! [`QueryGenerator`] turns structured statement descriptions into SQL text
//! for one dialect. Values are written as escaped literals and where clauses
//! are compiled through [`crate::where_clause`], so generated statements need
//! no parameter binding. Generation never touches a connection; every error
//! surfaces before any SQL is sent.

mod cte;
mod ddl;
mod dml;
mod plan;
mod select;

pub use cte::{CteJoin, CteRecursive, CteSpec};
pub use ddl::{CreateTableOptions, IndexField, IndexKind, IndexSpec};
pub use dml::{DeleteOptions, InsertOptions, UpdateOptions};
pub use plan::{ColumnMap, MigrationPlan, column_map_from_table_info};
pub use select::{Attribute, OrderBy, SelectOptions, SortDirection};

use crate::dialect::{DialectProfile, profile, profile_by_name};
use crate::error::SqlDispatchError;
use crate::quoting::{QuoteOptions, escape_literal, quote_identifier, quote_identifiers};
use crate::types::{Dialect, RowValues};
use crate::where_clause::{
    CompileOptions, CompiledWhere, UnknownOperatorPolicy, WhereInput, compile_where,
};

/// Knobs shared by every statement a generator builds.
#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    /// When false, dialects that allow it leave plain identifiers bare.
    pub quote_identifiers: bool,
    /// Column a bare where value is compared against.
    pub primary_key: String,
    pub unknown_operators: UnknownOperatorPolicy,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            quote_identifiers: true,
            primary_key: "id".to_string(),
            unknown_operators: UnknownOperatorPolicy::Reject,
        }
    }
}

/// Builds SQL statements for one dialect.
///
/// ```rust
/// use sql_dispatch::prelude::*;
///
/// let generator = QueryGenerator::new(Dialect::Sqlite);
/// let sql = generator
///     .select_query("users", &SelectOptions::new().filter(WhereInput::column("id", 7)))
///     .unwrap();
/// assert_eq!(sql, "SELECT * FROM `users` WHERE `id` = 7;");
/// ```
#[derive(Debug, Clone)]
pub struct QueryGenerator {
    profile: &'static dyn DialectProfile,
    options: GeneratorOptions,
}

impl QueryGenerator {
    #[must_use]
    pub fn new(dialect: Dialect) -> Self {
        Self {
            profile: profile(dialect),
            options: GeneratorOptions::default(),
        }
    }

    /// Generator for a dialect given by name.
    ///
    /// # Errors
    /// Returns `SqlDispatchError::UnsupportedDialect` for unknown names.
    pub fn for_name(dialect: &str) -> Result<Self, SqlDispatchError> {
        Ok(Self {
            profile: profile_by_name(dialect)?,
            options: GeneratorOptions::default(),
        })
    }

    #[must_use]
    pub fn with_options(mut self, options: GeneratorOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn profile(&self) -> &'static dyn DialectProfile {
        self.profile
    }

    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.profile.dialect()
    }

    #[must_use]
    pub fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    fn quote_options(&self) -> QuoteOptions {
        QuoteOptions {
            force: false,
            quote_identifiers: self.options.quote_identifiers,
        }
    }

    /// Quote a single identifier.
    #[must_use]
    pub fn quote(&self, name: &str) -> String {
        quote_identifier(self.profile, name, self.quote_options())
    }

    /// Quote a possibly schema-qualified table name.
    #[must_use]
    pub fn quote_table(&self, name: &str) -> String {
        quote_identifiers(self.profile, name, self.quote_options())
    }

    /// Escaped literal for the dialect.
    #[must_use]
    pub fn escape(&self, value: &RowValues) -> String {
        escape_literal(value, self.profile)
    }

    fn compile_options(&self, qualifier: Option<&str>) -> CompileOptions {
        CompileOptions {
            primary_key: self.options.primary_key.clone(),
            unknown_operators: self.options.unknown_operators,
            quote: self.quote_options(),
            qualifier: qualifier.map(str::to_string),
        }
    }

    /// Compile a where input into a clause with `?` bindings.
    ///
    /// # Errors
    /// Propagates operator and operand errors from the where compiler.
    pub fn compile_where(
        &self,
        input: &WhereInput,
        qualifier: Option<&str>,
    ) -> Result<CompiledWhere, SqlDispatchError> {
        compile_where(input, self.profile, &self.compile_options(qualifier))
    }

    /// Where clause with literals inlined, prefixed by ` WHERE ` unless empty.
    pub(crate) fn where_fragment(
        &self,
        input: Option<&WhereInput>,
        qualifier: Option<&str>,
    ) -> Result<String, SqlDispatchError> {
        let Some(input) = input else {
            return Ok(String::new());
        };
        let compiled = self.compile_where(input, qualifier)?;
        if compiled.is_empty() {
            return Ok(String::new());
        }
        Ok(format!(" WHERE {}", compiled.inline(self.profile)?))
    }

    /// Statement listing user tables.
    #[must_use]
    pub fn show_tables_query(&self) -> String {
        self.profile.show_tables()
    }

    /// Statement describing the columns of `table`.
    #[must_use]
    pub fn describe_table_query(&self, table: &str) -> String {
        self.profile.describe_table(&self.quote_table(table))
    }

    /// Statement listing the indexes of `table`.
    #[must_use]
    pub fn show_indexes_query(&self, table: &str) -> String {
        self.profile.show_indexes(&self.quote_table(table))
    }

    /// Statement reporting the server version.
    #[must_use]
    pub fn version_query(&self) -> String {
        self.profile.version_query().to_string()
    }
}
