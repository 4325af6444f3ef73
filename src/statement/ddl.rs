use lazy_static::lazy_static;
use regex::Regex;

use super::QueryGenerator;
use super::plan::{ColumnMap, MigrationPlan};
use super::select::SortDirection;
use crate::error::SqlDispatchError;
use crate::types::Dialect;
use crate::where_clause::WhereInput;

lazy_static! {
    static ref BOOLEAN_DEFAULT: Regex =
        Regex::new(r"(?i)\bDEFAULT\s+'?(true|false)'?").expect("valid boolean default regex");
    static ref DEFAULT_VALUE: Regex =
        Regex::new(r"(?i)\s+DEFAULT\s+(.+)$").expect("valid default regex");
}

/// Table-level options for `CREATE TABLE`; only MySQL/MariaDB use them.
#[derive(Debug, Clone)]
pub struct CreateTableOptions {
    pub engine: String,
    pub charset: Option<String>,
    pub collate: Option<String>,
    pub comment: Option<String>,
}

impl Default for CreateTableOptions {
    fn default() -> Self {
        Self {
            engine: "InnoDB".to_string(),
            charset: None,
            collate: None,
            comment: None,
        }
    }
}

/// Index flavour beyond a plain b-tree (MySQL/MariaDB only).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    FullText,
    Spatial,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexField {
    pub name: String,
    pub order: Option<SortDirection>,
    /// Prefix length, honoured by MySQL/MariaDB.
    pub length: Option<u32>,
}

impl From<&str> for IndexField {
    fn from(name: &str) -> Self {
        Self {
            name: name.to_string(),
            order: None,
            length: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexSpec {
    /// Defaults to `<table>_<field>_<field>`.
    pub name: Option<String>,
    pub fields: Vec<IndexField>,
    pub unique: bool,
    pub kind: Option<IndexKind>,
    /// Index method, e.g. `BTREE` or `gin`.
    pub using: Option<String>,
    pub concurrently: bool,
    /// Partial-index condition.
    pub filter: Option<WhereInput>,
}

impl IndexSpec {
    pub fn on<I, F>(fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<IndexField>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: IndexKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn using(mut self, method: impl Into<String>) -> Self {
        self.using = Some(method.into());
        self
    }

    #[must_use]
    pub fn concurrently(mut self) -> Self {
        self.concurrently = true;
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: WhereInput) -> Self {
        self.filter = Some(filter);
        self
    }
}

impl QueryGenerator {
    /// `CREATE TABLE IF NOT EXISTS`.
    ///
    /// Definitions containing `PRIMARY KEY` are collected into a trailing
    /// `PRIMARY KEY (...)` clause. SQLite keeps a single integer key inline as
    /// `INTEGER PRIMARY KEY`; MySQL moves inline `REFERENCES` into trailing
    /// `FOREIGN KEY` clauses and appends the engine clause.
    ///
    /// # Errors
    /// Returns `SqlDispatchError::MalformedStatementSpec` when `columns` is empty.
    pub fn create_table_query(
        &self,
        table: &str,
        columns: &ColumnMap,
        options: &CreateTableOptions,
    ) -> Result<String, SqlDispatchError> {
        if columns.is_empty() {
            return Err(SqlDispatchError::malformed(format!(
                "table {table} has no columns"
            )));
        }

        let features = self.profile.features();
        let key_count = columns
            .iter()
            .filter(|(_, def)| def.contains("PRIMARY KEY"))
            .count();

        let mut defs = Vec::with_capacity(columns.len());
        let mut primary_keys = Vec::new();
        let mut foreign_keys = Vec::new();

        for (name, definition) in columns.iter() {
            let quoted = self.quote(name);
            let is_key = definition.contains("PRIMARY KEY");

            if features.inline_single_primary_key {
                let mut def = definition.to_string();
                if is_key && definition.contains("INT") {
                    def = if definition.contains("AUTOINCREMENT") {
                        "INTEGER PRIMARY KEY AUTOINCREMENT".to_string()
                    } else {
                        "INTEGER PRIMARY KEY".to_string()
                    };
                    if let Some(idx) = definition.find(" REFERENCES") {
                        def.push_str(&definition[idx..]);
                    }
                }
                if is_key && key_count > 1 {
                    primary_keys.push(quoted.clone());
                    def = if definition.contains("NOT NULL") {
                        definition.replacen(" PRIMARY KEY", "", 1)
                    } else {
                        definition.replacen("PRIMARY KEY", "NOT NULL", 1)
                    };
                }
                defs.push(format!("{quoted} {def}"));
                continue;
            }

            let mut def = definition.to_string();
            if is_key {
                primary_keys.push(quoted.clone());
                def = collapse_spaces(&def.replacen("PRIMARY KEY", "", 1));
            }
            if !features.inline_references {
                if let Some(idx) = def.find("REFERENCES") {
                    foreign_keys.push(format!(
                        "FOREIGN KEY ({quoted}) {}",
                        def[idx..].trim()
                    ));
                    def = def[..idx].trim_end().to_string();
                }
            }
            defs.push(format!("{quoted} {def}"));
        }

        let mut body = defs.join(", ");
        if !primary_keys.is_empty() {
            body.push_str(&format!(", PRIMARY KEY ({})", primary_keys.join(", ")));
        }
        for fk in &foreign_keys {
            body.push_str(", ");
            body.push_str(fk);
        }

        let mut sql = format!("CREATE TABLE IF NOT EXISTS {} ({body})", self.quote_table(table));
        if features.engine_clause {
            sql.push_str(&format!(" ENGINE={}", options.engine));
            if let Some(comment) = &options.comment {
                sql.push_str(&format!(" COMMENT {}", self.profile.escape_string(comment)));
            }
            if let Some(charset) = &options.charset {
                sql.push_str(&format!(" DEFAULT CHARSET={charset}"));
            }
            if let Some(collate) = &options.collate {
                sql.push_str(&format!(" COLLATE {collate}"));
            }
        }
        sql.push(';');

        if self.dialect() == Dialect::Sqlite {
            sql = replace_boolean_defaults(&sql);
        }
        Ok(sql)
    }

    /// `DROP TABLE IF EXISTS`; `cascade` is honoured on PostgreSQL only.
    #[must_use]
    pub fn drop_table_query(&self, table: &str, cascade: bool) -> String {
        let cascade = if cascade && self.dialect() == Dialect::Postgres {
            " CASCADE"
        } else {
            ""
        };
        format!("DROP TABLE IF EXISTS {}{cascade};", self.quote_table(table))
    }

    #[must_use]
    pub fn rename_table_query(&self, before: &str, after: &str) -> String {
        self.profile
            .rename_table(&self.quote_table(before), &self.quote_table(after))
    }

    #[must_use]
    pub fn add_column_query(&self, table: &str, column: &str, definition: &str) -> String {
        let keyword = if self.is_mysql() { "ADD" } else { "ADD COLUMN" };
        let definition = if self.dialect() == Dialect::Sqlite {
            replace_boolean_defaults(definition)
        } else {
            definition.to_string()
        };
        format!(
            "ALTER TABLE {} {keyword} {} {definition};",
            self.quote_table(table),
            self.quote(column)
        )
    }

    /// Drop `column`. SQLite rebuilds the table from `current`.
    ///
    /// # Errors
    /// Returns `SqlDispatchError::MalformedStatementSpec` on SQLite when
    /// `column` is not in `current` or is its only column.
    pub fn remove_column_query(
        &self,
        table: &str,
        column: &str,
        current: &ColumnMap,
    ) -> Result<MigrationPlan, SqlDispatchError> {
        if self.profile.features().native_alter_column {
            let keyword = if self.is_mysql() { "DROP" } else { "DROP COLUMN" };
            return Ok(MigrationPlan::single(format!(
                "ALTER TABLE {} {keyword} {};",
                self.quote_table(table),
                self.quote(column)
            )));
        }

        let mut next = current.clone();
        if next.remove(column).is_none() {
            return Err(missing_column(table, column));
        }
        if next.is_empty() {
            return Err(SqlDispatchError::malformed(format!(
                "cannot remove the last column of {table}"
            )));
        }
        let copy: Vec<String> = next.names().map(|n| self.quote(n)).collect();
        self.rebuild_plan(table, &next, &copy)
    }

    /// Change the definition of `column`. SQLite rebuilds the table.
    ///
    /// # Errors
    /// Returns `SqlDispatchError::MalformedStatementSpec` on SQLite when
    /// `column` is not in `current`.
    pub fn change_column_query(
        &self,
        table: &str,
        column: &str,
        definition: &str,
        current: &ColumnMap,
    ) -> Result<MigrationPlan, SqlDispatchError> {
        let quoted_table = self.quote_table(table);
        let quoted = self.quote(column);

        match self.dialect() {
            Dialect::Postgres => {
                let mut base = definition.to_string();
                let mut actions = Vec::new();
                if base.contains("NOT NULL") {
                    base = collapse_spaces(&base.replace("NOT NULL", ""));
                    actions.push(format!("ALTER COLUMN {quoted} SET NOT NULL"));
                } else {
                    actions.push(format!("ALTER COLUMN {quoted} DROP NOT NULL"));
                }
                if let Some(caps) = DEFAULT_VALUE.captures(&base) {
                    actions.push(format!("ALTER COLUMN {quoted} SET DEFAULT {}", &caps[1]));
                    base = DEFAULT_VALUE.replace(&base, "").to_string();
                }
                actions.push(format!("ALTER COLUMN {quoted} TYPE {}", base.trim()));
                Ok(MigrationPlan::single(format!(
                    "ALTER TABLE {quoted_table} {};",
                    actions.join(", ")
                )))
            }
            Dialect::Mysql | Dialect::Mariadb => {
                if let Some(idx) = definition.find("REFERENCES") {
                    let fk_name = self.quote(&format!("{table}_{column}_foreign_idx"));
                    let base = definition[..idx].trim();
                    let mut sql = format!("ALTER TABLE {quoted_table} ");
                    if !base.is_empty() {
                        sql.push_str(&format!("CHANGE {quoted} {quoted} {base} "));
                    }
                    sql.push_str(&format!(
                        "ADD CONSTRAINT {fk_name} FOREIGN KEY ({quoted}) {};",
                        definition[idx..].trim()
                    ));
                    Ok(MigrationPlan::single(sql))
                } else {
                    Ok(MigrationPlan::single(format!(
                        "ALTER TABLE {quoted_table} CHANGE {quoted} {quoted} {definition};"
                    )))
                }
            }
            Dialect::Sqlite => {
                if !current.contains(column) {
                    return Err(missing_column(table, column));
                }
                let mut next = current.clone();
                next.insert(column, definition);
                let copy: Vec<String> = next.names().map(|n| self.quote(n)).collect();
                self.rebuild_plan(table, &next, &copy)
            }
        }
    }

    /// Rename `before` to `after`. MySQL/MariaDB need the column's current
    /// definition and SQLite rebuilds the table, both taken from `current`.
    ///
    /// # Errors
    /// Returns `SqlDispatchError::MalformedStatementSpec` when `current` is
    /// needed and lacks `before`.
    pub fn rename_column_query(
        &self,
        table: &str,
        before: &str,
        after: &str,
        current: &ColumnMap,
    ) -> Result<MigrationPlan, SqlDispatchError> {
        let quoted_table = self.quote_table(table);
        match self.dialect() {
            Dialect::Postgres => Ok(MigrationPlan::single(format!(
                "ALTER TABLE {quoted_table} RENAME COLUMN {} TO {};",
                self.quote(before),
                self.quote(after)
            ))),
            Dialect::Mysql | Dialect::Mariadb => {
                let Some(definition) = current.get(before) else {
                    return Err(missing_column(table, before));
                };
                Ok(MigrationPlan::single(format!(
                    "ALTER TABLE {quoted_table} CHANGE {} {} {definition};",
                    self.quote(before),
                    self.quote(after)
                )))
            }
            Dialect::Sqlite => {
                let mut next = current.clone();
                if !next.rename(before, after) {
                    return Err(missing_column(table, before));
                }
                let import: Vec<String> = next
                    .names()
                    .map(|n| {
                        if n == after {
                            format!("{} AS {}", self.quote(before), self.quote(after))
                        } else {
                            self.quote(n)
                        }
                    })
                    .collect();
                self.rebuild_plan(table, &next, &import)
            }
        }
    }

    /// SQLite table rebuild: drop any leftover backup, create a temporary
    /// backup table with the new columns, copy rows into it, drop the
    /// original, recreate it, copy rows back, drop the backup. The temporary
    /// table only exists on the connection that created it, so the steps must
    /// share one connection.
    fn rebuild_plan(
        &self,
        table: &str,
        columns: &ColumnMap,
        import: &[String],
    ) -> Result<MigrationPlan, SqlDispatchError> {
        let backup = format!("{table}_backup");
        let quoted_table = self.quote_table(table);
        let quoted_backup = self.quote_table(&backup);
        let export: Vec<String> = columns.names().map(|n| self.quote(n)).collect();
        let options = CreateTableOptions::default();

        let create_backup = self.create_table_query(&backup, columns, &options)?.replacen(
            "CREATE TABLE IF NOT EXISTS",
            "CREATE TEMPORARY TABLE",
            1,
        );

        let mut plan = MigrationPlan::default();
        plan.push(format!("DROP TABLE IF EXISTS {quoted_backup};"));
        plan.push(create_backup);
        plan.push(format!(
            "INSERT INTO {quoted_backup} SELECT {} FROM {quoted_table};",
            import.join(", ")
        ));
        plan.push(format!("DROP TABLE {quoted_table};"));
        plan.push(self.create_table_query(table, columns, &options)?);
        plan.push(format!(
            "INSERT INTO {quoted_table} SELECT {} FROM {quoted_backup};",
            export.join(", ")
        ));
        plan.push(format!("DROP TABLE {quoted_backup};"));
        Ok(plan)
    }

    /// `CREATE INDEX` (or `ALTER TABLE ... ADD INDEX` on MySQL/MariaDB).
    ///
    /// # Errors
    /// Returns `SqlDispatchError::MalformedStatementSpec` for an empty field
    /// list or an option the dialect cannot express: `concurrently` outside
    /// PostgreSQL, `FULLTEXT`/`SPATIAL` outside MySQL/MariaDB, or a partial
    /// index where partial indexes are unsupported.
    pub fn add_index_query(&self, table: &str, index: &IndexSpec) -> Result<String, SqlDispatchError> {
        let features = self.profile.features();
        let dialect = self.profile.name();
        if index.fields.is_empty() {
            return Err(SqlDispatchError::malformed("index needs at least one field"));
        }
        if index.concurrently && !features.concurrent_index {
            return Err(SqlDispatchError::malformed(format!(
                "{dialect} cannot build indexes concurrently"
            )));
        }
        if index.kind.is_some() && !features.index_kinds {
            return Err(SqlDispatchError::malformed(format!(
                "{dialect} does not support FULLTEXT or SPATIAL indexes"
            )));
        }
        if index.filter.is_some() && !features.partial_index {
            return Err(SqlDispatchError::malformed(format!(
                "{dialect} does not support partial indexes"
            )));
        }

        let name = index.name.clone().unwrap_or_else(|| {
            let fields: Vec<&str> = index.fields.iter().map(|f| f.name.as_str()).collect();
            format!("{}_{}", table.replace('.', "_"), fields.join("_")).to_lowercase()
        });
        let fields: Vec<String> = index
            .fields
            .iter()
            .map(|field| {
                let mut sql = self.quote(&field.name);
                if let (Some(length), true) = (field.length, self.is_mysql()) {
                    sql.push_str(&format!("({length})"));
                }
                if let Some(order) = field.order {
                    sql.push(' ');
                    sql.push_str(order.sql());
                }
                sql
            })
            .collect();

        let quoted_table = self.quote_table(table);
        let quoted_name = self.quote(&name);
        let unique = if index.unique { "UNIQUE " } else { "" };
        let kind = match index.kind {
            Some(IndexKind::FullText) => "FULLTEXT ",
            Some(IndexKind::Spatial) => "SPATIAL ",
            None => "",
        };

        if self.is_mysql() {
            let using = index
                .using
                .as_ref()
                .map(|u| format!(" USING {u}"))
                .unwrap_or_default();
            return Ok(format!(
                "ALTER TABLE {quoted_table} ADD {unique}{kind}INDEX {quoted_name}{using} ({});",
                fields.join(", ")
            ));
        }

        let concurrently = if index.concurrently { "CONCURRENTLY " } else { "" };
        let using = match (&index.using, self.dialect()) {
            (Some(u), Dialect::Postgres) => format!(" USING {u}"),
            _ => String::new(),
        };
        let partial = self.where_fragment(index.filter.as_ref(), None)?;
        Ok(format!(
            "CREATE {unique}INDEX {concurrently}{quoted_name} ON {quoted_table}{using} ({}){partial};",
            fields.join(", ")
        ))
    }

    #[must_use]
    pub fn remove_index_query(&self, table: &str, name: &str) -> String {
        if self.is_mysql() {
            format!("DROP INDEX {} ON {};", self.quote(name), self.quote_table(table))
        } else {
            format!("DROP INDEX IF EXISTS {};", self.quote(name))
        }
    }

    fn is_mysql(&self) -> bool {
        matches!(self.dialect(), Dialect::Mysql | Dialect::Mariadb)
    }
}

fn missing_column(table: &str, column: &str) -> SqlDispatchError {
    SqlDispatchError::malformed(format!("column {column} does not exist in {table}"))
}

fn collapse_spaces(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn replace_boolean_defaults(sql: &str) -> String {
    BOOLEAN_DEFAULT
        .replace_all(sql, |caps: &regex::Captures<'_>| {
            if caps[1].eq_ignore_ascii_case("true") {
                "DEFAULT 1"
            } else {
                "DEFAULT 0"
            }
        })
        .into_owned()
}
