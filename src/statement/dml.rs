use super::QueryGenerator;
use crate::dialect::{DeleteLimitStyle, InsertIgnoreStyle};
use crate::error::SqlDispatchError;
use crate::types::{Dialect, RowValues};
use crate::where_clause::WhereInput;

#[derive(Debug, Clone, Copy, Default)]
pub struct InsertOptions {
    /// Skip rows that violate a unique key.
    pub ignore_duplicates: bool,
    /// Append `RETURNING *` where the dialect supports it.
    pub returning: bool,
    /// Leave out columns whose value is `NULL`.
    pub omit_null: bool,
}

impl InsertOptions {
    #[must_use]
    pub fn ignore_duplicates(mut self) -> Self {
        self.ignore_duplicates = true;
        self
    }

    #[must_use]
    pub fn returning(mut self) -> Self {
        self.returning = true;
        self
    }

    #[must_use]
    pub fn omit_null(mut self) -> Self {
        self.omit_null = true;
        self
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateOptions {
    /// Row bound; only dialects with `UPDATE ... LIMIT` honour it.
    pub limit: Option<u64>,
    pub omit_null: bool,
    pub returning: bool,
}

/// DELETE options. Deletes touch at most one row unless `limit` is changed.
#[derive(Debug, Clone, Copy)]
pub struct DeleteOptions {
    /// `None` removes the bound entirely.
    pub limit: Option<u64>,
    /// Empty the whole table, ignoring `where` and `limit`.
    pub truncate: bool,
}

impl Default for DeleteOptions {
    fn default() -> Self {
        Self {
            limit: Some(1),
            truncate: false,
        }
    }
}

impl DeleteOptions {
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            limit: None,
            truncate: false,
        }
    }

    #[must_use]
    pub fn limit(limit: u64) -> Self {
        Self {
            limit: Some(limit),
            truncate: false,
        }
    }

    #[must_use]
    pub fn truncate() -> Self {
        Self {
            limit: None,
            truncate: true,
        }
    }
}

impl QueryGenerator {
    /// `INSERT` of one row.
    ///
    /// # Errors
    /// Never fails today; the signature matches the other generators.
    pub fn insert_query(
        &self,
        table: &str,
        values: &[(String, RowValues)],
        options: &InsertOptions,
    ) -> Result<String, SqlDispatchError> {
        let values: Vec<&(String, RowValues)> = values
            .iter()
            .filter(|(_, v)| !(options.omit_null && v.is_null()))
            .collect();

        let table = self.quote_table(table);
        let (prefix, suffix) = self.insert_ignore(options.ignore_duplicates);

        let body = if values.is_empty() {
            if self.is_mysql_family() {
                "() VALUES ()".to_string()
            } else {
                "DEFAULT VALUES".to_string()
            }
        } else {
            let columns: Vec<String> = values.iter().map(|(c, _)| self.quote(c)).collect();
            let literals: Vec<String> = values.iter().map(|(_, v)| self.escape(v)).collect();
            format!("({}) VALUES ({})", columns.join(","), literals.join(","))
        };

        Ok(format!(
            "{prefix} {table} {body}{suffix}{};",
            self.returning(options.returning)
        ))
    }

    /// Multi-row `INSERT`. The column list is the union of every row's keys
    /// in first-seen order; rows missing a column get `NULL`.
    ///
    /// # Errors
    /// Returns `SqlDispatchError::MalformedStatementSpec` when `rows` is empty
    /// or no row has any column.
    pub fn bulk_insert_query(
        &self,
        table: &str,
        rows: &[Vec<(String, RowValues)>],
        options: &InsertOptions,
    ) -> Result<String, SqlDispatchError> {
        if rows.is_empty() {
            return Err(SqlDispatchError::malformed("bulk insert needs at least one row"));
        }

        let mut columns: Vec<&str> = Vec::new();
        for row in rows {
            for (column, value) in row {
                if options.omit_null && value.is_null() {
                    continue;
                }
                if !columns.contains(&column.as_str()) {
                    columns.push(column);
                }
            }
        }
        if columns.is_empty() {
            return Err(SqlDispatchError::malformed("bulk insert rows have no columns"));
        }

        let tuples: Vec<String> = rows
            .iter()
            .map(|row| {
                let literals: Vec<String> = columns
                    .iter()
                    .map(|column| {
                        row.iter()
                            .find(|(c, _)| c.as_str() == *column)
                            .map_or_else(|| "NULL".to_string(), |(_, v)| self.escape(v))
                    })
                    .collect();
                format!("({})", literals.join(","))
            })
            .collect();

        let (prefix, suffix) = self.insert_ignore(options.ignore_duplicates);
        let quoted: Vec<String> = columns.iter().map(|c| self.quote(c)).collect();
        Ok(format!(
            "{prefix} {} ({}) VALUES {}{suffix}{};",
            self.quote_table(table),
            quoted.join(","),
            tuples.join(","),
            self.returning(options.returning)
        ))
    }

    /// Insert-or-update keyed on `conflict_keys`; `update_columns` are
    /// overwritten from the proposed row when the key already exists.
    ///
    /// # Errors
    /// Returns `SqlDispatchError::MalformedStatementSpec` when there are no
    /// values, or when the dialect needs conflict keys and none are given.
    pub fn upsert_query(
        &self,
        table: &str,
        values: &[(String, RowValues)],
        update_columns: &[&str],
        conflict_keys: &[&str],
    ) -> Result<String, SqlDispatchError> {
        if values.is_empty() {
            return Err(SqlDispatchError::malformed("upsert needs values"));
        }
        let insert = self.insert_query(table, values, &InsertOptions::default())?;
        let insert = insert.trim_end_matches(';');

        let update_columns: Vec<&str> = if update_columns.is_empty() {
            values.iter().map(|(c, _)| c.as_str()).collect()
        } else {
            update_columns.to_vec()
        };

        if self.is_mysql_family() {
            let sets: Vec<String> = update_columns
                .iter()
                .map(|c| {
                    let q = self.quote(c);
                    format!("{q}=VALUES({q})")
                })
                .collect();
            return Ok(format!("{insert} ON DUPLICATE KEY UPDATE {};", sets.join(", ")));
        }

        if conflict_keys.is_empty() {
            return Err(SqlDispatchError::malformed(format!(
                "{} upsert needs conflict key columns",
                self.profile.name()
            )));
        }
        let keys: Vec<String> = conflict_keys.iter().map(|c| self.quote(c)).collect();
        let sets: Vec<String> = update_columns
            .iter()
            .filter(|c| !conflict_keys.contains(*c))
            .map(|c| {
                let q = self.quote(c);
                format!("{q}=EXCLUDED.{q}")
            })
            .collect();
        let action = if sets.is_empty() {
            "DO NOTHING".to_string()
        } else {
            format!("DO UPDATE SET {}", sets.join(", "))
        };
        Ok(format!("{insert} ON CONFLICT ({}) {action};", keys.join(", ")))
    }

    /// `UPDATE ... SET ...`.
    ///
    /// # Errors
    /// Returns `SqlDispatchError::MalformedStatementSpec` when no column is
    /// left to set, and propagates where-compiler errors.
    pub fn update_query(
        &self,
        table: &str,
        values: &[(String, RowValues)],
        filter: Option<&WhereInput>,
        options: &UpdateOptions,
    ) -> Result<String, SqlDispatchError> {
        let sets: Vec<String> = values
            .iter()
            .filter(|(_, v)| !(options.omit_null && v.is_null()))
            .map(|(c, v)| format!("{}={}", self.quote(c), self.escape(v)))
            .collect();
        if sets.is_empty() {
            return Err(SqlDispatchError::malformed("update has no columns to set"));
        }

        let mut sql = format!(
            "UPDATE {} SET {}{}",
            self.quote_table(table),
            sets.join(","),
            self.where_fragment(filter, None)?
        );
        if self.profile.features().update_limit {
            sql.push_str(&self.profile.limit_clause(options.limit, None));
        }
        sql.push_str(&self.returning(options.returning));
        sql.push(';');
        Ok(sql)
    }

    /// `DELETE`, bounded to one row by default.
    ///
    /// # Errors
    /// Propagates where-compiler errors.
    pub fn delete_query(
        &self,
        table: &str,
        filter: Option<&WhereInput>,
        options: &DeleteOptions,
    ) -> Result<String, SqlDispatchError> {
        let table = self.quote_table(table);
        if options.truncate {
            return Ok(if self.profile.features().truncate {
                format!("TRUNCATE {table};")
            } else {
                format!("DELETE FROM {table};")
            });
        }

        let where_sql = self.where_fragment(filter, None)?;
        let Some(limit) = options.limit else {
            return Ok(format!("DELETE FROM {table}{where_sql};"));
        };

        let limit_sql = self.profile.limit_clause(Some(limit), None);
        Ok(match self.profile.features().delete_limit {
            DeleteLimitStyle::Native => format!("DELETE FROM {table}{where_sql}{limit_sql};"),
            DeleteLimitStyle::PrimaryKeySubquery => {
                let key = self.quote(&self.options.primary_key);
                format!(
                    "DELETE FROM {table} WHERE {key} IN (SELECT {key} FROM {table}{where_sql}{limit_sql});"
                )
            }
            DeleteLimitStyle::RowidSubquery => format!(
                "DELETE FROM {table} WHERE rowid IN (SELECT rowid FROM {table}{where_sql}{limit_sql});"
            ),
        })
    }

    fn is_mysql_family(&self) -> bool {
        matches!(self.dialect(), Dialect::Mysql | Dialect::Mariadb)
    }

    fn insert_ignore(&self, ignore: bool) -> (&'static str, &'static str) {
        if !ignore {
            return ("INSERT INTO", "");
        }
        match self.profile.features().insert_ignore {
            InsertIgnoreStyle::Ignore => ("INSERT IGNORE INTO", ""),
            InsertIgnoreStyle::OrIgnore => ("INSERT OR IGNORE INTO", ""),
            InsertIgnoreStyle::OnConflictDoNothing => ("INSERT INTO", " ON CONFLICT DO NOTHING"),
        }
    }

    fn returning(&self, requested: bool) -> &'static str {
        if requested && self.profile.features().returning {
            " RETURNING *"
        } else {
            ""
        }
    }
}
