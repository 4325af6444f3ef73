use std::collections::HashMap;
use std::sync::Arc;

use crate::types::RowValues;

/// One result row. Column names and the name lookup table are shared with
/// every other row of the same [`ResultSet`].
#[derive(Debug, Clone, PartialEq)]
pub struct CustomDbRow {
    pub column_names: Arc<Vec<String>>,
    pub rows: Vec<RowValues>,
    #[doc(hidden)]
    pub(crate) column_index_cache: Arc<HashMap<String, usize>>,
}

impl CustomDbRow {
    #[must_use]
    pub fn new(column_names: Arc<Vec<String>>, rows: Vec<RowValues>) -> Self {
        let column_index_cache = Arc::new(index_columns(&column_names));
        Self {
            column_names,
            rows,
            column_index_cache,
        }
    }

    #[must_use]
    pub fn get_column_index(&self, column_name: &str) -> Option<usize> {
        self.column_index_cache.get(column_name).copied()
    }

    /// Value of `column_name`, or `None` when the row has no such column.
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        self.rows.get(self.get_column_index(column_name)?)
    }

    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&RowValues> {
        self.rows.get(index)
    }

    /// Column/value pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RowValues)> {
        self.column_names
            .iter()
            .map(String::as_str)
            .zip(self.rows.iter())
    }
}

/// Rows of one statement plus the affected-row count the driver reported.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub results: Vec<CustomDbRow>,
    pub rows_affected: usize,
    column_names: Option<Arc<Vec<String>>>,
    column_index_cache: Option<Arc<HashMap<String, usize>>>,
}

impl ResultSet {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> ResultSet {
        ResultSet {
            results: Vec::with_capacity(capacity),
            ..ResultSet::default()
        }
    }

    /// Build a result set from column names and row-major values.
    #[must_use]
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<RowValues>>) -> ResultSet {
        let mut rs = ResultSet::with_capacity(rows.len());
        rs.set_column_names(Arc::new(columns));
        for row in rows {
            rs.add_row_values(row);
        }
        rs
    }

    /// Column names shared by every row added afterwards.
    pub fn set_column_names(&mut self, column_names: Arc<Vec<String>>) {
        self.column_index_cache = Some(Arc::new(index_columns(&column_names)));
        self.column_names = Some(column_names);
    }

    #[must_use]
    pub fn get_column_names(&self) -> Option<&Arc<Vec<String>>> {
        self.column_names.as_ref()
    }

    /// Append one row. Ignored until column names are set.
    pub fn add_row_values(&mut self, row_values: Vec<RowValues>) {
        if let (Some(column_names), Some(cache)) = (&self.column_names, &self.column_index_cache) {
            self.results.push(CustomDbRow {
                column_names: Arc::clone(column_names),
                rows: row_values,
                column_index_cache: Arc::clone(cache),
            });
            self.rows_affected += 1;
        }
    }

    /// Append a built row; its columns become the set's columns if none are set.
    pub fn add_row(&mut self, row: CustomDbRow) {
        if self.column_names.is_none() {
            self.column_index_cache = Some(Arc::clone(&row.column_index_cache));
            self.column_names = Some(Arc::clone(&row.column_names));
        }

        self.results.push(row);
        self.rows_affected += 1;
    }

    /// Rename columns according to `field_map` (raw name -> mapped name).
    #[must_use]
    pub fn rename_columns(self, field_map: &HashMap<String, String>) -> ResultSet {
        let Some(columns) = &self.column_names else {
            return self;
        };
        if !columns.iter().any(|c| field_map.contains_key(c)) {
            return self;
        }

        let renamed: Vec<String> = columns
            .iter()
            .map(|c| field_map.get(c).cloned().unwrap_or_else(|| c.clone()))
            .collect();
        let rows_affected = self.rows_affected;
        let mut out = ResultSet::from_rows(
            renamed,
            self.results.into_iter().map(|row| row.rows).collect(),
        );
        out.rows_affected = rows_affected;
        out
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

fn index_columns(column_names: &[String]) -> HashMap<String, usize> {
    column_names
        .iter()
        .enumerate()
        .map(|(i, name)| (name.clone(), i))
        .collect()
}
