use crate::error::SqlDispatchError;
use crate::results::ResultSet;
use crate::types::RowValues;

/// Ordered list of statements that together apply one schema change.
///
/// Steps are meant to run serially and are not atomic as a group: if step
/// `n` fails, steps before it stay applied. Wrap the run in a transaction at a
/// higher layer when that matters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationPlan {
    steps: Vec<String>,
}

impl MigrationPlan {
    #[must_use]
    pub fn single(statement: impl Into<String>) -> Self {
        Self {
            steps: vec![statement.into()],
        }
    }

    pub fn push(&mut self, statement: impl Into<String>) {
        self.steps.push(statement.into());
    }

    #[must_use]
    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl IntoIterator for MigrationPlan {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.into_iter()
    }
}

/// Column name to SQL definition, in table order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    columns: Vec<(String, String)>,
}

impl ColumnMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a column, keeping its position when it already exists.
    pub fn insert(&mut self, name: impl Into<String>, definition: impl Into<String>) {
        let name = name.into();
        let definition = definition.into();
        match self.columns.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = definition,
            None => self.columns.push((name, definition)),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d.as_str())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Remove a column and return its definition.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let idx = self.columns.iter().position(|(n, _)| n == name)?;
        Some(self.columns.remove(idx).1)
    }

    /// Rename a column in place. Returns false when `before` is missing.
    pub fn rename(&mut self, before: &str, after: impl Into<String>) -> bool {
        match self.columns.iter_mut().find(|(n, _)| n == before) {
            Some(slot) => {
                slot.0 = after.into();
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns.iter().map(|(n, d)| (n.as_str(), d.as_str()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<N: Into<String>, D: Into<String>> FromIterator<(N, D)> for ColumnMap {
    fn from_iter<I: IntoIterator<Item = (N, D)>>(iter: I) -> Self {
        let mut map = ColumnMap::new();
        for (name, definition) in iter {
            map.insert(name, definition);
        }
        map
    }
}

/// Build a [`ColumnMap`] from the rows of `PRAGMA TABLE_INFO(table)`.
///
/// # Errors
/// Returns `SqlDispatchError::MalformedStatementSpec` when the result lacks
/// the `name` or `type` column.
pub fn column_map_from_table_info(info: &ResultSet) -> Result<ColumnMap, SqlDispatchError> {
    let mut map = ColumnMap::new();
    for row in &info.results {
        let Some(name) = row.get("name").and_then(RowValues::as_text) else {
            return Err(SqlDispatchError::malformed("table info row has no `name` column"));
        };
        let Some(kind) = row.get("type").and_then(RowValues::as_text) else {
            return Err(SqlDispatchError::malformed(format!(
                "table info row for {name} has no `type` column"
            )));
        };

        let mut definition = kind.to_string();
        if row.get("notnull").and_then(RowValues::as_bool) == Some(&true) {
            definition.push_str(" NOT NULL");
        }
        match row.get("dflt_value") {
            Some(RowValues::Text(default)) => {
                definition.push_str(" DEFAULT ");
                definition.push_str(default);
            }
            Some(RowValues::Int(default)) => {
                definition.push_str(&format!(" DEFAULT {default}"));
            }
            _ => {}
        }
        if row.get("pk").and_then(RowValues::as_int).is_some_and(|pk| *pk > 0) {
            definition.push_str(" PRIMARY KEY");
        }
        map.insert(name, definition);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_map_keeps_order() {
        let mut map: ColumnMap = [("id", "INTEGER"), ("name", "TEXT")].into_iter().collect();
        map.insert("id", "INTEGER PRIMARY KEY");
        assert_eq!(map.names().collect::<Vec<_>>(), vec!["id", "name"]);
        assert_eq!(map.get("id"), Some("INTEGER PRIMARY KEY"));
        assert!(map.rename("name", "title"));
        assert!(!map.rename("missing", "x"));
        assert_eq!(map.remove("title").as_deref(), Some("TEXT"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn table_info_becomes_definitions() {
        let info = ResultSet::from_rows(
            ["cid", "name", "type", "notnull", "dflt_value", "pk"]
                .into_iter()
                .map(String::from)
                .collect(),
            vec![
                vec![
                    RowValues::Int(0),
                    RowValues::Text("id".into()),
                    RowValues::Text("INTEGER".into()),
                    RowValues::Int(0),
                    RowValues::Null,
                    RowValues::Int(1),
                ],
                vec![
                    RowValues::Int(1),
                    RowValues::Text("name".into()),
                    RowValues::Text("VARCHAR(255)".into()),
                    RowValues::Int(1),
                    RowValues::Text("'anon'".into()),
                    RowValues::Int(0),
                ],
            ],
        );
        let map = column_map_from_table_info(&info).unwrap();
        assert_eq!(map.get("id"), Some("INTEGER PRIMARY KEY"));
        assert_eq!(map.get("name"), Some("VARCHAR(255) NOT NULL DEFAULT 'anon'"));
    }
}
