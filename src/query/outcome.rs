use std::collections::HashMap;
use std::sync::Mutex;

use super::kind::QueryKind;
use super::options::QueryOptions;
use crate::driver::DriverOutput;
use crate::results::{CustomDbRow, ResultSet};
use crate::types::RowValues;

/// Caller-side target of a query: supplies the column renames applied to
/// mapped results and receives the id of an inserted row.
pub trait ResultContext: Send + Sync {
    /// Raw column name to mapped name.
    fn field_map(&self) -> Option<&HashMap<String, String>> {
        None
    }

    /// Column read from a `RETURNING` row when the driver reports no insert id.
    fn primary_key(&self) -> &str {
        "id"
    }

    fn set_insert_id(&self, _id: i64) {}
}

/// Ready-made [`ResultContext`] that stores the insert id it receives.
#[derive(Debug, Default)]
pub struct RecordContext {
    pub field_map: Option<HashMap<String, String>>,
    pub primary_key: Option<String>,
    insert_id: Mutex<Option<i64>>,
}

impl RecordContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_field_map(mut self, field_map: HashMap<String, String>) -> Self {
        self.field_map = Some(field_map);
        self
    }

    #[must_use]
    pub fn with_primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = Some(column.into());
        self
    }

    #[must_use]
    pub fn insert_id(&self) -> Option<i64> {
        self.insert_id.lock().map_or(None, |guard| *guard)
    }
}

impl ResultContext for RecordContext {
    fn field_map(&self) -> Option<&HashMap<String, String>> {
        self.field_map.as_ref()
    }

    fn primary_key(&self) -> &str {
        self.primary_key.as_deref().unwrap_or("id")
    }

    fn set_insert_id(&self, id: i64) {
        if let Ok(mut guard) = self.insert_id.lock() {
            *guard = Some(id);
        }
    }
}

/// Classified result of one query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Rows(ResultSet),
    /// `plain` queries: the first row, if any.
    Row(Option<CustomDbRow>),
    /// `scalar_column` queries and version lookups.
    Scalar(Option<RowValues>),
    Inserted {
        id: Option<i64>,
        rows_affected: usize,
    },
    Affected(usize),
    Tables(Vec<String>),
    /// Anything else, passed through untouched.
    Info(ResultSet),
}

impl QueryOutcome {
    #[must_use]
    pub fn rows(&self) -> Option<&ResultSet> {
        match self {
            QueryOutcome::Rows(rs) | QueryOutcome::Info(rs) => Some(rs),
            _ => None,
        }
    }

    #[must_use]
    pub fn rows_affected(&self) -> Option<usize> {
        match self {
            QueryOutcome::Affected(n) | QueryOutcome::Inserted { rows_affected: n, .. } => Some(*n),
            QueryOutcome::Rows(rs) | QueryOutcome::Info(rs) => Some(rs.rows_affected),
            _ => None,
        }
    }
}

/// Shape a driver result according to the statement kind and options.
pub fn classify_output(
    kind: QueryKind,
    output: DriverOutput,
    options: &QueryOptions,
    context: Option<&dyn ResultContext>,
) -> QueryOutcome {
    match kind {
        QueryKind::Insert => {
            let id = output.last_insert_id.or_else(|| {
                let key = context.map_or("id", |c| c.primary_key());
                let idx = output.columns.iter().position(|c| c == key)?;
                let value = output.rows.first()?.get(idx)?;
                value
                    .as_int()
                    .copied()
                    .or_else(|| value.as_text()?.trim().parse().ok())
            });
            if let (Some(id), Some(context)) = (id, context) {
                context.set_insert_id(id);
            }
            QueryOutcome::Inserted {
                id,
                rows_affected: output.rows_affected,
            }
        }
        QueryKind::Update
        | QueryKind::BulkUpdate
        | QueryKind::Delete
        | QueryKind::BulkDelete
        | QueryKind::Upsert => QueryOutcome::Affected(output.rows_affected),
        QueryKind::ShowTables => QueryOutcome::Tables(
            output
                .rows
                .into_iter()
                .filter_map(|row| match row.into_iter().next() {
                    Some(RowValues::Text(name)) => Some(name),
                    _ => None,
                })
                .collect(),
        ),
        QueryKind::Version => QueryOutcome::Scalar(
            output.rows.into_iter().next().and_then(|row| row.into_iter().next()),
        ),
        QueryKind::Select | QueryKind::Describe | QueryKind::ShowIndexes => {
            let mut rs = output.into_result_set();
            if !options.raw {
                if let Some(map) = context.and_then(|c| c.field_map()) {
                    rs = rs.rename_columns(map);
                }
            }
            if let Some(column) = &options.scalar_column {
                return QueryOutcome::Scalar(
                    rs.results.first().and_then(|row| row.get(column)).cloned(),
                );
            }
            if options.plain {
                return QueryOutcome::Row(rs.results.into_iter().next());
            }
            QueryOutcome::Rows(rs)
        }
        QueryKind::Raw => QueryOutcome::Info(output.into_result_set()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> DriverOutput {
        DriverOutput::rows(
            vec!["user_id".into(), "count".into()],
            vec![
                vec![RowValues::Int(1), RowValues::Int(10)],
                vec![RowValues::Int(2), RowValues::Int(20)],
            ],
        )
    }

    #[test]
    fn mapped_rows_use_field_map() {
        let ctx = RecordContext::new()
            .with_field_map(HashMap::from([("user_id".to_string(), "userId".to_string())]));
        let out = classify_output(QueryKind::Select, users(), &QueryOptions::new(), Some(&ctx));
        let QueryOutcome::Rows(rs) = out else {
            panic!("expected rows");
        };
        assert_eq!(rs.results[0].get("userId"), Some(&RowValues::Int(1)));

        let raw = classify_output(QueryKind::Select, users(), &QueryOptions::new().raw(), Some(&ctx));
        assert!(raw.rows().unwrap().results[0].get("user_id").is_some());
    }

    #[test]
    fn plain_and_scalar() {
        let plain = classify_output(QueryKind::Select, users(), &QueryOptions::new().plain(), None);
        assert!(matches!(plain, QueryOutcome::Row(Some(row)) if row.get("count") == Some(&RowValues::Int(10))));

        let scalar =
            classify_output(QueryKind::Select, users(), &QueryOptions::new().scalar("count"), None);
        assert_eq!(scalar, QueryOutcome::Scalar(Some(RowValues::Int(10))));

        let empty = classify_output(
            QueryKind::Select,
            DriverOutput::rows(vec!["count".into()], vec![]),
            &QueryOptions::new().plain(),
            None,
        );
        assert_eq!(empty, QueryOutcome::Row(None));
    }

    #[test]
    fn insert_id_reaches_context() {
        let ctx = RecordContext::new();
        let out = classify_output(
            QueryKind::Insert,
            DriverOutput::affected(1, Some(42)),
            &QueryOptions::new(),
            Some(&ctx),
        );
        assert_eq!(out, QueryOutcome::Inserted { id: Some(42), rows_affected: 1 });
        assert_eq!(ctx.insert_id(), Some(42));
    }

    #[test]
    fn insert_id_from_returning_row() {
        let ctx = RecordContext::new().with_primary_key("pk");
        let output = DriverOutput::rows(vec!["pk".into()], vec![vec![RowValues::Int(7)]]);
        let out = classify_output(QueryKind::Insert, output, &QueryOptions::new(), Some(&ctx));
        assert!(matches!(out, QueryOutcome::Inserted { id: Some(7), .. }));
        assert_eq!(ctx.insert_id(), Some(7));
    }

    #[test]
    fn text_insert_id_from_returning_row() {
        let ctx = RecordContext::new();
        let output = DriverOutput::rows(vec!["id".into()], vec![vec![RowValues::Text("7".into())]]);
        let out = classify_output(QueryKind::Insert, output, &QueryOptions::new(), Some(&ctx));
        assert_eq!(out, QueryOutcome::Inserted { id: Some(7), rows_affected: 1 });
        assert_eq!(ctx.insert_id(), Some(7));

        let uuid = DriverOutput::rows(vec!["id".into()], vec![vec![RowValues::Text("a1b2".into())]]);
        let out = classify_output(QueryKind::Insert, uuid, &QueryOptions::new(), None);
        assert!(matches!(out, QueryOutcome::Inserted { id: None, .. }));
    }

    #[test]
    fn tables_and_version() {
        let tables = classify_output(
            QueryKind::ShowTables,
            DriverOutput::rows(
                vec!["name".into()],
                vec![vec!["a".into()], vec!["b".into()]],
            ),
            &QueryOptions::new(),
            None,
        );
        assert_eq!(tables, QueryOutcome::Tables(vec!["a".into(), "b".into()]));

        let version = classify_output(
            QueryKind::Version,
            DriverOutput::rows(vec!["version".into()], vec![vec!["3.45.0".into()]]),
            &QueryOptions::new(),
            None,
        );
        assert_eq!(version, QueryOutcome::Scalar(Some(RowValues::Text("3.45.0".into()))));
    }

    #[test]
    fn writes_report_affected_rows() {
        let out = classify_output(
            QueryKind::Delete,
            DriverOutput::affected(3, None),
            &QueryOptions::new(),
            None,
        );
        assert_eq!(out, QueryOutcome::Affected(3));
        assert_eq!(out.rows_affected(), Some(3));
    }
}
