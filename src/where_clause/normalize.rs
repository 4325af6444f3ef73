use super::{
    ColumnFilter, CompileOptions, Operand, OperatorKey, UnknownOperatorPolicy, WhereInput,
    WhereOperator,
};
use crate::error::SqlDispatchError;
use crate::types::RowValues;

/// Right-hand side of a lazy comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum ComparisonValue {
    /// Bound through a `?` marker.
    Bound(RowValues),
    /// Written as the dialect's boolean literal.
    Bool(bool),
    /// `IS NULL` for equality, `IS NOT NULL` for inequality.
    Null,
    /// Another column.
    Column(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub op: WhereOperator,
    pub value: ComparisonValue,
}

/// Everything collected for one column, grouped by how it serializes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnConditions {
    /// `None` until an `IN` operand is seen; `Some(empty)` renders `IN (NULL)`.
    pub in_values: Option<Vec<RowValues>>,
    pub not_in: Vec<RowValues>,
    pub between: Vec<(RowValues, RowValues)>,
    pub not_between: Vec<(RowValues, RowValues)>,
    pub joins: Vec<String>,
    pub comparisons: Vec<Comparison>,
}

impl ColumnConditions {
    fn is_empty(&self) -> bool {
        self.in_values.is_none()
            && self.not_in.is_empty()
            && self.between.is_empty()
            && self.not_between.is_empty()
            && self.joins.is_empty()
            && self.comparisons.is_empty()
    }
}

/// Condition that is not tied to one column.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Raw {
        sql: String,
        bindings: Vec<RowValues>,
    },
    Any(Vec<ConditionSet>),
}

/// Normalized where input: columns in first-seen order plus the raw bucket.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionSet {
    pub columns: Vec<(String, ColumnConditions)>,
    pub fragments: Vec<Fragment>,
}

impl ConditionSet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty() && self.columns.iter().all(|(_, c)| c.is_empty())
    }

    fn column(&mut self, name: &str) -> &mut ColumnConditions {
        let idx = match self.columns.iter().position(|(n, _)| n == name) {
            Some(idx) => idx,
            None => {
                self.columns.push((name.to_string(), ColumnConditions::default()));
                self.columns.len() - 1
            }
        };
        &mut self.columns[idx].1
    }
}

/// Merge every unit of `input` into a single [`ConditionSet`].
///
/// # Errors
/// Returns `SqlDispatchError::UnsupportedOperator` for unknown keywords under
/// the reject policy and `MalformedStatementSpec` for operands that do not fit
/// their operator.
pub fn normalize(input: &WhereInput, opts: &CompileOptions) -> Result<ConditionSet, SqlDispatchError> {
    let mut set = ConditionSet::default();
    collect(input, opts, &mut set)?;
    Ok(set)
}

fn collect(
    input: &WhereInput,
    opts: &CompileOptions,
    set: &mut ConditionSet,
) -> Result<(), SqlDispatchError> {
    match input {
        WhereInput::PrimaryKey(filter) => apply_filter(set.column(&opts.primary_key), filter, opts),
        WhereInput::Raw { fragment, bindings } => {
            if !fragment.trim().is_empty() {
                set.fragments.push(Fragment::Raw {
                    sql: fragment.clone(),
                    bindings: bindings.clone(),
                });
            }
            Ok(())
        }
        WhereInput::Columns(columns) => {
            for (name, filter) in columns {
                apply_filter(set.column(name), filter, opts)?;
            }
            Ok(())
        }
        WhereInput::All(units) => {
            for unit in units {
                collect(unit, opts, set)?;
            }
            Ok(())
        }
        WhereInput::Any(branches) => {
            let mut sets = Vec::with_capacity(branches.len());
            for branch in branches {
                let branch_set = normalize(branch, opts)?;
                if !branch_set.is_empty() {
                    sets.push(branch_set);
                }
            }
            if !sets.is_empty() {
                set.fragments.push(Fragment::Any(sets));
            }
            Ok(())
        }
    }
}

fn apply_filter(
    cond: &mut ColumnConditions,
    filter: &ColumnFilter,
    opts: &CompileOptions,
) -> Result<(), SqlDispatchError> {
    match filter {
        ColumnFilter::Value(value) => {
            push_comparison(cond, WhereOperator::Eq, value, false);
            Ok(())
        }
        ColumnFilter::List(values) => {
            cond.in_values.get_or_insert_with(Vec::new).extend(values.iter().cloned());
            Ok(())
        }
        ColumnFilter::Ops(ops) => {
            for (key, operand) in ops {
                let op = match key {
                    OperatorKey::Op(op) => *op,
                    OperatorKey::Keyword(keyword) => match WhereOperator::parse(keyword) {
                        Some(op) => op,
                        None => match opts.unknown_operators {
                            UnknownOperatorPolicy::Reject => {
                                return Err(SqlDispatchError::UnsupportedOperator(keyword.clone()));
                            }
                            UnknownOperatorPolicy::TreatAsEquality => WhereOperator::Eq,
                        },
                    },
                };
                apply_operator(cond, op, operand)?;
            }
            Ok(())
        }
    }
}

fn apply_operator(
    cond: &mut ColumnConditions,
    op: WhereOperator,
    operand: &Operand,
) -> Result<(), SqlDispatchError> {
    match op {
        WhereOperator::In | WhereOperator::NotIn => {
            let values = match operand {
                Operand::Value(RowValues::Null) => return Ok(()),
                Operand::Value(v) => vec![v.clone()],
                Operand::List(vs) => vs.clone(),
                Operand::Range(a, b) => vec![a.clone(), b.clone()],
                Operand::Column(_) => {
                    return Err(SqlDispatchError::malformed(format!(
                        "`{}` needs values, not a column",
                        op.sql()
                    )));
                }
            };
            if op == WhereOperator::In {
                cond.in_values.get_or_insert_with(Vec::new).extend(values);
            } else {
                cond.not_in.extend(values);
            }
        }
        WhereOperator::Between | WhereOperator::NotBetween => {
            let range = match operand {
                Operand::Range(a, b) => (a.clone(), b.clone()),
                Operand::List(vs) if vs.len() == 2 => (vs[0].clone(), vs[1].clone()),
                _ => {
                    return Err(SqlDispatchError::malformed(format!(
                        "`{}` expects exactly two values",
                        op.sql()
                    )));
                }
            };
            if op == WhereOperator::Between {
                cond.between.push(range);
            } else {
                cond.not_between.push(range);
            }
        }
        WhereOperator::Join => match operand {
            Operand::Column(other) | Operand::Value(RowValues::Text(other)) => {
                cond.joins.push(other.clone());
            }
            _ => {
                return Err(SqlDispatchError::malformed(
                    "`join` expects the name of another column",
                ));
            }
        },
        _ => match operand {
            Operand::Value(value) => push_comparison(cond, op, value, true),
            Operand::Column(other) => cond.comparisons.push(Comparison {
                op,
                value: ComparisonValue::Column(other.clone()),
            }),
            Operand::List(values) if op == WhereOperator::Eq => {
                cond.in_values.get_or_insert_with(Vec::new).extend(values.iter().cloned());
            }
            Operand::List(values) if op == WhereOperator::Ne => {
                cond.not_in.extend(values.iter().cloned());
            }
            _ => {
                return Err(SqlDispatchError::malformed(format!(
                    "`{}` expects a single value",
                    op.sql()
                )));
            }
        },
    }
    Ok(())
}

/// `explicit` is true for operator objects; only those turn `NULL` into
/// `IS [NOT] NULL`. Bare null values are skipped.
fn push_comparison(cond: &mut ColumnConditions, op: WhereOperator, value: &RowValues, explicit: bool) {
    let value = match value {
        RowValues::Null if explicit && matches!(op, WhereOperator::Eq | WhereOperator::Ne) => {
            ComparisonValue::Null
        }
        RowValues::Null => return,
        RowValues::Bool(b) => ComparisonValue::Bool(*b),
        other => ComparisonValue::Bound(other.clone()),
    };
    cond.comparisons.push(Comparison { op, value });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> CompileOptions {
        CompileOptions::default()
    }

    #[test]
    fn units_merge_per_column() {
        let input = WhereInput::All(vec![
            WhereInput::column("age", ColumnFilter::op(WhereOperator::Gte, 18)),
            WhereInput::column("age", ColumnFilter::op(WhereOperator::Lt, 65)),
            WhereInput::column("name", "bob"),
        ]);
        let set = normalize(&input, &opts()).unwrap();
        assert_eq!(set.columns.len(), 2);
        assert_eq!(set.columns[0].0, "age");
        assert_eq!(set.columns[0].1.comparisons.len(), 2);
    }

    #[test]
    fn bare_null_is_skipped() {
        let set = normalize(&WhereInput::column("deleted_at", RowValues::Null), &opts()).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn explicit_null_equality_is_kept() {
        let input = WhereInput::column(
            "deleted_at",
            ColumnFilter::op(WhereOperator::Eq, RowValues::Null),
        );
        let set = normalize(&input, &opts()).unwrap();
        assert_eq!(set.columns[0].1.comparisons[0].value, ComparisonValue::Null);
    }

    #[test]
    fn unknown_keyword_policy() {
        let input = WhereInput::column("a", ColumnFilter::op("contains", 1));
        assert!(matches!(
            normalize(&input, &opts()),
            Err(SqlDispatchError::UnsupportedOperator(k)) if k == "contains"
        ));

        let lenient = CompileOptions {
            unknown_operators: UnknownOperatorPolicy::TreatAsEquality,
            ..opts()
        };
        let set = normalize(&input, &lenient).unwrap();
        assert_eq!(set.columns[0].1.comparisons[0].op, WhereOperator::Eq);
    }

    #[test]
    fn between_needs_two_values() {
        let input = WhereInput::column(
            "a",
            ColumnFilter::op(WhereOperator::Between, Operand::List(vec![RowValues::Int(1)])),
        );
        assert!(matches!(
            normalize(&input, &opts()),
            Err(SqlDispatchError::MalformedStatementSpec(_))
        ));
    }

    #[test]
    fn empty_in_list_is_remembered() {
        let set = normalize(&WhereInput::column("id", ColumnFilter::List(vec![])), &opts()).unwrap();
        assert_eq!(set.columns[0].1.in_values, Some(vec![]));
        assert!(!set.is_empty());
    }
}
