use super::normalize::{ColumnConditions, Comparison, ComparisonValue, ConditionSet, Fragment};
use super::{CompileOptions, CompiledWhere, WhereOperator};
use crate::dialect::DialectProfile;
use crate::quoting::quote_identifiers;
use crate::types::RowValues;

/// Render a normalized set for one dialect.
///
/// Column clauses come first in first-seen column order, then the raw bucket.
/// Within a column the order is fixed: `IN`, `NOT IN`, each `BETWEEN`, each
/// `NOT BETWEEN`, join equalities, comparisons. An empty set renders as `""`.
#[must_use]
pub fn serialize(set: &ConditionSet, profile: &dyn DialectProfile, opts: &CompileOptions) -> CompiledWhere {
    let mut writer = ClauseWriter {
        profile,
        opts,
        bindings: Vec::new(),
    };
    let parts = writer.set_parts(set);
    let sql = join_parts(&parts, " AND ");
    CompiledWhere {
        sql,
        bindings: writer.bindings,
    }
}

struct ClauseWriter<'a> {
    profile: &'a dyn DialectProfile,
    opts: &'a CompileOptions,
    bindings: Vec<RowValues>,
}

/// A rendered clause. Raw fragments and OR groups are `grouped` and get
/// parentheses whenever they are joined with another part.
struct Part {
    sql: String,
    grouped: bool,
}

fn join_parts(parts: &[Part], sep: &str) -> String {
    if parts.len() == 1 {
        return parts[0].sql.clone();
    }
    parts
        .iter()
        .map(|p| {
            if p.grouped {
                format!("({})", p.sql)
            } else {
                p.sql.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(sep)
}

impl ClauseWriter<'_> {
    fn set_parts(&mut self, set: &ConditionSet) -> Vec<Part> {
        let mut parts = Vec::new();
        for (column, cond) in &set.columns {
            let quoted = self.column(column);
            self.column_parts(&quoted, cond, &mut parts);
        }
        for fragment in &set.fragments {
            match fragment {
                Fragment::Raw { sql, bindings } => {
                    self.bindings.extend(bindings.iter().cloned());
                    parts.push(Part {
                        sql: sql.trim().to_string(),
                        grouped: true,
                    });
                }
                Fragment::Any(branches) => {
                    let rendered: Vec<Part> = branches
                        .iter()
                        .filter_map(|branch| {
                            let branch_parts = self.set_parts(branch);
                            if branch_parts.is_empty() {
                                return None;
                            }
                            Some(Part {
                                grouped: branch_parts.len() > 1 || branch_parts[0].grouped,
                                sql: join_parts(&branch_parts, " AND "),
                            })
                        })
                        .collect();
                    match rendered.len() {
                        0 => {}
                        1 => parts.extend(rendered),
                        _ => parts.push(Part {
                            sql: join_parts(&rendered, " OR "),
                            grouped: true,
                        }),
                    }
                }
            }
        }
        parts
    }

    fn column(&self, name: &str) -> String {
        let qualified = match &self.opts.qualifier {
            Some(q) if !name.contains('.') => format!("{q}.{name}"),
            _ => name.to_string(),
        };
        quote_identifiers(self.profile, &qualified, self.opts.quote)
    }

    fn column_parts(&mut self, column: &str, cond: &ColumnConditions, parts: &mut Vec<Part>) {
        let mut push = |sql: String| {
            parts.push(Part {
                sql,
                grouped: false,
            });
        };

        if let Some(values) = &cond.in_values {
            let list = if values.is_empty() {
                "NULL".to_string()
            } else {
                self.value_list(values)
            };
            push(format!("{column} IN ({list})"));
        }
        if !cond.not_in.is_empty() {
            let list = self.value_list(&cond.not_in);
            push(format!("{column} NOT IN ({list})"));
        }
        for (low, high) in &cond.between {
            let (low, high) = (self.value(low), self.value(high));
            push(format!("{column} BETWEEN {low} AND {high}"));
        }
        for (low, high) in &cond.not_between {
            let (low, high) = (self.value(low), self.value(high));
            push(format!("{column} NOT BETWEEN {low} AND {high}"));
        }
        for other in &cond.joins {
            let other = quote_identifiers(self.profile, other, self.opts.quote);
            push(format!("{column} = {other}"));
        }
        for Comparison { op, value } in &cond.comparisons {
            let sql = match value {
                ComparisonValue::Null if *op == WhereOperator::Ne => format!("{column} IS NOT NULL"),
                ComparisonValue::Null => format!("{column} IS NULL"),
                ComparisonValue::Bool(b) => {
                    format!("{column} {} {}", op.sql(), self.profile.boolean_literal(*b))
                }
                ComparisonValue::Column(other) => format!(
                    "{column} {} {}",
                    op.sql(),
                    quote_identifiers(self.profile, other, self.opts.quote)
                ),
                ComparisonValue::Bound(v) => {
                    self.bindings.push(v.clone());
                    format!("{column} {} ?", op.sql())
                }
            };
            push(sql);
        }
    }

    fn value_list(&mut self, values: &[RowValues]) -> String {
        values
            .iter()
            .map(|v| self.value(v))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Booleans are written as literals; everything else is bound.
    fn value(&mut self, value: &RowValues) -> String {
        if let RowValues::Bool(b) = value {
            return self.profile.boolean_literal(*b).to_string();
        }
        self.bindings.push(value.clone());
        "?".to_string()
    }
}
