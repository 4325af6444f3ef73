//! Where-condition compiler.
//!
//! Callers describe filters with [`WhereInput`], which mirrors the shapes a
//! model layer hands over: a bare primary-key value, a raw fragment with
//! bindings, a column hash, or a list of any of those. Compilation runs in two
//! phases: [`normalize`] merges every unit into a per-column [`ConditionSet`],
//! then [`serialize`] renders that set for one dialect as a [`CompiledWhere`]
//! whose bound values are marked with bare `?`.

use serde_json::Value as JsonValue;

mod normalize;
mod serialize;

pub use normalize::{
    ColumnConditions, Comparison, ComparisonValue, ConditionSet, Fragment, normalize,
};
pub use serialize::serialize;

use crate::dialect::DialectProfile;
use crate::error::SqlDispatchError;
use crate::quoting::QuoteOptions;
use crate::translation::{PlaceholderStyle, inline_bindings, number_placeholders};
use crate::types::RowValues;

/// Closed set of where operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WhereOperator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
    Between,
    NotBetween,
    Like,
    NotLike,
    Join,
}

impl WhereOperator {
    /// Resolve an operator keyword (case-insensitive), including the short
    /// aliases `..`, `!..`, `nbetween`, `nlike`, and `not`.
    #[must_use]
    pub fn parse(keyword: &str) -> Option<Self> {
        let op = match keyword.trim().to_ascii_lowercase().as_str() {
            "eq" | "=" => WhereOperator::Eq,
            "ne" | "!=" | "<>" => WhereOperator::Ne,
            "gt" | ">" => WhereOperator::Gt,
            "gte" | ">=" => WhereOperator::Gte,
            "lt" | "<" => WhereOperator::Lt,
            "lte" | "<=" => WhereOperator::Lte,
            "in" => WhereOperator::In,
            "not" | "notin" | "nin" => WhereOperator::NotIn,
            "between" | ".." => WhereOperator::Between,
            "notbetween" | "nbetween" | "!.." => WhereOperator::NotBetween,
            "like" => WhereOperator::Like,
            "notlike" | "nlike" => WhereOperator::NotLike,
            "join" => WhereOperator::Join,
            _ => return None,
        };
        Some(op)
    }

    #[must_use]
    pub fn sql(self) -> &'static str {
        match self {
            WhereOperator::Eq => "=",
            WhereOperator::Ne => "!=",
            WhereOperator::Gt => ">",
            WhereOperator::Gte => ">=",
            WhereOperator::Lt => "<",
            WhereOperator::Lte => "<=",
            WhereOperator::In => "IN",
            WhereOperator::NotIn => "NOT IN",
            WhereOperator::Between => "BETWEEN",
            WhereOperator::NotBetween => "NOT BETWEEN",
            WhereOperator::Like => "LIKE",
            WhereOperator::NotLike => "NOT LIKE",
            WhereOperator::Join => "JOIN",
        }
    }
}

/// An operator as written by the caller: either already typed or a keyword
/// still to be resolved against the operator table.
#[derive(Debug, Clone, PartialEq)]
pub enum OperatorKey {
    Op(WhereOperator),
    Keyword(String),
}

impl From<WhereOperator> for OperatorKey {
    fn from(op: WhereOperator) -> Self {
        OperatorKey::Op(op)
    }
}

impl From<&str> for OperatorKey {
    fn from(keyword: &str) -> Self {
        OperatorKey::Keyword(keyword.to_string())
    }
}

/// Right-hand side of an operator.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Value(RowValues),
    List(Vec<RowValues>),
    Range(RowValues, RowValues),
    /// Another column, compared by name rather than by value.
    Column(String),
}

impl<T: Into<RowValues>> From<T> for Operand {
    fn from(value: T) -> Self {
        Operand::Value(value.into())
    }
}

/// Filter applied to one column.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnFilter {
    /// Equality; `NULL` is skipped.
    Value(RowValues),
    /// Membership (`IN`).
    List(Vec<RowValues>),
    /// Operator object, e.g. `{gte: 5, lt: 10}`.
    Ops(Vec<(OperatorKey, Operand)>),
}

impl ColumnFilter {
    /// Single-operator filter.
    pub fn op(op: impl Into<OperatorKey>, operand: impl Into<Operand>) -> Self {
        ColumnFilter::Ops(vec![(op.into(), operand.into())])
    }

    /// `BETWEEN low AND high`.
    pub fn between(low: impl Into<RowValues>, high: impl Into<RowValues>) -> Self {
        ColumnFilter::Ops(vec![(
            WhereOperator::Between.into(),
            Operand::Range(low.into(), high.into()),
        )])
    }

    /// `IN (...)`.
    pub fn any_of<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<RowValues>,
    {
        ColumnFilter::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<RowValues>> From<T> for ColumnFilter {
    fn from(value: T) -> Self {
        ColumnFilter::Value(value.into())
    }
}

/// Where-condition input in any of the accepted shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereInput {
    /// Filter against the primary key (a bare value means equality).
    PrimaryKey(ColumnFilter),
    /// Raw SQL fragment with positional `?` bindings; never decomposed.
    Raw {
        fragment: String,
        bindings: Vec<RowValues>,
    },
    /// Column hash.
    Columns(Vec<(String, ColumnFilter)>),
    /// Units merged column by column and ANDed.
    All(Vec<WhereInput>),
    /// Branches compiled independently and ORed.
    Any(Vec<WhereInput>),
}

impl WhereInput {
    /// Column hash from `(column, filter)` pairs.
    pub fn columns<I, K, F>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, F)>,
        K: Into<String>,
        F: Into<ColumnFilter>,
    {
        WhereInput::Columns(
            pairs
                .into_iter()
                .map(|(k, f)| (k.into(), f.into()))
                .collect(),
        )
    }

    /// Single-column hash.
    pub fn column(name: impl Into<String>, filter: impl Into<ColumnFilter>) -> Self {
        WhereInput::Columns(vec![(name.into(), filter.into())])
    }

    /// Raw fragment with bindings.
    pub fn raw(fragment: impl Into<String>, bindings: Vec<RowValues>) -> Self {
        WhereInput::Raw {
            fragment: fragment.into(),
            bindings,
        }
    }

    /// Parse the loosely typed JSON shapes a model layer passes around:
    ///
    /// * scalar: primary-key equality
    /// * `["frag = ?", 1]`: raw fragment with bindings
    /// * `[1, 2, 3]`: primary key `IN`
    /// * `{"col": ...}`: column hash (`$or`/`or` with an array becomes [`WhereInput::Any`])
    /// * `[{...}, {...}]`: units merged with AND
    ///
    /// Operator keywords are kept as written and resolved during compilation.
    ///
    /// # Errors
    /// Returns `SqlDispatchError::MalformedStatementSpec` for shapes that fit none of the above.
    pub fn from_json(value: &JsonValue) -> Result<Self, SqlDispatchError> {
        match value {
            JsonValue::Null => Ok(WhereInput::All(Vec::new())),
            JsonValue::Bool(_) | JsonValue::Number(_) | JsonValue::String(_) => Ok(
                WhereInput::PrimaryKey(ColumnFilter::Value(RowValues::from_json(value))),
            ),
            JsonValue::Array(items) => match items.first() {
                None => Ok(WhereInput::All(Vec::new())),
                Some(JsonValue::String(fragment)) => Ok(WhereInput::Raw {
                    fragment: fragment.clone(),
                    bindings: items[1..].iter().map(RowValues::from_json).collect(),
                }),
                Some(JsonValue::Object(_) | JsonValue::Array(_)) => Ok(WhereInput::All(
                    items
                        .iter()
                        .map(WhereInput::from_json)
                        .collect::<Result<_, _>>()?,
                )),
                Some(_) => Ok(WhereInput::PrimaryKey(ColumnFilter::List(
                    items.iter().map(RowValues::from_json).collect(),
                ))),
            },
            JsonValue::Object(map) => {
                let mut columns = Vec::new();
                let mut units = Vec::new();
                for (key, value) in map {
                    if matches!(key.as_str(), "$or" | "or") {
                        let JsonValue::Array(branches) = value else {
                            return Err(SqlDispatchError::malformed(format!(
                                "`{key}` expects an array of conditions"
                            )));
                        };
                        units.push(WhereInput::Any(
                            branches
                                .iter()
                                .map(WhereInput::from_json)
                                .collect::<Result<_, _>>()?,
                        ));
                    } else {
                        columns.push((key.clone(), column_filter_from_json(value)));
                    }
                }
                if units.is_empty() {
                    return Ok(WhereInput::Columns(columns));
                }
                if !columns.is_empty() {
                    units.insert(0, WhereInput::Columns(columns));
                }
                Ok(if units.len() == 1 {
                    units.remove(0)
                } else {
                    WhereInput::All(units)
                })
            }
        }
    }
}

fn column_filter_from_json(value: &JsonValue) -> ColumnFilter {
    match value {
        JsonValue::Array(items) => ColumnFilter::List(items.iter().map(RowValues::from_json).collect()),
        JsonValue::Object(ops) => ColumnFilter::Ops(
            ops.iter()
                .map(|(key, operand)| {
                    let operand = match operand {
                        JsonValue::Array(items) => {
                            Operand::List(items.iter().map(RowValues::from_json).collect())
                        }
                        other => Operand::Value(RowValues::from_json(other)),
                    };
                    (OperatorKey::Keyword(key.clone()), operand)
                })
                .collect(),
        ),
        scalar => ColumnFilter::Value(RowValues::from_json(scalar)),
    }
}

/// What to do with an operator keyword missing from the operator table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownOperatorPolicy {
    /// Fail with `SqlDispatchError::UnsupportedOperator`.
    #[default]
    Reject,
    /// Treat the key as an equality comparison against the bound value.
    TreatAsEquality,
}

/// Options shared by both compiler phases.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Column a bare value is compared against.
    pub primary_key: String,
    pub unknown_operators: UnknownOperatorPolicy,
    pub quote: QuoteOptions,
    /// Table or alias prefixed to every column name.
    pub qualifier: Option<String>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            primary_key: "id".to_string(),
            unknown_operators: UnknownOperatorPolicy::default(),
            quote: QuoteOptions::default(),
            qualifier: None,
        }
    }
}

/// Serialized where clause with bare `?` markers for its bindings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledWhere {
    pub sql: String,
    pub bindings: Vec<RowValues>,
}

impl CompiledWhere {
    /// True when there is no condition at all (omit the WHERE keyword).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    /// The clause with every binding replaced by its escaped literal.
    ///
    /// # Errors
    /// Returns `SqlDispatchError::MalformedStatementSpec` when a raw fragment's
    /// markers and bindings disagree in number.
    pub fn inline(&self, profile: &dyn DialectProfile) -> Result<String, SqlDispatchError> {
        inline_bindings(&self.sql, &self.bindings, profile)
    }

    /// The clause with markers renumbered for a driver that binds parameters.
    #[must_use]
    pub fn numbered(&self, style: PlaceholderStyle) -> String {
        number_placeholders(&self.sql, style).into_owned()
    }
}

/// Normalize and serialize `input` for the dialect.
///
/// # Errors
/// Returns `SqlDispatchError::UnsupportedOperator` for unknown operator keywords
/// under [`UnknownOperatorPolicy::Reject`], or `MalformedStatementSpec` when an
/// operand does not fit its operator.
pub fn compile_where(
    input: &WhereInput,
    profile: &dyn DialectProfile,
    opts: &CompileOptions,
) -> Result<CompiledWhere, SqlDispatchError> {
    let set = normalize(input, opts)?;
    Ok(serialize(&set, profile, opts))
}
