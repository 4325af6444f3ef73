use super::QueryGenerator;
use super::select::SortDirection;
use crate::error::SqlDispatchError;
use crate::where_clause::WhereInput;

/// Join target of the recursive member: `INNER JOIN table AS alias ON ...`.
#[derive(Debug, Clone, PartialEq)]
pub struct CteJoin {
    pub table: String,
    pub alias: String,
    /// `(alias column, cte column)` pairs compared for equality.
    pub on: Vec<(String, String)>,
}

impl CteJoin {
    pub fn new(table: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            alias: alias.into(),
            on: Vec::new(),
        }
    }

    #[must_use]
    pub fn on(mut self, alias_column: impl Into<String>, cte_column: impl Into<String>) -> Self {
        self.on.push((alias_column.into(), cte_column.into()));
        self
    }
}

/// Recursive member of a CTE.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CteRecursive {
    pub next: Option<CteJoin>,
    /// Expression for each extra CTE column, e.g. `("depth", "depth + 1")`.
    pub values: Vec<(String, String)>,
    /// Conditions on the joined table.
    pub filter: Option<WhereInput>,
    /// Conditions on the CTE's own rows.
    pub cte_filter: Option<WhereInput>,
}

impl CteRecursive {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn next(mut self, join: CteJoin) -> Self {
        self.next = Some(join);
        self
    }

    #[must_use]
    pub fn value(mut self, column: impl Into<String>, expression: impl Into<String>) -> Self {
        self.values.push((column.into(), expression.into()));
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: WhereInput) -> Self {
        self.filter = Some(filter);
        self
    }

    #[must_use]
    pub fn cte_filter(mut self, filter: WhereInput) -> Self {
        self.cte_filter = Some(filter);
        self
    }
}

/// One named common table expression.
#[derive(Debug, Clone, PartialEq)]
pub struct CteSpec {
    pub name: String,
    /// Table the initial member selects from.
    pub table: String,
    /// Table columns carried through the CTE.
    pub columns: Vec<String>,
    /// Computed CTE columns with their initial expressions.
    pub extra: Vec<(String, String)>,
    pub filter: Option<WhereInput>,
    pub recursive: Option<CteRecursive>,
    /// `UNION` when true, `UNION ALL` otherwise.
    pub unique: bool,
    pub order: Vec<(String, SortDirection)>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl CteSpec {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            columns: Vec::new(),
            extra: Vec::new(),
            filter: None,
            recursive: None,
            unique: true,
            order: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    #[must_use]
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn extra(mut self, column: impl Into<String>, initial: impl Into<String>) -> Self {
        self.extra.push((column.into(), initial.into()));
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: WhereInput) -> Self {
        self.filter = Some(filter);
        self
    }

    #[must_use]
    pub fn recursive(mut self, recursive: CteRecursive) -> Self {
        self.recursive = Some(recursive);
        self
    }

    #[must_use]
    pub fn union_all(mut self) -> Self {
        self.unique = false;
        self
    }

    #[must_use]
    pub fn order_by(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.order.push((column.into(), direction));
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    fn all_columns(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .map(String::as_str)
            .chain(self.extra.iter().map(|(name, _)| name.as_str()))
    }
}

impl QueryGenerator {
    /// `WITH [RECURSIVE] ...` prefix (with trailing space) for the given CTEs.
    ///
    /// ORDER BY, LIMIT and OFFSET inside a CTE are only written for dialects
    /// that accept them there.
    ///
    /// # Errors
    /// Returns `SqlDispatchError::MalformedStatementSpec` when a CTE has no
    /// name or columns, when a recursive member has no `next` join target, or
    /// when an extra column has no expression in the recursive member.
    pub fn cte_query(&self, ctes: &[CteSpec]) -> Result<String, SqlDispatchError> {
        if ctes.is_empty() {
            return Err(SqlDispatchError::malformed("no CTE definitions given"));
        }
        let any_recursive = ctes.iter().any(|cte| cte.recursive.is_some());
        let items = ctes
            .iter()
            .map(|cte| self.cte_item(cte))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(format!(
            "WITH {}{} ",
            if any_recursive { "RECURSIVE " } else { "" },
            items.join(", ")
        ))
    }

    fn cte_item(&self, cte: &CteSpec) -> Result<String, SqlDispatchError> {
        if cte.name.trim().is_empty() {
            return Err(SqlDispatchError::malformed("CTE has no name"));
        }
        if cte.columns.is_empty() && cte.extra.is_empty() {
            return Err(SqlDispatchError::malformed(format!(
                "CTE {} selects no columns",
                cte.name
            )));
        }

        let supports_order = self.profile.features().limit_offset_order_in_cte;
        let name = self.quote_table(&cte.name);
        let table = self.quote_table(&cte.table);
        let header: Vec<String> = cte.all_columns().map(|c| self.quote(c)).collect();

        let mut initial_cols: Vec<String> = cte.columns.iter().map(|c| self.quote(c)).collect();
        initial_cols.extend(cte.extra.iter().map(|(_, expr)| expr.clone()));
        let mut body = format!(
            "SELECT {} FROM {table}{}",
            initial_cols.join(", "),
            self.where_fragment(cte.filter.as_ref(), Some(&cte.table))?
        );

        match &cte.recursive {
            None => {
                if supports_order {
                    body.push_str(&self.cte_order(cte));
                }
            }
            Some(recursive) => body.push_str(&self.cte_recursive(cte, recursive, &name)?),
        }

        if supports_order {
            body.push_str(&self.profile.limit_clause(cte.limit, cte.offset));
        }

        Ok(format!("{name}({}) AS ({body})", header.join(",")))
    }

    fn cte_recursive(
        &self,
        cte: &CteSpec,
        recursive: &CteRecursive,
        quoted_name: &str,
    ) -> Result<String, SqlDispatchError> {
        let Some(next) = &recursive.next else {
            return Err(SqlDispatchError::malformed(format!(
                "recursive member of CTE {} has no next join target",
                cte.name
            )));
        };

        let alias = self.quote(&next.alias);
        let mut cols: Vec<String> = cte
            .columns
            .iter()
            .map(|c| format!("{alias}.{}", self.quote(c)))
            .collect();
        for (column, _) in &cte.extra {
            let Some((_, expr)) = recursive.values.iter().find(|(name, _)| name == column) else {
                return Err(SqlDispatchError::malformed(format!(
                    "missing value for {column} in the recursive member of CTE {}",
                    cte.name
                )));
            };
            cols.push(expr.clone());
        }

        let on = if next.on.is_empty() {
            "1=1".to_string()
        } else {
            next.on
                .iter()
                .map(|(a, b)| format!("{alias}.{} = {quoted_name}.{}", self.quote(a), self.quote(b)))
                .collect::<Vec<_>>()
                .join(" AND ")
        };

        let mut conditions = Vec::new();
        for (filter, qualifier) in [
            (recursive.filter.as_ref(), next.alias.as_str()),
            (recursive.cte_filter.as_ref(), cte.name.as_str()),
        ] {
            if let Some(filter) = filter {
                let compiled = self.compile_where(filter, Some(qualifier))?;
                if !compiled.is_empty() {
                    conditions.push(compiled.inline(self.profile)?);
                }
            }
        }
        let where_sql = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        let order = if self.profile.features().limit_offset_order_in_cte {
            self.cte_order(cte)
        } else {
            String::new()
        };

        Ok(format!(
            " {} SELECT {} FROM {quoted_name} INNER JOIN {} AS {alias} ON {on}{where_sql}{order}",
            if cte.unique { "UNION" } else { "UNION ALL" },
            cols.join(", "),
            self.quote_table(&next.table),
        ))
    }

    /// Positional ORDER BY over the CTE's columns; unknown columns are skipped.
    fn cte_order(&self, cte: &CteSpec) -> String {
        let items: Vec<String> = cte
            .order
            .iter()
            .filter_map(|(column, direction)| {
                cte.all_columns()
                    .position(|c| c == column)
                    .map(|idx| format!("{} {}", idx + 1, direction.sql()))
            })
            .collect();
        if items.is_empty() {
            String::new()
        } else {
            format!(" ORDER BY {}", items.join(", "))
        }
    }
}
