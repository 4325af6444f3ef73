use super::QueryGenerator;
use super::cte::CteSpec;
use crate::dialect::LockMode;
use crate::error::SqlDispatchError;
use crate::where_clause::WhereInput;

/// One entry of a SELECT list.
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    Column(String),
    /// `[column, alias]`
    Aliased(String, String),
    /// Expression written verbatim.
    Raw(String),
}

impl From<&str> for Attribute {
    fn from(name: &str) -> Self {
        Attribute::Column(name.to_string())
    }
}

impl From<(&str, &str)> for Attribute {
    fn from((column, alias): (&str, &str)) -> Self {
        Attribute::Aliased(column.to_string(), alias.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    #[must_use]
    pub fn sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrderBy {
    Column(String, SortDirection),
    Raw(String),
}

/// Description of a SELECT statement.
#[derive(Debug, Clone, Default)]
pub struct SelectOptions {
    pub attributes: Vec<Attribute>,
    pub filter: Option<WhereInput>,
    pub order: Vec<OrderBy>,
    pub group: Vec<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub lock: Option<LockMode>,
    pub cte: Vec<CteSpec>,
}

impl SelectOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn attribute(mut self, attribute: impl Into<Attribute>) -> Self {
        self.attributes.push(attribute.into());
        self
    }

    #[must_use]
    pub fn attributes<I, A>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Attribute>,
    {
        self.attributes.extend(attributes.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: WhereInput) -> Self {
        self.filter = Some(filter);
        self
    }

    #[must_use]
    pub fn order_by(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.order.push(OrderBy::Column(column.into(), direction));
        self
    }

    #[must_use]
    pub fn order_raw(mut self, expression: impl Into<String>) -> Self {
        self.order.push(OrderBy::Raw(expression.into()));
        self
    }

    #[must_use]
    pub fn group_by(mut self, column: impl Into<String>) -> Self {
        self.group.push(column.into());
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

    #[must_use]
    pub fn lock(mut self, lock: LockMode) -> Self {
        self.lock = Some(lock);
        self
    }

    #[must_use]
    pub fn with_cte(mut self, cte: CteSpec) -> Self {
        self.cte.push(cte);
        self
    }
}

impl QueryGenerator {
    /// `SELECT` statement for `table`.
    ///
    /// Lock clauses are dropped for dialects without row locks.
    ///
    /// # Errors
    /// Propagates where-compiler errors and malformed CTE definitions.
    pub fn select_query(
        &self,
        table: &str,
        options: &SelectOptions,
    ) -> Result<String, SqlDispatchError> {
        let mut sql = String::new();
        if !options.cte.is_empty() {
            sql.push_str(&self.cte_query(&options.cte)?);
        }

        sql.push_str("SELECT ");
        sql.push_str(&self.attribute_list(&options.attributes));
        sql.push_str(" FROM ");
        sql.push_str(&self.quote_table(table));
        sql.push_str(&self.where_fragment(options.filter.as_ref(), None)?);

        if !options.group.is_empty() {
            let group: Vec<String> = options.group.iter().map(|g| self.quote_table(g)).collect();
            sql.push_str(" GROUP BY ");
            sql.push_str(&group.join(", "));
        }

        if !options.order.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_list(&options.order));
        }

        sql.push_str(&self.profile.limit_clause(options.limit, options.offset));

        if let Some(lock) = options.lock.and_then(|mode| self.profile.lock_clause(mode)) {
            sql.push(' ');
            sql.push_str(lock);
        }

        sql.push(';');
        Ok(sql)
    }

    pub(crate) fn attribute_list(&self, attributes: &[Attribute]) -> String {
        if attributes.is_empty() {
            return "*".to_string();
        }
        attributes
            .iter()
            .map(|attr| match attr {
                Attribute::Column(name) => self.quote_table(name),
                Attribute::Aliased(name, alias) => {
                    format!("{} AS {}", self.quote_table(name), self.quote(alias))
                }
                Attribute::Raw(expr) => expr.clone(),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub(crate) fn order_list(&self, order: &[OrderBy]) -> String {
        order
            .iter()
            .map(|item| match item {
                OrderBy::Column(name, direction) => {
                    format!("{} {}", self.quote_table(name), direction.sql())
                }
                OrderBy::Raw(expr) => expr.clone(),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Dialect, RowValues};
    use crate::where_clause::{ColumnFilter, WhereOperator};

    #[test]
    fn full_select_for_mysql() {
        let generator = QueryGenerator::new(Dialect::Mysql);
        let options = SelectOptions::new()
            .attributes(["id", "name"])
            .attribute(("created_at", "createdAt"))
            .filter(WhereInput::column("age", ColumnFilter::op(WhereOperator::Gte, 21)))
            .group_by("name")
            .order_by("id", SortDirection::Desc)
            .limit(10)
            .offset(20)
            .lock(LockMode::Update);
        assert_eq!(
            generator.select_query("users", &options).unwrap(),
            "SELECT `id`, `name`, `created_at` AS `createdAt` FROM `users` WHERE `age` >= 21 \
             GROUP BY `name` ORDER BY `id` DESC LIMIT 20, 10 FOR UPDATE;"
        );
    }

    #[test]
    fn postgres_limit_offset_and_share_lock() {
        let generator = QueryGenerator::new(Dialect::Postgres);
        let options = SelectOptions::new().limit(5).offset(10).lock(LockMode::Share);
        assert_eq!(
            generator.select_query("users", &options).unwrap(),
            "SELECT * FROM \"users\" LIMIT 5 OFFSET 10 FOR SHARE;"
        );
    }

    #[test]
    fn sqlite_drops_lock_clause() {
        let generator = QueryGenerator::new(Dialect::Sqlite);
        let options = SelectOptions::new()
            .filter(WhereInput::column("name", RowValues::Text("O'Neil".into())))
            .lock(LockMode::Update);
        assert_eq!(
            generator.select_query("users", &options).unwrap(),
            "SELECT * FROM `users` WHERE `name` = 'O''Neil';"
        );
    }

    #[test]
    fn offset_without_limit_on_mysql() {
        let generator = QueryGenerator::new(Dialect::Mysql);
        assert_eq!(
            generator
                .select_query("users", &SelectOptions::new().offset(3))
                .unwrap(),
            "SELECT * FROM `users` LIMIT 3, 10000000000000;"
        );
    }

    #[test]
    fn unknown_operator_fails_before_any_sql() {
        let generator = QueryGenerator::new(Dialect::Postgres);
        let options =
            SelectOptions::new().filter(WhereInput::column("a", ColumnFilter::op("regexp", "x")));
        assert!(matches!(
            generator.select_query("t", &options),
            Err(SqlDispatchError::UnsupportedOperator(_))
        ));
    }
}
