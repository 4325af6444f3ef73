use lazy_static::lazy_static;
use regex::Regex;

/// What a statement does, as far as routing and result handling care.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Select,
    Insert,
    Update,
    BulkUpdate,
    Delete,
    BulkDelete,
    Upsert,
    Describe,
    ShowTables,
    ShowIndexes,
    Version,
    Raw,
}

lazy_static! {
    static ref VERSION: Regex =
        Regex::new(r"(?i)^\s*(SELECT\s+(sqlite_)?version\s*\(\s*\)|SHOW\s+SERVER_VERSION)")
            .expect("valid version regex");
    static ref SHOW_TABLES: Regex = Regex::new(
        r"(?i)^\s*(SHOW\s+(FULL\s+)?TABLES|SELECT\s+name\s+FROM\s+`?sqlite_master`?\s+WHERE\s+type\s*=\s*'table')"
    )
    .expect("valid show tables regex");
    static ref SHOW_INDEXES: Regex =
        Regex::new(r"(?i)^\s*(SHOW\s+INDEX(ES)?\b|PRAGMA\s+INDEX_LIST)").expect("valid show index regex");
    static ref DESCRIBE: Regex =
        Regex::new(r"(?i)^\s*(SHOW|DESCRIBE|DESC|PRAGMA)\b").expect("valid describe regex");
    static ref SELECT: Regex =
        Regex::new(r"(?i)^\s*\(?\s*(SELECT|WITH|VALUES)\b").expect("valid select regex");
    static ref INSERT: Regex = Regex::new(r"(?i)^\s*(INSERT|REPLACE)\b").expect("valid insert regex");
    static ref UPSERT: Regex = Regex::new(r"(?i)\bON\s+(DUPLICATE\s+KEY\s+UPDATE|CONFLICT\b.*\bDO\s+UPDATE)")
        .expect("valid upsert regex");
    static ref UPDATE: Regex = Regex::new(r"(?i)^\s*UPDATE\b").expect("valid update regex");
    static ref DELETE: Regex = Regex::new(r"(?i)^\s*DELETE\b").expect("valid delete regex");
    static ref TRUNCATE: Regex = Regex::new(r"(?i)^\s*TRUNCATE\b").expect("valid truncate regex");
}

impl QueryKind {
    /// Classify `sql`; an explicit `hint` always wins.
    #[must_use]
    pub fn classify(sql: &str, hint: Option<QueryKind>) -> QueryKind {
        if let Some(kind) = hint {
            return kind;
        }
        if VERSION.is_match(sql) {
            QueryKind::Version
        } else if SHOW_TABLES.is_match(sql) {
            QueryKind::ShowTables
        } else if SHOW_INDEXES.is_match(sql) {
            QueryKind::ShowIndexes
        } else if DESCRIBE.is_match(sql) {
            QueryKind::Describe
        } else if SELECT.is_match(sql) {
            QueryKind::Select
        } else if INSERT.is_match(sql) {
            if UPSERT.is_match(sql) {
                QueryKind::Upsert
            } else {
                QueryKind::Insert
            }
        } else if UPDATE.is_match(sql) {
            QueryKind::Update
        } else if DELETE.is_match(sql) {
            QueryKind::Delete
        } else if TRUNCATE.is_match(sql) {
            QueryKind::BulkDelete
        } else {
            QueryKind::Raw
        }
    }

    /// Statements routed to read replicas.
    #[must_use]
    pub fn is_read(self) -> bool {
        self == QueryKind::Select
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QueryKind::Select => "SELECT",
            QueryKind::Insert => "INSERT",
            QueryKind::Update => "UPDATE",
            QueryKind::BulkUpdate => "BULKUPDATE",
            QueryKind::Delete => "DELETE",
            QueryKind::BulkDelete => "BULKDELETE",
            QueryKind::Upsert => "UPSERT",
            QueryKind::Describe => "DESCRIBE",
            QueryKind::ShowTables => "SHOWTABLES",
            QueryKind::ShowIndexes => "SHOWINDEXES",
            QueryKind::Version => "VERSION",
            QueryKind::Raw => "RAW",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_leading_keyword() {
        let cases = [
            ("select * from t", QueryKind::Select),
            ("  WITH RECURSIVE x AS (SELECT 1) SELECT * FROM x", QueryKind::Select),
            ("INSERT INTO t (a) VALUES (1)", QueryKind::Insert),
            ("INSERT INTO t (a) VALUES (1) ON DUPLICATE KEY UPDATE a=VALUES(a)", QueryKind::Upsert),
            ("INSERT INTO t (a) VALUES (1) ON CONFLICT (a) DO UPDATE SET a=EXCLUDED.a", QueryKind::Upsert),
            ("INSERT INTO t (a) VALUES (1) ON CONFLICT DO NOTHING", QueryKind::Insert),
            ("UPDATE t SET a=1", QueryKind::Update),
            ("DELETE FROM t", QueryKind::Delete),
            ("TRUNCATE t", QueryKind::BulkDelete),
            ("SHOW TABLES;", QueryKind::ShowTables),
            ("SELECT name FROM `sqlite_master` WHERE type='table'", QueryKind::ShowTables),
            ("SHOW INDEX FROM `t`", QueryKind::ShowIndexes),
            ("PRAGMA TABLE_INFO(`t`);", QueryKind::Describe),
            ("SELECT VERSION() as `version`", QueryKind::Version),
            ("SHOW SERVER_VERSION", QueryKind::Version),
            ("CREATE TABLE t (a INT)", QueryKind::Raw),
        ];
        for (sql, kind) in cases {
            assert_eq!(QueryKind::classify(sql, None), kind, "{sql}");
        }
    }

    #[test]
    fn hint_wins() {
        assert_eq!(
            QueryKind::classify("SELECT 1", Some(QueryKind::Raw)),
            QueryKind::Raw
        );
    }
}
