use chrono::NaiveDateTime;

use super::{DeleteLimitStyle, DialectFeatures, DialectProfile, InsertIgnoreStyle, LockMode};
use crate::types::Dialect;

const FEATURES: DialectFeatures = DialectFeatures {
    limit_offset_order_in_cte: false,
    native_alter_column: true,
    delete_limit: DeleteLimitStyle::Native,
    update_limit: true,
    insert_ignore: InsertIgnoreStyle::Ignore,
    returning: false,
    engine_clause: true,
    inline_references: false,
    inline_single_primary_key: false,
    concurrent_index: false,
    partial_index: false,
    index_kinds: true,
    truncate: true,
};

/// Shared by `MySQL` and `MariaDB`; only the reported dialect differs.
#[derive(Debug)]
pub struct MysqlProfile {
    dialect: Dialect,
}

impl MysqlProfile {
    #[must_use]
    pub const fn mysql() -> Self {
        Self {
            dialect: Dialect::Mysql,
        }
    }

    #[must_use]
    pub const fn mariadb() -> Self {
        Self {
            dialect: Dialect::Mariadb,
        }
    }
}

impl DialectProfile for MysqlProfile {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn quote_char(&self) -> char {
        '`'
    }

    fn escape_string(&self, value: &str) -> String {
        let mut out = String::with_capacity(value.len() + 2);
        out.push('\'');
        for ch in value.chars() {
            match ch {
                '\0' => out.push_str("\\0"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\u{8}' => out.push_str("\\b"),
                '\t' => out.push_str("\\t"),
                '\u{1a}' => out.push_str("\\Z"),
                '\'' => out.push_str("\\'"),
                '"' => out.push_str("\\\""),
                '\\' => out.push_str("\\\\"),
                other => out.push(other),
            }
        }
        out.push('\'');
        out
    }

    fn boolean_literal(&self, value: bool) -> &'static str {
        if value { "true" } else { "false" }
    }

    fn timestamp_literal(&self, value: &NaiveDateTime) -> String {
        format!("'{}'", value.format("%Y-%m-%d %H:%M:%S%.3f"))
    }

    fn features(&self) -> &DialectFeatures {
        &FEATURES
    }

    fn lock_clause(&self, lock: LockMode) -> Option<&'static str> {
        Some(match lock {
            LockMode::Update => "FOR UPDATE",
            LockMode::Share => "LOCK IN SHARE MODE",
        })
    }

    fn rename_table(&self, before: &str, after: &str) -> String {
        format!("RENAME TABLE {before} TO {after};")
    }

    fn show_tables(&self) -> String {
        "SHOW TABLES;".to_string()
    }

    fn describe_table(&self, table: &str) -> String {
        format!("SHOW FULL COLUMNS FROM {table};")
    }

    fn show_indexes(&self, table: &str) -> String {
        format!("SHOW INDEX FROM {table};")
    }

    fn version_query(&self) -> &'static str {
        "SELECT VERSION() as `version`"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backslash_escapes_control_characters() {
        let p = MysqlProfile::mysql();
        assert_eq!(p.escape_string("a'b"), "'a\\'b'");
        assert_eq!(p.escape_string("line\nbreak"), "'line\\nbreak'");
        assert_eq!(p.escape_string("back\\slash"), "'back\\\\slash'");
    }

    #[test]
    fn mariadb_shares_mysql_rules() {
        let p = MysqlProfile::mariadb();
        assert_eq!(p.dialect(), Dialect::Mariadb);
        assert_eq!(p.quote_char(), '`');
        assert_eq!(p.lock_clause(LockMode::Share), Some("LOCK IN SHARE MODE"));
    }
}
