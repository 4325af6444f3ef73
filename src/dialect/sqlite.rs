use super::{DeleteLimitStyle, DialectFeatures, DialectProfile, InsertIgnoreStyle, LockMode};
use crate::types::Dialect;

const FEATURES: DialectFeatures = DialectFeatures {
    limit_offset_order_in_cte: true,
    native_alter_column: false,
    delete_limit: DeleteLimitStyle::RowidSubquery,
    update_limit: false,
    insert_ignore: InsertIgnoreStyle::OrIgnore,
    returning: false,
    engine_clause: false,
    inline_references: true,
    inline_single_primary_key: true,
    concurrent_index: false,
    partial_index: true,
    index_kinds: false,
    truncate: false,
};

#[derive(Debug, Default)]
pub struct SqliteProfile;

impl DialectProfile for SqliteProfile {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn quote_char(&self) -> char {
        '`'
    }

    fn escape_string(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    fn boolean_literal(&self, value: bool) -> &'static str {
        if value { "1" } else { "0" }
    }

    fn features(&self) -> &DialectFeatures {
        &FEATURES
    }

    fn lock_clause(&self, _lock: LockMode) -> Option<&'static str> {
        None
    }

    fn show_tables(&self) -> String {
        "SELECT name FROM `sqlite_master` WHERE type='table' and name!='sqlite_sequence';"
            .to_string()
    }

    fn describe_table(&self, table: &str) -> String {
        format!("PRAGMA TABLE_INFO({table});")
    }

    fn show_indexes(&self, table: &str) -> String {
        format!("PRAGMA INDEX_LIST({table});")
    }

    fn version_query(&self) -> &'static str {
        "SELECT sqlite_version() as `version`"
    }
}
