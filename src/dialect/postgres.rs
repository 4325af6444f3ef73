use chrono::NaiveDateTime;

use super::{
    DeleteLimitStyle, DialectFeatures, DialectProfile, InsertIgnoreStyle, LockMode, hex,
};
use crate::types::Dialect;

const RESERVED_WORDS: &[&str] = &[
    "all", "analyse", "analyze", "and", "any", "array", "as", "asc", "asymmetric",
    "authorization", "binary", "both", "case", "cast", "check", "collate", "collation",
    "column", "concurrently", "constraint", "create", "cross", "current_catalog",
    "current_date", "current_role", "current_schema", "current_time", "current_timestamp",
    "current_user", "default", "deferrable", "desc", "distinct", "do", "else", "end",
    "except", "false", "fetch", "for", "foreign", "freeze", "from", "full", "grant",
    "group", "having", "ilike", "in", "initially", "inner", "intersect", "into", "is",
    "isnull", "join", "lateral", "leading", "left", "like", "limit", "localtime",
    "localtimestamp", "natural", "not", "notnull", "null", "offset", "on", "only", "or",
    "order", "outer", "overlaps", "placing", "primary", "references", "returning", "right",
    "select", "session_user", "similar", "some", "symmetric", "table", "tablesample",
    "then", "to", "trailing", "true", "union", "unique", "user", "using", "variadic",
    "verbose", "when", "where", "window", "with",
];

const FEATURES: DialectFeatures = DialectFeatures {
    limit_offset_order_in_cte: true,
    native_alter_column: true,
    delete_limit: DeleteLimitStyle::PrimaryKeySubquery,
    update_limit: false,
    insert_ignore: InsertIgnoreStyle::OnConflictDoNothing,
    returning: true,
    engine_clause: false,
    inline_references: true,
    inline_single_primary_key: false,
    concurrent_index: true,
    partial_index: true,
    index_kinds: false,
    truncate: true,
};

#[derive(Debug, Default)]
pub struct PostgresProfile;

impl DialectProfile for PostgresProfile {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn quote_char(&self) -> char {
        '"'
    }

    fn allows_unquoted_identifiers(&self) -> bool {
        true
    }

    fn is_reserved_word(&self, word: &str) -> bool {
        let lower = word.to_ascii_lowercase();
        RESERVED_WORDS.binary_search(&lower.as_str()).is_ok()
    }

    fn escape_string(&self, value: &str) -> String {
        // postgres text cannot hold NUL bytes
        let escaped = value.replace('\0', "").replace('\'', "''");
        format!("'{escaped}'")
    }

    fn boolean_literal(&self, value: bool) -> &'static str {
        if value { "true" } else { "false" }
    }

    fn timestamp_literal(&self, value: &NaiveDateTime) -> String {
        format!("'{} +00:00'", value.format("%Y-%m-%d %H:%M:%S%.3f"))
    }

    fn blob_literal(&self, bytes: &[u8]) -> String {
        format!("E'\\\\x{}'", hex(bytes))
    }

    fn features(&self) -> &DialectFeatures {
        &FEATURES
    }

    fn limit_clause(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        let mut fragment = String::new();
        if let Some(limit) = limit {
            fragment.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = offset {
            fragment.push_str(&format!(" OFFSET {offset}"));
        }
        fragment
    }

    fn lock_clause(&self, lock: LockMode) -> Option<&'static str> {
        Some(match lock {
            LockMode::Update => "FOR UPDATE",
            LockMode::Share => "FOR SHARE",
        })
    }

    fn show_tables(&self) -> String {
        "SELECT table_name FROM information_schema.tables WHERE table_schema = 'public' AND table_type LIKE '%TABLE' AND table_name != 'spatial_ref_sys';".to_string()
    }

    fn describe_table(&self, table: &str) -> String {
        let bare = unquote(table);
        format!(
            "SELECT column_name AS \"Field\", data_type AS \"Type\", is_nullable AS \"Null\", column_default AS \"Default\" FROM information_schema.columns WHERE table_name = {};",
            self.escape_string(&bare)
        )
    }

    fn show_indexes(&self, table: &str) -> String {
        format!(
            "SELECT i.relname AS name, ix.indisprimary AS primary, ix.indisunique AS unique, \
             array_agg(a.attname) AS column_names, pg_get_indexdef(ix.indexrelid) AS definition \
             FROM pg_class t, pg_class i, pg_index ix, pg_attribute a \
             WHERE t.oid = ix.indrelid AND i.oid = ix.indexrelid AND a.attrelid = t.oid \
             AND a.attnum = ANY(ix.indkey) AND t.relkind = 'r' AND t.relname = {} \
             GROUP BY i.relname, ix.indexrelid, ix.indisprimary, ix.indisunique ORDER BY i.relname;",
            self.escape_string(&unquote(table))
        )
    }

    fn version_query(&self) -> &'static str {
        "SHOW SERVER_VERSION"
    }
}

fn unquote(table: &str) -> String {
    table.trim_matches('"').replace("\"\"", "\"")
}
