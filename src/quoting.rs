//! Identifier quoting and literal escaping.
//!
//! All functions are pure; dialect differences come from the
//! [`DialectProfile`](crate::dialect::DialectProfile) passed in.

use crate::dialect::{DialectProfile, profile_by_name};
use crate::error::SqlDispatchError;
use crate::types::RowValues;

/// Options for [`quote_identifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteOptions {
    /// Quote even when the dialect would allow a bare identifier.
    pub force: bool,
    /// When false, dialects that allow it leave plain identifiers unquoted
    /// (case-insensitive semantics).
    pub quote_identifiers: bool,
}

impl Default for QuoteOptions {
    fn default() -> Self {
        Self {
            force: false,
            quote_identifiers: true,
        }
    }
}

/// Quote `name` for the dialect, stripping any quote characters already present.
///
/// `*` passes through. Dialects that allow bare identifiers return the raw
/// name when `quote_identifiers` is off, the name has no `.`/`->`, and it is
/// not a reserved word.
#[must_use]
pub fn quote_identifier(profile: &dyn DialectProfile, name: &str, opts: QuoteOptions) -> String {
    if name == "*" {
        return name.to_string();
    }

    let quote = profile.quote_char();
    let raw = remove_quotes(name, quote);

    let bare_allowed = profile.allows_unquoted_identifiers()
        && !opts.force
        && !opts.quote_identifiers
        && !raw.contains('.')
        && !raw.contains("->")
        && !profile.is_reserved_word(&raw);

    if bare_allowed {
        raw
    } else {
        format!("{quote}{raw}{quote}")
    }
}

/// [`quote_identifier`] with the dialect picked by name.
///
/// # Errors
/// Returns `SqlDispatchError::UnsupportedDialect` when `dialect` is not registered.
pub fn quote_identifier_for(
    dialect: &str,
    name: &str,
    opts: QuoteOptions,
) -> Result<String, SqlDispatchError> {
    let profile = profile_by_name(dialect)?;
    Ok(quote_identifier(profile, name, opts))
}

/// Quote each `.`-separated part of a qualified name (`schema.table.column`).
#[must_use]
pub fn quote_identifiers(profile: &dyn DialectProfile, name: &str, opts: QuoteOptions) -> String {
    if is_identifier_quoted(name) {
        return name.to_string();
    }
    name.split('.')
        .map(|part| quote_identifier(profile, part, opts))
        .collect::<Vec<_>>()
        .join(".")
}

/// Remove every occurrence of `quote` from `name`.
#[must_use]
pub fn remove_quotes(name: &str, quote: char) -> String {
    name.chars().filter(|c| *c != quote).collect()
}

/// True when `name` consists solely of quoted segments (`"a"`, `` `a`.`b` ``,
/// `"a""b"`), optionally separated by `.` and surrounded by whitespace.
#[must_use]
pub fn is_identifier_quoted(name: &str) -> bool {
    let bytes = name.trim().as_bytes();
    if bytes.is_empty() {
        return false;
    }

    let mut idx = 0;
    while idx < bytes.len() {
        let quote = bytes[idx];
        if !matches!(quote, b'"' | b'\'' | b'`') {
            return false;
        }
        idx += 1;

        let mut closed = false;
        while idx < bytes.len() {
            if bytes[idx] == quote {
                if bytes.get(idx + 1) == Some(&quote) {
                    idx += 2; // doubled quote inside the segment
                    continue;
                }
                idx += 1;
                closed = true;
                break;
            }
            idx += 1;
        }
        if !closed {
            return false;
        }

        if bytes.get(idx) == Some(&b'.') {
            idx += 1;
        }
    }
    true
}

/// Render `value` as a literal safe to splice into SQL for the dialect.
#[must_use]
pub fn escape_literal(value: &RowValues, profile: &dyn DialectProfile) -> String {
    match value {
        RowValues::Null => "NULL".to_string(),
        RowValues::Int(i) => i.to_string(),
        RowValues::Float(f) if f.is_finite() => f.to_string(),
        RowValues::Float(f) => {
            if profile.dialect() == crate::types::Dialect::Postgres {
                let spelled = if f.is_nan() {
                    "NaN"
                } else if f.is_sign_positive() {
                    "Infinity"
                } else {
                    "-Infinity"
                };
                profile.escape_string(spelled)
            } else {
                "NULL".to_string()
            }
        }
        RowValues::Text(s) => profile.escape_string(s),
        RowValues::Bool(b) => profile.boolean_literal(*b).to_string(),
        RowValues::Timestamp(ts) => profile.timestamp_literal(ts),
        RowValues::JSON(json) => profile.escape_string(&json.to_string()),
        RowValues::Blob(bytes) => profile.blob_literal(bytes),
    }
}
