//! Quote-aware handling of bare `?` binding markers in generated SQL.
//!
//! The where compiler emits `?` for every bound value. Before a statement is
//! handed to a driver the markers are either renumbered for the target
//! placeholder style or replaced by escaped literals. Markers inside string
//! literals, quoted identifiers, comments, and dollar-quoted blocks are left
//! untouched.

use std::borrow::Cow;

mod scanner;

use scanner::{
    State, block_comment_closes_at, block_comment_opens_at, dollar_tag_at, dollar_tag_closes_at,
    followed_by_digit, line_comment_at,
};

use crate::dialect::DialectProfile;
use crate::error::SqlDispatchError;
use crate::quoting::escape_literal;
use crate::types::{Dialect, RowValues};

/// Target placeholder style for numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// PostgreSQL-style placeholders like `$1`.
    Postgres,
    /// SQLite-style placeholders like `?1`.
    Sqlite,
}

/// Byte offsets of every bare `?` marker outside quoted regions and comments.
///
/// `backslash_escapes` treats `\` inside single-quoted strings as an escape
/// (MySQL/MariaDB string syntax).
#[must_use]
pub fn placeholder_positions(sql: &str, backslash_escapes: bool) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut state = State::Normal;
    let bytes = sql.as_bytes();
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                b'`' => state = State::BacktickQuoted,
                _ if line_comment_at(bytes, idx) => state = State::LineComment,
                _ if block_comment_opens_at(bytes, idx) => {
                    state = State::BlockComment(1);
                    idx += 1;
                }
                b'$' => {
                    if let Some((tag, advance)) = dollar_tag_at(bytes, idx) {
                        state = State::DollarQuoted(tag);
                        idx = advance;
                    }
                }
                b'?' if !followed_by_digit(bytes, idx) => positions.push(idx),
                _ => {}
            },
            State::SingleQuoted => {
                if backslash_escapes && b == b'\\' {
                    idx += 1; // skip escaped byte
                } else if b == b'\'' {
                    if bytes.get(idx + 1) == Some(&b'\'') {
                        idx += 1; // skip escaped quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::DoubleQuoted => {
                if b == b'"' {
                    if bytes.get(idx + 1) == Some(&b'"') {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::BacktickQuoted => {
                if b == b'`' {
                    if bytes.get(idx + 1) == Some(&b'`') {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if block_comment_opens_at(bytes, idx) {
                    state = State::BlockComment(depth + 1);
                    idx += 1;
                } else if block_comment_closes_at(bytes, idx) {
                    idx += 1;
                    state = if depth == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(depth - 1)
                    };
                }
            }
            State::DollarQuoted(ref tag) => {
                if b == b'$' && dollar_tag_closes_at(bytes, idx, tag) {
                    let tag_len = tag.len();
                    state = State::Normal;
                    idx += tag_len + 1;
                }
            }
        }
        idx += 1;
    }

    positions
}

/// Renumber bare `?` markers as `$1, $2, ...` or `?1, ?2, ...`.
///
/// Returns a borrowed `Cow` when the statement has no bare markers.
#[must_use]
pub fn number_placeholders(sql: &str, style: PlaceholderStyle) -> Cow<'_, str> {
    let positions = placeholder_positions(sql, false);
    if positions.is_empty() {
        return Cow::Borrowed(sql);
    }

    let prefix = match style {
        PlaceholderStyle::Postgres => '$',
        PlaceholderStyle::Sqlite => '?',
    };
    splice(sql, &positions, |n| format!("{prefix}{}", n + 1)).into()
}

/// Replace bare `?` markers with the dialect-escaped literal of each binding, in order.
///
/// # Errors
/// Returns `SqlDispatchError::MalformedStatementSpec` when the number of markers
/// and bindings differ.
pub fn inline_bindings(
    sql: &str,
    bindings: &[RowValues],
    profile: &dyn DialectProfile,
) -> Result<String, SqlDispatchError> {
    let backslash_escapes = matches!(profile.dialect(), Dialect::Mysql | Dialect::Mariadb);
    let positions = placeholder_positions(sql, backslash_escapes);
    if positions.len() != bindings.len() {
        return Err(SqlDispatchError::malformed(format!(
            "statement has {} binding markers but {} values were supplied",
            positions.len(),
            bindings.len()
        )));
    }
    if positions.is_empty() {
        return Ok(sql.to_string());
    }
    Ok(splice(sql, &positions, |n| escape_literal(&bindings[n], profile)))
}

fn splice<F>(sql: &str, positions: &[usize], mut replacement: F) -> String
where
    F: FnMut(usize) -> String,
{
    let mut out = String::with_capacity(sql.len() + positions.len() * 4);
    let mut last = 0;
    for (n, &pos) in positions.iter().enumerate() {
        out.push_str(&sql[last..pos]);
        out.push_str(&replacement(n));
        last = pos + 1;
    }
    out.push_str(&sql[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::profile;

    #[test]
    fn numbers_for_postgres() {
        let sql = "select * from t where a = ? and b = ?";
        let res = number_placeholders(sql, PlaceholderStyle::Postgres);
        assert_eq!(res, "select * from t where a = $1 and b = $2");
    }

    #[test]
    fn numbers_for_sqlite() {
        let res = number_placeholders("insert into t values(?, ?)", PlaceholderStyle::Sqlite);
        assert_eq!(res, "insert into t values(?1, ?2)");
    }

    #[test]
    fn skips_inside_literals_and_comments() {
        let sql = "select '?', `a?` -- ?\n/* ? */ from t where a = ?";
        let res = number_placeholders(sql, PlaceholderStyle::Postgres);
        assert_eq!(res, "select '?', `a?` -- ?\n/* ? */ from t where a = $1");
    }

    #[test]
    fn skips_dollar_quoted_blocks() {
        let sql = "$foo$ select ? from t $foo$ where a = ?";
        let res = number_placeholders(sql, PlaceholderStyle::Sqlite);
        assert_eq!(res, "$foo$ select ? from t $foo$ where a = ?1");
    }

    #[test]
    fn leaves_numbered_markers_alone() {
        let sql = "select * from t where a = ?1";
        assert!(matches!(
            number_placeholders(sql, PlaceholderStyle::Postgres),
            Cow::Borrowed(_)
        ));
    }

    #[test]
    fn inlines_escaped_literals() {
        let sql = "`name` = ? AND `flag` = ? AND note = '?'";
        let out = inline_bindings(
            sql,
            &[RowValues::Text("it's".into()), RowValues::Int(3)],
            profile(Dialect::Sqlite),
        )
        .unwrap();
        assert_eq!(out, "`name` = 'it''s' AND `flag` = 3 AND note = '?'");
    }

    #[test]
    fn mysql_backslash_escapes_do_not_end_strings() {
        let sql = "a = 'x\\'?' AND b = ?";
        assert_eq!(placeholder_positions(sql, true).len(), 1);
    }

    #[test]
    fn binding_count_mismatch_is_an_error() {
        let err = inline_bindings("a = ? AND b = ?", &[RowValues::Int(1)], profile(Dialect::Postgres))
            .unwrap_err();
        assert!(matches!(err, SqlDispatchError::MalformedStatementSpec(_)));
    }

    #[test]
    fn preserves_multibyte_text() {
        let out = inline_bindings("'héllo' || ?", &[RowValues::Text("wörld".into())], profile(Dialect::Postgres))
            .unwrap();
        assert_eq!(out, "'héllo' || 'wörld'");
    }
}
