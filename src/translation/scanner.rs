/// Lexical region the scanner is in.
#[derive(Clone)]
pub(super) enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    BacktickQuoted,
    LineComment,
    /// Nesting depth; PostgreSQL allows nested block comments.
    BlockComment(u32),
    DollarQuoted(String),
}

fn at(bytes: &[u8], idx: usize, token: &[u8]) -> bool {
    bytes.get(idx..).is_some_and(|rest| rest.starts_with(token))
}

pub(super) fn line_comment_at(bytes: &[u8], idx: usize) -> bool {
    at(bytes, idx, b"--")
}

pub(super) fn block_comment_opens_at(bytes: &[u8], idx: usize) -> bool {
    at(bytes, idx, b"/*")
}

pub(super) fn block_comment_closes_at(bytes: &[u8], idx: usize) -> bool {
    at(bytes, idx, b"*/")
}

/// Parse a `$tag$` opener at `start`. Returns the tag and the index of its
/// closing `$`.
pub(super) fn dollar_tag_at(bytes: &[u8], start: usize) -> Option<(String, usize)> {
    let rest = bytes.get(start + 1..)?;
    let len = rest.iter().position(|b| *b == b'$')?;
    let tag = &rest[..len];
    if !tag.iter().all(|b| b.is_ascii_alphanumeric() || *b == b'_') {
        return None;
    }
    let tag = std::str::from_utf8(tag).ok()?.to_string();
    Some((tag, start + 1 + len))
}

/// True when `$tag$` closes at `idx`.
pub(super) fn dollar_tag_closes_at(bytes: &[u8], idx: usize, tag: &str) -> bool {
    at(bytes, idx + 1, tag.as_bytes()) && bytes.get(idx + 1 + tag.len()) == Some(&b'$')
}

/// True when the bytes after `idx` start a numbered placeholder (`?1`), which
/// is already positional and must not be renumbered.
pub(super) fn followed_by_digit(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx + 1).is_some_and(u8::is_ascii_digit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dollar_tags_open_and_close() {
        let sql = b"$body$ x ? $body$";
        assert_eq!(dollar_tag_at(sql, 0), Some(("body".to_string(), 5)));
        assert!(dollar_tag_closes_at(sql, 11, "body"));
        assert!(!dollar_tag_closes_at(sql, 11, "bod"));
        assert_eq!(dollar_tag_at(b"$1 + $2", 0), None);
        assert_eq!(dollar_tag_at(b"$$", 0), Some((String::new(), 1)));
    }
}
