use super::cursor::ByteCursor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextStats {
    /// Characters in the decoded text, whitespace included.
    pub length: i64,
    /// Maximal runs of non-whitespace characters.
    pub word_count: i64,
}

/// Decode as UTF-8 (invalid sequences become U+FFFD) and count characters and words.
pub fn analyze(cursor: &ByteCursor<'_>) -> TextStats {
    let text = String::from_utf8_lossy(cursor.as_bytes());
    TextStats {
        // Unicode scalar values; an astral character such as an emoji counts once.
        length: text.chars().count() as i64,
        word_count: text.split_whitespace().count() as i64,
    }
}
