use super::cursor::ByteCursor;

pub const PDF_EOF_MARKER: &[u8; 5] = b"%%EOF";

/// Approximate page count: the number of `%%EOF` trailers in the file.
///
/// Incrementally updated PDFs carry one trailer per revision and overcount;
/// files with no trailer yield `None`.
pub fn estimate_pages(cursor: &ByteCursor<'_>) -> Option<i64> {
    let count = cursor.find_all(PDF_EOF_MARKER).count();
    (count > 0).then_some(count as i64)
}
