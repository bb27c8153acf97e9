use super::cursor::{ByteCursor, CursorResult};
use crate::models::record::ImageDimensions;

/// Leading bytes checked for recognition. The trailing `0D 0A 1A 0A` of the
/// full 8-byte signature is not verified.
pub const PNG_SIGNATURE_PREFIX: [u8; 4] = [0x89, 0x50, 0x4E, 0x47];

/// IHDR width/height are read at fixed offsets, assuming the chunk
/// length+type occupy bytes 8..16.
const IHDR_WIDTH_OFFSET: usize = 16;
const IHDR_HEIGHT_OFFSET: usize = 20;
const MIN_HEADER_LEN: usize = 24;

/// Width/height from the IHDR chunk, or `None` when the buffer is not a PNG
/// or too short to hold the IHDR fields.
pub fn dimensions(cursor: &ByteCursor<'_>) -> CursorResult<Option<ImageDimensions>> {
    if !cursor.starts_with(&PNG_SIGNATURE_PREFIX) || cursor.len() < MIN_HEADER_LEN {
        return Ok(None);
    }

    let width = cursor.be_u32_at(IHDR_WIDTH_OFFSET)?;
    let height = cursor.be_u32_at(IHDR_HEIGHT_OFFSET)?;
    Ok(Some(ImageDimensions { width, height }))
}
