use super::cursor::{ByteCursor, CursorResult};
use crate::models::record::ImageDimensions;

pub const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];

/// Baseline start-of-frame. Progressive frames (`FF C2`) are not matched.
pub const JPEG_SOF0: [u8; 2] = [0xFF, 0xC0];

const SCAN_START: usize = 2;
const SOF_HEIGHT_OFFSET: usize = 5;
const SOF_WIDTH_OFFSET: usize = 7;

/// Width/height from the first baseline SOF marker.
///
/// Returns `Ok(None)` when the buffer does not start with SOI or holds no
/// `FF C0` pair. A marker whose dimension fields run past the end of the
/// buffer is reported as `Err`.
pub fn dimensions(cursor: &ByteCursor<'_>) -> CursorResult<Option<ImageDimensions>> {
    if !cursor.starts_with(&JPEG_SOI) {
        return Ok(None);
    }

    let Some(sof) = cursor.find_from(SCAN_START, &JPEG_SOF0) else {
        return Ok(None);
    };

    let height = cursor.be_u16_at(sof + SOF_HEIGHT_OFFSET)?;
    let width = cursor.be_u16_at(sof + SOF_WIDTH_OFFSET)?;
    Ok(Some(ImageDimensions {
        width: u32::from(width),
        height: u32::from(height),
    }))
}
