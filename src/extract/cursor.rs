//! Bounds-checked random access over an untrusted byte buffer.
//!
//! Every decoder reads through `ByteCursor` so that a truncated or hostile
//! upload can only ever produce `CursorError::OutOfRange`, never a panic.

use memchr::memmem;
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CursorError {
    #[error("read of {width} byte(s) at offset {offset} exceeds buffer of {len} bytes")]
    OutOfRange {
        offset: usize,
        width: usize,
        len: usize,
    },
}

pub type CursorResult<T> = Result<T, CursorError>;

/// Read-only view over a byte buffer with checked fixed-width reads.
#[derive(Debug, Clone, Copy)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    pub fn starts_with(&self, prefix: &[u8]) -> bool {
        self.data.starts_with(prefix)
    }

    pub fn byte_at(&self, offset: usize) -> CursorResult<u8> {
        self.data
            .get(offset)
            .copied()
            .ok_or_else(|| self.out_of_range(offset, 1))
    }

    pub fn be_u16_at(&self, offset: usize) -> CursorResult<u16> {
        self.array_at::<2>(offset).map(u16::from_be_bytes)
    }

    pub fn be_u32_at(&self, offset: usize) -> CursorResult<u32> {
        self.array_at::<4>(offset).map(u32::from_be_bytes)
    }

    /// Start offsets of every non-overlapping occurrence of `marker`, in order.
    ///
    /// The iterator borrows the buffer and is consumed once; call again to rescan.
    /// An empty marker never matches.
    pub fn find_all<'m>(&self, marker: &'m [u8]) -> impl Iterator<Item = usize> + use<'a, 'm> {
        (!marker.is_empty())
            .then(|| memmem::find_iter(self.data, marker))
            .into_iter()
            .flatten()
    }

    /// First occurrence of `marker` at or after `start`.
    pub fn find_from(&self, start: usize, marker: &[u8]) -> Option<usize> {
        if marker.is_empty() {
            return None;
        }
        let tail = self.data.get(start..)?;
        memmem::find(tail, marker).map(|pos| start + pos)
    }

    fn array_at<const N: usize>(&self, offset: usize) -> CursorResult<[u8; N]> {
        let end = offset
            .checked_add(N)
            .ok_or_else(|| self.out_of_range(offset, N))?;
        self.data
            .get(offset..end)
            .and_then(|slice| <[u8; N]>::try_from(slice).ok())
            .ok_or_else(|| self.out_of_range(offset, N))
    }

    fn out_of_range(&self, offset: usize, width: usize) -> CursorError {
        CursorError::OutOfRange {
            offset,
            width,
            len: self.data.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_at_rejects_offset_at_length() {
        let cursor = ByteCursor::new(&[1, 2, 3]);
        assert_eq!(cursor.byte_at(2), Ok(3));
        assert_eq!(
            cursor.byte_at(3),
            Err(CursorError::OutOfRange {
                offset: 3,
                width: 1,
                len: 3
            })
        );
    }

    #[test]
    fn big_endian_reads() {
        let cursor = ByteCursor::new(&[0x12, 0x34, 0x56, 0x78, 0x9A]);
        assert_eq!(cursor.be_u16_at(0), Ok(0x1234));
        assert_eq!(cursor.be_u16_at(3), Ok(0x789A));
        assert_eq!(cursor.be_u32_at(1), Ok(0x3456_789A));
    }

    #[test]
    fn reads_crossing_the_end_fail() {
        let cursor = ByteCursor::new(&[0u8; 5]);
        assert!(cursor.be_u16_at(4).is_err());
        assert!(cursor.be_u32_at(2).is_err());
        assert!(cursor.be_u32_at(usize::MAX - 1).is_err());
    }

    #[test]
    fn find_all_is_non_overlapping_and_ordered() {
        let cursor = ByteCursor::new(b"aaaa-aa");
        let hits: Vec<usize> = cursor.find_all(b"aa").collect();
        assert_eq!(hits, vec![0, 2, 5]);

        // recomputed on every call
        assert_eq!(cursor.find_all(b"aa").count(), 3);
    }

    #[test]
    fn find_all_with_empty_marker_yields_nothing() {
        let cursor = ByteCursor::new(b"abc");
        assert_eq!(cursor.find_all(b"").count(), 0);
    }

    #[test]
    fn find_from_respects_start() {
        let cursor = ByteCursor::new(&[0xFF, 0xC0, 0x00, 0xFF, 0xC0]);
        assert_eq!(cursor.find_from(0, &[0xFF, 0xC0]), Some(0));
        assert_eq!(cursor.find_from(1, &[0xFF, 0xC0]), Some(3));
        assert_eq!(cursor.find_from(4, &[0xFF, 0xC0]), None);
        assert_eq!(cursor.find_from(99, &[0xFF, 0xC0]), None);
    }
}
