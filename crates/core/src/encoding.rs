//! Bounds-checked byte cursors
//!
//! All multi-byte integers are big-endian on the wire so files are portable
//! across hosts. Every field access checks the remaining length on its own
//! and reports the field name, so a corrupt or truncated buffer fails at the
//! first bad field instead of silently misreading the ones after it.

use byteorder::{BigEndian, ByteOrder};

use crate::error::EncodingError;

/// Write cursor over a fixed-size buffer
#[derive(Debug)]
pub struct WriteCursor<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> WriteCursor<'a> {
    /// Create a cursor positioned at the start of `buf`
    pub fn new(buf: &'a mut [u8]) -> Self {
        WriteCursor { buf, pos: 0 }
    }

    /// Current write position
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left before the end of the buffer
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Bytes written so far
    pub fn written(&self) -> &[u8] {
        &self.buf[..self.pos]
    }

    fn reserve(&mut self, field: &'static str, len: usize) -> Result<&mut [u8], EncodingError> {
        if self.remaining() < len {
            return Err(EncodingError::NotEnoughRoom {
                field,
                required: len,
                available: self.remaining(),
            });
        }
        let start = self.pos;
        self.pos += len;
        Ok(&mut self.buf[start..start + len])
    }

    /// Write a single byte
    pub fn put_u8(&mut self, field: &'static str, value: u8) -> Result<(), EncodingError> {
        self.reserve(field, 1)?[0] = value;
        Ok(())
    }

    /// Write a big-endian u32
    pub fn put_u32(&mut self, field: &'static str, value: u32) -> Result<(), EncodingError> {
        BigEndian::write_u32(self.reserve(field, 4)?, value);
        Ok(())
    }

    /// Write a big-endian u64
    pub fn put_u64(&mut self, field: &'static str, value: u64) -> Result<(), EncodingError> {
        BigEndian::write_u64(self.reserve(field, 8)?, value);
        Ok(())
    }

    /// Write a big-endian i64
    pub fn put_i64(&mut self, field: &'static str, value: i64) -> Result<(), EncodingError> {
        BigEndian::write_i64(self.reserve(field, 8)?, value);
        Ok(())
    }

    /// Write a big-endian IEEE-754 double
    pub fn put_f64(&mut self, field: &'static str, value: f64) -> Result<(), EncodingError> {
        BigEndian::write_f64(self.reserve(field, 8)?, value);
        Ok(())
    }

    /// Write raw bytes
    pub fn put_bytes(&mut self, field: &'static str, bytes: &[u8]) -> Result<(), EncodingError> {
        self.reserve(field, bytes.len())?.copy_from_slice(bytes);
        Ok(())
    }

    /// Write a string into a fixed-width, nul-padded field
    ///
    /// The string is truncated so that at least one terminating nul fits.
    pub fn put_fixed_str(
        &mut self,
        field: &'static str,
        value: &str,
        width: usize,
    ) -> Result<(), EncodingError> {
        let slot = self.reserve(field, width)?;
        slot.fill(0);
        let mut len = value.len().min(width.saturating_sub(1));
        // Never split a multi-byte character
        while !value.is_char_boundary(len) {
            len -= 1;
        }
        slot[..len].copy_from_slice(&value.as_bytes()[..len]);
        Ok(())
    }
}

/// Read cursor over a byte slice
#[derive(Debug, Clone)]
pub struct ReadCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ReadCursor<'a> {
    /// Create a cursor positioned at the start of `buf`
    pub fn new(buf: &'a [u8]) -> Self {
        ReadCursor { buf, pos: 0 }
    }

    /// Current read position
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// True once every byte has been consumed
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Advance past `len` bytes without decoding them
    pub fn skip(&mut self, field: &'static str, len: usize) -> Result<(), EncodingError> {
        self.take(field, len).map(|_| ())
    }

    fn take(&mut self, field: &'static str, len: usize) -> Result<&'a [u8], EncodingError> {
        if self.remaining() < len {
            return Err(EncodingError::NotEnoughRoom {
                field,
                required: len,
                available: self.remaining(),
            });
        }
        let start = self.pos;
        self.pos += len;
        Ok(&self.buf[start..start + len])
    }

    /// Read a single byte
    pub fn get_u8(&mut self, field: &'static str) -> Result<u8, EncodingError> {
        Ok(self.take(field, 1)?[0])
    }

    /// Read a big-endian u32
    pub fn get_u32(&mut self, field: &'static str) -> Result<u32, EncodingError> {
        Ok(BigEndian::read_u32(self.take(field, 4)?))
    }

    /// Read a big-endian u64
    pub fn get_u64(&mut self, field: &'static str) -> Result<u64, EncodingError> {
        Ok(BigEndian::read_u64(self.take(field, 8)?))
    }

    /// Read a big-endian i64
    pub fn get_i64(&mut self, field: &'static str) -> Result<i64, EncodingError> {
        Ok(BigEndian::read_i64(self.take(field, 8)?))
    }

    /// Read a big-endian IEEE-754 double
    pub fn get_f64(&mut self, field: &'static str) -> Result<f64, EncodingError> {
        Ok(BigEndian::read_f64(self.take(field, 8)?))
    }

    /// Borrow `len` raw bytes
    pub fn get_bytes(&mut self, field: &'static str, len: usize) -> Result<&'a [u8], EncodingError> {
        self.take(field, len)
    }

    /// Read a fixed-width array
    pub fn get_array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], EncodingError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(field, N)?);
        Ok(out)
    }

    /// Read a fixed-width, nul-padded string field
    ///
    /// Everything after the first nul is ignored.
    pub fn get_fixed_str(&mut self, field: &'static str, width: usize) -> Result<String, EncodingError> {
        let raw = self.take(field, width)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        std::str::from_utf8(&raw[..end])
            .map(str::to_owned)
            .map_err(|_| EncodingError::InvalidUtf8 { field })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integers_are_big_endian() {
        let mut buf = [0u8; 12];
        let mut cursor = WriteCursor::new(&mut buf);
        cursor.put_u32("a", 0x0102_0304).unwrap();
        cursor.put_u64("b", 0x0506_0708_090A_0B0C).unwrap();
        assert_eq!(cursor.position(), 12);
        assert_eq!(buf, [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
    }

    #[test]
    fn test_write_reports_field_and_sizes() {
        let mut buf = [0u8; 6];
        let mut cursor = WriteCursor::new(&mut buf);
        cursor.put_u32("first", 1).unwrap();
        let err = cursor.put_u64("second", 2).unwrap_err();
        assert_eq!(
            err,
            EncodingError::NotEnoughRoom {
                field: "second",
                required: 8,
                available: 2
            }
        );
        // A failed write does not advance the cursor
        assert_eq!(cursor.position(), 4);
    }

    #[test]
    fn test_read_reports_field_and_sizes() {
        let buf = [0u8; 3];
        let mut cursor = ReadCursor::new(&buf);
        let err = cursor.get_u32("type").unwrap_err();
        assert_eq!(
            err,
            EncodingError::NotEnoughRoom {
                field: "type",
                required: 4,
                available: 3
            }
        );
    }

    #[test]
    fn test_fixed_str_truncates_and_pads() {
        let mut buf = [0xFFu8; 8];
        let mut cursor = WriteCursor::new(&mut buf);
        cursor.put_fixed_str("name", "abcdefghij", 8).unwrap();
        assert_eq!(&buf, b"abcdefg\0");

        let mut reader = ReadCursor::new(&buf);
        assert_eq!(reader.get_fixed_str("name", 8).unwrap(), "abcdefg");
    }

    #[test]
    fn test_fixed_str_truncates_on_char_boundary() {
        // 'é' is two bytes; 7 usable bytes end mid-character
        let mut buf = [0xFFu8; 8];
        let mut cursor = WriteCursor::new(&mut buf);
        cursor.put_fixed_str("name", &"é".repeat(5), 8).unwrap();
        assert_eq!(&buf[6..], b"\0\0");

        let mut reader = ReadCursor::new(&buf);
        assert_eq!(reader.get_fixed_str("name", 8).unwrap(), "ééé");
    }

    #[test]
    fn test_fixed_str_ignores_trailing_garbage() {
        let buf = *b"ab\0zzzzz";
        let mut reader = ReadCursor::new(&buf);
        assert_eq!(reader.get_fixed_str("name", 8).unwrap(), "ab");
        assert!(reader.is_empty());
    }

    #[test]
    fn test_skip_and_doubles() {
        let mut buf = [0u8; 16];
        {
            let mut cursor = WriteCursor::new(&mut buf);
            cursor.put_u64("pad", 0).unwrap();
            cursor.put_f64("value", -2.5).unwrap();
        }
        let mut reader = ReadCursor::new(&buf);
        reader.skip("pad", 8).unwrap();
        assert_eq!(reader.get_f64("value").unwrap(), -2.5);
        assert!(reader.skip("past-end", 1).is_err());
    }
}
