//! Knowledge records
//!
//! A [`KnowledgeRecord`] is a value cell plus the metadata the context uses to
//! arbitrate concurrent updates: quality, write quality, Lamport clock and
//! time-of-interest.
//!
//! # Binary Format
//!
//! ```text
//! key_len(u32, incl. nul) | key bytes | 0x00 | type(u32) | size(u32)
//! | value bytes | clock(u64) | toi(u64) | quality(u32)
//! ```
//!
//! All integers are big-endian. `size` is the element count for numbers and
//! arrays and the byte count for string and blob variants (strings include
//! their nul terminator). `write_quality` is a local setting and is not
//! persisted.

use std::path::Path;

use crate::encoding::{ReadCursor, WriteCursor};
use crate::error::{EncodingError, Result};
use crate::value::{type_tags, KnowledgeValue};

/// Encoded size of the fixed per-record fields (key_len, type, size, clock, toi, quality)
const FIXED_FIELDS_SIZE: usize = 4 + 4 + 4 + 8 + 8 + 4;

/// A value cell with versioning metadata
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KnowledgeRecord {
    /// Current value
    pub value: KnowledgeValue,
    /// Quality of the last accepted write
    pub quality: u32,
    /// Quality this process asserts when writing locally
    pub write_quality: u32,
    /// Lamport clock of the last update
    pub clock: u64,
    /// Time of interest: wall-clock nanoseconds of the last update
    pub toi: u64,
}

impl KnowledgeRecord {
    /// Create a record holding `value` with zeroed metadata
    pub fn new(value: impl Into<KnowledgeValue>) -> Self {
        KnowledgeRecord {
            value: value.into(),
            ..Default::default()
        }
    }

    /// Set the quality
    pub fn with_quality(mut self, quality: u32) -> Self {
        self.quality = quality;
        self
    }

    /// Set the Lamport clock
    pub fn with_clock(mut self, clock: u64) -> Self {
        self.clock = clock;
        self
    }

    /// Set the time of interest
    pub fn with_toi(mut self, toi: u64) -> Self {
        self.toi = toi;
        self
    }

    /// True if a value has ever been assigned
    pub fn exists(&self) -> bool {
        self.value.exists()
    }

    /// Replace the value, dropping the previous payload
    pub fn set_value(&mut self, value: impl Into<KnowledgeValue>) {
        self.value = value.into();
    }

    /// Reset value and metadata to the uncreated state
    pub fn reset(&mut self) {
        *self = KnowledgeRecord::default();
    }

    /// Exact number of bytes [`write`](Self::write) will produce for `key`
    pub fn encoded_size(&self, key: &str) -> usize {
        FIXED_FIELDS_SIZE + key.len() + 1 + self.value_encoded_size()
    }

    fn value_encoded_size(&self) -> usize {
        match &self.value {
            KnowledgeValue::Empty => 0,
            KnowledgeValue::Integer(_) | KnowledgeValue::Double(_) => 8,
            KnowledgeValue::String(s) | KnowledgeValue::Xml(s) | KnowledgeValue::TextFile(s) => {
                s.len() + 1
            }
            KnowledgeValue::ImageJpeg(b) | KnowledgeValue::UnknownFile(b) => b.len(),
            KnowledgeValue::IntegerArray(v) => v.len() * 8,
            KnowledgeValue::DoubleArray(v) => v.len() * 8,
        }
    }

    /// Encode `key` and this record at the cursor
    ///
    /// Returns the new cursor position. Every field is bounds checked on its
    /// own; the first one that does not fit fails with
    /// [`EncodingError::NotEnoughRoom`].
    pub fn write(&self, cursor: &mut WriteCursor<'_>, key: &str) -> std::result::Result<usize, EncodingError> {
        cursor.put_u32("record.key_len", (key.len() + 1) as u32)?;
        cursor.put_bytes("record.key", key.as_bytes())?;
        cursor.put_u8("record.key_nul", 0)?;
        cursor.put_u32("record.type", self.value.type_tag())?;
        cursor.put_u32("record.size", self.value.size() as u32)?;

        match &self.value {
            KnowledgeValue::Empty => {}
            KnowledgeValue::Integer(i) => cursor.put_i64("record.value", *i)?,
            KnowledgeValue::Double(d) => cursor.put_f64("record.value", *d)?,
            KnowledgeValue::String(s) | KnowledgeValue::Xml(s) | KnowledgeValue::TextFile(s) => {
                cursor.put_bytes("record.value", s.as_bytes())?;
                cursor.put_u8("record.value_nul", 0)?;
            }
            KnowledgeValue::ImageJpeg(b) | KnowledgeValue::UnknownFile(b) => {
                cursor.put_bytes("record.value", b)?
            }
            KnowledgeValue::IntegerArray(v) => {
                for i in v {
                    cursor.put_i64("record.value", *i)?;
                }
            }
            KnowledgeValue::DoubleArray(v) => {
                for d in v {
                    cursor.put_f64("record.value", *d)?;
                }
            }
        }

        cursor.put_u64("record.clock", self.clock)?;
        cursor.put_u64("record.toi", self.toi)?;
        cursor.put_u32("record.quality", self.quality)?;
        Ok(cursor.position())
    }

    /// Decode one `(key, record)` pair from the cursor
    pub fn read(cursor: &mut ReadCursor<'_>) -> std::result::Result<(String, KnowledgeRecord), EncodingError> {
        let key_len = cursor.get_u32("record.key_len")? as usize;
        let key_bytes = cursor.get_bytes("record.key", key_len)?;
        let key = decode_str(key_bytes, "record.key")?;

        let tag = cursor.get_u32("record.type")?;
        let size = cursor.get_u32("record.size")? as usize;

        let value = match tag {
            type_tags::EMPTY => KnowledgeValue::Empty,
            type_tags::INTEGER => {
                expect_scalar(size)?;
                KnowledgeValue::Integer(cursor.get_i64("record.value")?)
            }
            type_tags::DOUBLE => {
                expect_scalar(size)?;
                KnowledgeValue::Double(cursor.get_f64("record.value")?)
            }
            type_tags::STRING | type_tags::XML | type_tags::TEXT_FILE => {
                let s = decode_str(cursor.get_bytes("record.value", size)?, "record.value")?;
                match tag {
                    type_tags::STRING => KnowledgeValue::String(s),
                    type_tags::XML => KnowledgeValue::Xml(s),
                    _ => KnowledgeValue::TextFile(s),
                }
            }
            type_tags::IMAGE_JPEG => {
                KnowledgeValue::ImageJpeg(cursor.get_bytes("record.value", size)?.to_vec())
            }
            type_tags::UNKNOWN_FILE_TYPE => {
                KnowledgeValue::UnknownFile(cursor.get_bytes("record.value", size)?.to_vec())
            }
            type_tags::INTEGER_ARRAY => {
                array_bytes(size, cursor)?;
                let mut values = Vec::with_capacity(size);
                for _ in 0..size {
                    values.push(cursor.get_i64("record.value")?);
                }
                KnowledgeValue::IntegerArray(values)
            }
            type_tags::DOUBLE_ARRAY => {
                array_bytes(size, cursor)?;
                let mut values = Vec::with_capacity(size);
                for _ in 0..size {
                    values.push(cursor.get_f64("record.value")?);
                }
                KnowledgeValue::DoubleArray(values)
            }
            other => return Err(EncodingError::UnknownType(other)),
        };

        let clock = cursor.get_u64("record.clock")?;
        let toi = cursor.get_u64("record.toi")?;
        let quality = cursor.get_u32("record.quality")?;

        Ok((
            key,
            KnowledgeRecord {
                value,
                quality,
                write_quality: 0,
                clock,
                toi,
            },
        ))
    }

    /// Load a file into a new record
    ///
    /// The variant is picked from the extension: `.jpg`/`.jpeg` become
    /// JPEG images, `.txt` text files, `.xml` XML, anything else an opaque
    /// binary file.
    pub fn read_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        let value = match extension.as_deref() {
            Some("jpg") | Some("jpeg") => KnowledgeValue::ImageJpeg(bytes),
            Some("txt") => KnowledgeValue::TextFile(lossless_utf8(bytes)?),
            Some("xml") => KnowledgeValue::Xml(lossless_utf8(bytes)?),
            _ => KnowledgeValue::UnknownFile(bytes),
        };
        Ok(KnowledgeRecord::new(value))
    }

    /// Write the value to a file
    ///
    /// Strings are written without their terminator, numbers and arrays as
    /// their display form. Returns the number of bytes written.
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let bytes: Vec<u8> = match &self.value {
            KnowledgeValue::ImageJpeg(b) | KnowledgeValue::UnknownFile(b) => b.clone(),
            KnowledgeValue::String(s) | KnowledgeValue::Xml(s) | KnowledgeValue::TextFile(s) => {
                s.as_bytes().to_vec()
            }
            other => other.to_string().into_bytes(),
        };
        std::fs::write(path, &bytes)?;
        Ok(bytes.len())
    }
}

fn expect_scalar(size: usize) -> std::result::Result<(), EncodingError> {
    if size != 1 {
        return Err(EncodingError::InvalidSize {
            field: "record.size",
            size: size as u64,
        });
    }
    Ok(())
}

// Reject element counts whose byte length overflows or cannot be present
fn array_bytes(size: usize, cursor: &ReadCursor<'_>) -> std::result::Result<(), EncodingError> {
    let bytes = size.checked_mul(8).ok_or(EncodingError::InvalidSize {
        field: "record.size",
        size: size as u64,
    })?;
    if bytes > cursor.remaining() {
        return Err(EncodingError::NotEnoughRoom {
            field: "record.value",
            required: bytes,
            available: cursor.remaining(),
        });
    }
    Ok(())
}

fn decode_str(bytes: &[u8], field: &'static str) -> std::result::Result<String, EncodingError> {
    let trimmed = match bytes.split_last() {
        Some((0, rest)) => rest,
        _ => bytes,
    };
    std::str::from_utf8(trimmed)
        .map(str::to_owned)
        .map_err(|_| EncodingError::InvalidUtf8 { field })
}

fn lossless_utf8(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|_| EncodingError::InvalidUtf8 { field: "file" }.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(key: &str, record: &KnowledgeRecord) -> (String, KnowledgeRecord) {
        let mut buf = vec![0u8; record.encoded_size(key)];
        let end = {
            let mut cursor = WriteCursor::new(&mut buf);
            record.write(&mut cursor, key).unwrap()
        };
        assert_eq!(end, buf.len(), "encoded_size must be exact");

        let mut reader = ReadCursor::new(&buf);
        let decoded = KnowledgeRecord::read(&mut reader).unwrap();
        assert!(reader.is_empty());
        decoded
    }

    #[test]
    fn test_roundtrip_every_variant() {
        let values = vec![
            KnowledgeValue::Empty,
            KnowledgeValue::Integer(-15),
            KnowledgeValue::Double(3.14159),
            KnowledgeValue::String("some string".into()),
            KnowledgeValue::Xml("<a>b</a>".into()),
            KnowledgeValue::TextFile("line one\nline two".into()),
            KnowledgeValue::ImageJpeg(vec![0xFF, 0xD8, 0x00, 0xFF, 0xD9]),
            KnowledgeValue::UnknownFile((0..=255).collect()),
            KnowledgeValue::IntegerArray(vec![10, 20, 30]),
            KnowledgeValue::DoubleArray(vec![10.1, 20.2, 30.3, 40.4]),
        ];

        for (i, value) in values.into_iter().enumerate() {
            let record = KnowledgeRecord::new(value)
                .with_quality(i as u32 + 1)
                .with_clock(1000 + i as u64)
                .with_toi(1_700_000_000_000_000_000 + i as u64);
            let (key, decoded) = roundtrip("var.name", &record);
            assert_eq!(key, "var.name");
            assert_eq!(decoded, record);
        }
    }

    #[test]
    fn test_write_quality_not_persisted() {
        let mut record = KnowledgeRecord::new(7i64);
        record.write_quality = 9;
        let (_, decoded) = roundtrip("k", &record);
        assert_eq!(decoded.write_quality, 0);
        assert_eq!(decoded.value, KnowledgeValue::Integer(7));
    }

    #[test]
    fn test_empty_key_roundtrip() {
        let record = KnowledgeRecord::new("v");
        let (key, decoded) = roundtrip("", &record);
        assert_eq!(key, "");
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_write_fails_at_each_field_boundary() {
        let record = KnowledgeRecord::new(vec![1i64, 2, 3]).with_clock(4);
        let full = record.encoded_size("key");

        for len in 0..full {
            let mut buf = vec![0u8; len];
            let mut cursor = WriteCursor::new(&mut buf);
            let err = record.write(&mut cursor, "key").unwrap_err();
            assert!(err.is_memory(), "len {} should be a memory error", len);
        }
    }

    #[test]
    fn test_read_truncated_reports_field() {
        let record = KnowledgeRecord::new("hello").with_quality(2);
        let mut buf = vec![0u8; record.encoded_size("k")];
        record.write(&mut WriteCursor::new(&mut buf), "k").unwrap();

        // Drop the trailing quality field
        let truncated = &buf[..buf.len() - 2];
        let err = KnowledgeRecord::read(&mut ReadCursor::new(truncated)).unwrap_err();
        assert_eq!(
            err,
            EncodingError::NotEnoughRoom {
                field: "record.quality",
                required: 4,
                available: 2
            }
        );
    }

    #[test]
    fn test_read_unknown_type() {
        let mut buf = vec![0u8; 64];
        {
            let mut cursor = WriteCursor::new(&mut buf);
            cursor.put_u32("key_len", 2).unwrap();
            cursor.put_bytes("key", b"k\0").unwrap();
            cursor.put_u32("type", 3).unwrap();
            cursor.put_u32("size", 0).unwrap();
        }
        let err = KnowledgeRecord::read(&mut ReadCursor::new(&buf)).unwrap_err();
        assert_eq!(err, EncodingError::UnknownType(3));
    }

    #[test]
    fn test_read_rejects_oversized_array() {
        let mut buf = vec![0u8; 64];
        {
            let mut cursor = WriteCursor::new(&mut buf);
            cursor.put_u32("key_len", 2).unwrap();
            cursor.put_bytes("key", b"k\0").unwrap();
            cursor.put_u32("type", type_tags::DOUBLE_ARRAY).unwrap();
            cursor.put_u32("size", u32::MAX).unwrap();
        }
        let err = KnowledgeRecord::read(&mut ReadCursor::new(&buf)).unwrap_err();
        assert!(err.is_memory());
    }

    #[test]
    fn test_read_file_picks_variant_from_extension() {
        let dir = tempfile::tempdir().unwrap();

        let jpg = dir.path().join("image.JPG");
        std::fs::write(&jpg, [0xFF, 0xD8, 0xFF]).unwrap();
        let record = KnowledgeRecord::read_file(&jpg).unwrap();
        assert!(matches!(record.value, KnowledgeValue::ImageJpeg(ref b) if b.len() == 3));

        let txt = dir.path().join("notes.txt");
        std::fs::write(&txt, "hello").unwrap();
        let record = KnowledgeRecord::read_file(&txt).unwrap();
        assert_eq!(record.value, KnowledgeValue::TextFile("hello".into()));

        let bin = dir.path().join("blob.bin");
        std::fs::write(&bin, [1, 2, 3, 4]).unwrap();
        let record = KnowledgeRecord::read_file(&bin).unwrap();
        assert_eq!(record.value, KnowledgeValue::UnknownFile(vec![1, 2, 3, 4]));
    }

    #[test]
    fn test_to_file_writes_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.dat");

        let record = KnowledgeRecord::new(KnowledgeValue::UnknownFile(vec![9, 8, 7]));
        assert_eq!(record.to_file(&path).unwrap(), 3);
        assert_eq!(std::fs::read(&path).unwrap(), vec![9, 8, 7]);

        let record = KnowledgeRecord::new(vec![1i64, 2]);
        record.to_file(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1, 2");
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn value_strategy() -> impl Strategy<Value = KnowledgeValue> {
        prop_oneof![
            Just(KnowledgeValue::Empty),
            any::<i64>().prop_map(KnowledgeValue::Integer),
            (-1e12f64..1e12).prop_map(KnowledgeValue::Double),
            "[a-zA-Z0-9 ]{0,40}".prop_map(KnowledgeValue::String),
            "[a-z<>/]{0,40}".prop_map(KnowledgeValue::Xml),
            prop::collection::vec(any::<u8>(), 0..200).prop_map(KnowledgeValue::UnknownFile),
            prop::collection::vec(any::<i64>(), 0..20).prop_map(KnowledgeValue::IntegerArray),
            prop::collection::vec(-1e6f64..1e6, 0..20).prop_map(KnowledgeValue::DoubleArray),
        ]
    }

    proptest! {
        #[test]
        fn record_roundtrip(
            key in "[a-z._]{0,24}",
            value in value_strategy(),
            quality in any::<u32>(),
            clock in any::<u64>(),
            toi in any::<u64>(),
        ) {
            let record = KnowledgeRecord { value, quality, write_quality: 0, clock, toi };
            let mut buf = vec![0u8; record.encoded_size(&key)];
            let end = record.write(&mut WriteCursor::new(&mut buf), &key).unwrap();
            prop_assert_eq!(end, buf.len());

            let (decoded_key, decoded) = KnowledgeRecord::read(&mut ReadCursor::new(&buf)).unwrap();
            prop_assert_eq!(decoded_key, key);
            prop_assert_eq!(decoded, record);
        }
    }
}
