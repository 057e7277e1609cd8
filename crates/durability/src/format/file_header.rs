//! Checkpoint file header
//!
//! # Binary Format (108 bytes)
//!
//! ```text
//! size(8) + states(8) + initial_timestamp(8) + last_timestamp(8)
//! + file_type("KaRL1.5\0", 8) + karl_version(4) + originator(64) = 108 bytes
//! ```
//!
//! `karl_version` packs `major<<24 | minor<<16 | patch`. The originator is
//! nul-terminated and nul-padded.

use madara_core::encoding::{ReadCursor, WriteCursor};
use madara_core::{now_secs, pack_version, EncodingError, VERSION};

/// Total size of a serialized `FileHeader` in bytes
pub const FILE_HEADER_SIZE: usize = 108;

/// File type tag written at offset 32
pub const FILE_MAGIC: [u8; 8] = *b"KaRL1.5\0";

/// Width of the originator field
pub const ORIGINATOR_LEN: usize = 64;

/// Offset of `file_type` within the header
const FILE_TYPE_OFFSET: usize = 32;

/// Leading bytes of `file_type` that identify a checkpoint
const MAGIC_PREFIX_LEN: usize = 4;

/// Header at the start of every checkpoint file
#[derive(Debug, Clone)]
pub struct FileHeader {
    /// Total bytes in the file
    pub size: u64,
    /// Number of segments
    pub states: u64,
    /// Timestamp (seconds) of the first segment
    pub initial_timestamp: u64,
    /// Timestamp (seconds) of the latest segment
    pub last_timestamp: u64,
    /// File type tag
    pub file_type: [u8; 8],
    /// Packed library version that wrote the file
    pub karl_version: u32,
    /// Identity of the writing process
    pub originator: String,
}

impl FileHeader {
    /// Header for an empty file written now by `originator`
    pub fn new(originator: impl Into<String>) -> Self {
        let now = now_secs();
        FileHeader {
            size: FILE_HEADER_SIZE as u64,
            states: 0,
            initial_timestamp: now,
            last_timestamp: now,
            file_type: FILE_MAGIC,
            karl_version: pack_version(VERSION),
            originator: originator.into(),
        }
    }

    /// Cheap sniff: does `bytes` start like a checkpoint file?
    ///
    /// Only the file-type tag is examined; nothing else in the buffer is
    /// trusted until this passes.
    pub fn file_header_test(bytes: &[u8]) -> bool {
        bytes.len() >= FILE_HEADER_SIZE
            && bytes[FILE_TYPE_OFFSET..FILE_TYPE_OFFSET + MAGIC_PREFIX_LEN]
                == FILE_MAGIC[..MAGIC_PREFIX_LEN]
    }

    /// Encode at the cursor, returning the new position
    pub fn write(&self, cursor: &mut WriteCursor<'_>) -> Result<usize, EncodingError> {
        cursor.put_u64("FileHeader.size", self.size)?;
        cursor.put_u64("FileHeader.states", self.states)?;
        cursor.put_u64("FileHeader.initial_timestamp", self.initial_timestamp)?;
        cursor.put_u64("FileHeader.last_timestamp", self.last_timestamp)?;
        cursor.put_bytes("FileHeader.file_type", &self.file_type)?;
        cursor.put_u32("FileHeader.karl_version", self.karl_version)?;
        cursor.put_fixed_str("FileHeader.originator", &self.originator, ORIGINATOR_LEN)?;
        Ok(cursor.position())
    }

    /// Decode from the cursor
    pub fn read(cursor: &mut ReadCursor<'_>) -> Result<Self, EncodingError> {
        Ok(FileHeader {
            size: cursor.get_u64("FileHeader.size")?,
            states: cursor.get_u64("FileHeader.states")?,
            initial_timestamp: cursor.get_u64("FileHeader.initial_timestamp")?,
            last_timestamp: cursor.get_u64("FileHeader.last_timestamp")?,
            file_type: cursor.get_array::<8>("FileHeader.file_type")?,
            karl_version: cursor.get_u32("FileHeader.karl_version")?,
            originator: cursor.get_fixed_str("FileHeader.originator", ORIGINATOR_LEN)?,
        })
    }

    /// Serialize into a fixed array
    pub fn to_bytes(&self) -> Result<[u8; FILE_HEADER_SIZE], EncodingError> {
        let mut buf = [0u8; FILE_HEADER_SIZE];
        self.write(&mut WriteCursor::new(&mut buf))?;
        Ok(buf)
    }
}

impl PartialEq for FileHeader {
    fn eq(&self, other: &Self) -> bool {
        self.size == other.size
            && self.states == other.states
            && self.initial_timestamp == other.initial_timestamp
            && self.last_timestamp == other.last_timestamp
            && self.karl_version == other.karl_version
            && self.file_type[..MAGIC_PREFIX_LEN] == other.file_type[..MAGIC_PREFIX_LEN]
            && truncated(&self.originator) == truncated(&other.originator)
    }
}

impl Eq for FileHeader {}

// Only the bytes that fit the on-disk field take part in equality
fn truncated(originator: &str) -> &[u8] {
    let bytes = originator.as_bytes();
    &bytes[..bytes.len().min(ORIGINATOR_LEN - 1)]
}
