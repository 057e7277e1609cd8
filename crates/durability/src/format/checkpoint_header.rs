//! Segment header
//!
//! Every segment starts with the same header a knowledge update message
//! carries on the wire.
//!
//! # Binary Format (141 bytes)
//!
//! ```text
//! size(8) + madara_id(8) + domain(32) + originator(64) + type(4)
//! + updates(4) + quality(4) + clock(8) + timestamp(8) + ttl(1) = 141 bytes
//! ```
//!
//! `size` counts the header plus every record that follows it.

use madara_core::encoding::{ReadCursor, WriteCursor};
use madara_core::EncodingError;

use super::file_header::ORIGINATOR_LEN;

/// Total size of a serialized `CheckpointHeader` in bytes
pub const CHECKPOINT_HEADER_SIZE: usize = 141;

/// Protocol identifier in `madara_id`
pub const MADARA_ID: [u8; 8] = *b"KaRL1.5\0";

/// Width of the domain field
pub const DOMAIN_LEN: usize = 32;

/// Message type for a batch of assignments
pub const MULTIASSIGN: u32 = 2;

/// Header at the start of each segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointHeader {
    /// Bytes in the header plus records
    pub size: u64,
    /// Protocol identifier
    pub madara_id: [u8; 8],
    /// Knowledge domain
    pub domain: String,
    /// Identity of the writing process
    pub originator: String,
    /// Message type
    pub message_type: u32,
    /// Number of records in the segment
    pub updates: u32,
    /// Quality of the writer
    pub quality: u32,
    /// Lamport clock at write time
    pub clock: u64,
    /// Wall-clock seconds at write time
    pub timestamp: u64,
    /// Hop limit, unused on disk
    pub ttl: u8,
}

impl Default for CheckpointHeader {
    fn default() -> Self {
        CheckpointHeader {
            size: CHECKPOINT_HEADER_SIZE as u64,
            madara_id: MADARA_ID,
            domain: String::new(),
            originator: String::new(),
            message_type: MULTIASSIGN,
            updates: 0,
            quality: 0,
            clock: 0,
            timestamp: 0,
            ttl: 0,
        }
    }
}

impl CheckpointHeader {
    /// Encode at the cursor, returning the new position
    pub fn write(&self, cursor: &mut WriteCursor<'_>) -> Result<usize, EncodingError> {
        cursor.put_u64("CheckpointHeader.size", self.size)?;
        cursor.put_bytes("CheckpointHeader.madara_id", &self.madara_id)?;
        cursor.put_fixed_str("CheckpointHeader.domain", &self.domain, DOMAIN_LEN)?;
        cursor.put_fixed_str("CheckpointHeader.originator", &self.originator, ORIGINATOR_LEN)?;
        cursor.put_u32("CheckpointHeader.type", self.message_type)?;
        cursor.put_u32("CheckpointHeader.updates", self.updates)?;
        cursor.put_u32("CheckpointHeader.quality", self.quality)?;
        cursor.put_u64("CheckpointHeader.clock", self.clock)?;
        cursor.put_u64("CheckpointHeader.timestamp", self.timestamp)?;
        cursor.put_u8("CheckpointHeader.ttl", self.ttl)?;
        Ok(cursor.position())
    }

    /// Decode from the cursor
    pub fn read(cursor: &mut ReadCursor<'_>) -> Result<Self, EncodingError> {
        Ok(CheckpointHeader {
            size: cursor.get_u64("CheckpointHeader.size")?,
            madara_id: cursor.get_array::<8>("CheckpointHeader.madara_id")?,
            domain: cursor.get_fixed_str("CheckpointHeader.domain", DOMAIN_LEN)?,
            originator: cursor.get_fixed_str("CheckpointHeader.originator", ORIGINATOR_LEN)?,
            message_type: cursor.get_u32("CheckpointHeader.type")?,
            updates: cursor.get_u32("CheckpointHeader.updates")?,
            quality: cursor.get_u32("CheckpointHeader.quality")?,
            clock: cursor.get_u64("CheckpointHeader.clock")?,
            timestamp: cursor.get_u64("CheckpointHeader.timestamp")?,
            ttl: cursor.get_u8("CheckpointHeader.ttl")?,
        })
    }
}
