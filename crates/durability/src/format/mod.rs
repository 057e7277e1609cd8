//! On-disk checkpoint format
//!
//! ```text
//! FileHeader (108 bytes)
//! segment*  where segment = stored_len(u64) | filtered(CheckpointHeader | records)
//! ```
//!
//! All integers are big-endian. `FileHeader.size` is the total file length.
//! Without filters a segment's `stored_len` equals its header's `size`.

pub mod checkpoint_header;
pub mod file_header;

pub use checkpoint_header::{
    CheckpointHeader, CHECKPOINT_HEADER_SIZE, DOMAIN_LEN, MADARA_ID, MULTIASSIGN,
};
pub use file_header::{FileHeader, FILE_HEADER_SIZE, FILE_MAGIC, ORIGINATOR_LEN};

/// Bytes in a segment's length prefix
pub const SEGMENT_PREFIX_SIZE: usize = 8;
