//! Core types for the Madara knowledge store
//!
//! This crate defines the foundational types used throughout the system:
//! - KnowledgeValue: the tagged payload of a record
//! - KnowledgeRecord: value plus quality, Lamport clock and time-of-interest,
//!   with its bounds-checked binary codec
//! - WriteCursor / ReadCursor: big-endian byte cursors over fixed buffers
//! - Error / EncodingError: error type hierarchy
//! - Time, version and prefix helpers

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod encoding;
pub mod error;
pub mod record;
pub mod util;
pub mod value;

pub use encoding::{ReadCursor, WriteCursor};
pub use error::{EncodingError, Error, Result};
pub use record::KnowledgeRecord;
pub use util::{
    is_local_key, matches_prefixes, now_nanos, now_secs, pack_version, version_to_string, VERSION,
};
pub use value::{type_tags, KnowledgeValue};
