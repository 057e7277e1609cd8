//! Error types for the knowledge base core
//!
//! Two layers, both built on `thiserror`:
//! - [`EncodingError`]: failures of the bounds-checked binary codec. Running
//!   out of buffer space is the memory-class failure and always carries the
//!   field name plus required/available byte counts.
//! - [`Error`]: the crate-wide error for record and file operations.

use std::io;
use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while encoding or decoding fixed-layout binary data
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    /// The buffer does not have enough room for the named field
    #[error("not enough room in buffer for {field}: need {required} bytes, {available} available")]
    NotEnoughRoom {
        /// Name of the field being read or written
        field: &'static str,
        /// Bytes the field needs
        required: usize,
        /// Bytes left in the buffer
        available: usize,
    },

    /// A record carried a type tag this build does not understand
    #[error("unknown record type tag {0}")]
    UnknownType(u32),

    /// A string field did not contain valid UTF-8
    #[error("invalid UTF-8 in {field}")]
    InvalidUtf8 {
        /// Name of the string field
        field: &'static str,
    },

    /// A size field is inconsistent with its value type
    #[error("invalid size {size} for {field}")]
    InvalidSize {
        /// Name of the field
        field: &'static str,
        /// The offending size
        size: u64,
    },
}

impl EncodingError {
    /// True for out-of-buffer failures (the memory class)
    pub fn is_memory(&self) -> bool {
        matches!(self, EncodingError::NotEnoughRoom { .. })
    }
}

/// Error types for core record operations
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (file operations)
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// Binary encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),

    /// Invalid operation or state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}
