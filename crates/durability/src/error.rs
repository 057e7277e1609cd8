//! Checkpoint error types
//!
//! Failures fall into three classes callers branch on:
//! - file: the checkpoint could not be opened, read or written
//! - memory: a buffer was too small for what had to go in it
//! - filter: a buffer filter failed or overflowed its output budget
//!
//! A missing or unrecognised checkpoint file is not an error; loads report
//! zero bytes read instead.

use std::io;
use std::path::PathBuf;

use madara_core::EncodingError;
use thiserror::Error;

/// Result type alias for checkpoint operations
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Errors raised by buffer filters
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    /// A filter stage could not transform its input
    #[error("filter {filter} failed on {data_len} bytes: {detail}")]
    Codec {
        /// Identifier of the failing filter
        filter: String,
        /// Human-readable error description
        detail: String,
        /// Length of the input that failed
        data_len: usize,
    },

    /// A filter stage produced more bytes than the buffer allows
    #[error("filter {filter} produced {size} bytes, buffer holds {max_size}")]
    Overflow {
        /// Identifier of the overflowing filter
        filter: String,
        /// Bytes produced
        size: usize,
        /// Maximum allowed
        max_size: usize,
    },
}

impl FilterError {
    /// Create a codec error with diagnostic context
    pub fn codec(filter: impl Into<String>, detail: impl Into<String>, data_len: usize) -> Self {
        FilterError::Codec {
            filter: filter.into(),
            detail: detail.into(),
            data_len,
        }
    }
}

/// Errors raised while saving or loading checkpoints
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// The checkpoint file could not be used
    #[error("checkpoint file {}: {detail}", path.display())]
    File {
        /// Path of the checkpoint file
        path: PathBuf,
        /// What went wrong
        detail: String,
    },

    /// A buffer was too small
    #[error("checkpoint buffer: {detail}")]
    Memory {
        /// What did not fit
        detail: String,
    },

    /// Buffer filter failure
    #[error("buffer filter: {0}")]
    Filter(#[from] FilterError),

    /// Bounds-checked encode/decode failure
    #[error("encoding: {0}")]
    Encoding(#[from] EncodingError),

    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON export failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Settings rejected by validation
    #[error("invalid checkpoint settings: {0}")]
    InvalidSettings(String),

    /// Operation not valid in the current state
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

impl CheckpointError {
    pub(crate) fn file(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        CheckpointError::File {
            path: path.into(),
            detail: detail.into(),
        }
    }

    pub(crate) fn memory(detail: impl Into<String>) -> Self {
        CheckpointError::Memory {
            detail: detail.into(),
        }
    }

    /// True for buffer-size failures
    pub fn is_memory(&self) -> bool {
        matches!(self, CheckpointError::Memory { .. } | CheckpointError::Encoding(_))
    }

    /// True for buffer filter failures
    pub fn is_filter(&self) -> bool {
        matches!(self, CheckpointError::Filter(_))
    }

    /// True for file access failures
    pub fn is_file(&self) -> bool {
        matches!(self, CheckpointError::File { .. } | CheckpointError::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let err = CheckpointError::memory("record does not fit");
        assert!(err.is_memory());
        assert!(!err.is_file());

        let err: CheckpointError = EncodingError::NotEnoughRoom {
            field: "record.key",
            required: 10,
            available: 2,
        }
        .into();
        assert!(err.is_memory());
        assert!(err.to_string().contains("record.key"));

        let err: CheckpointError = FilterError::codec("zstd", "bad frame", 12).into();
        assert!(err.is_filter());
        assert!(err.to_string().contains("zstd"));

        let err = CheckpointError::file("/tmp/x.kkb", "short read");
        assert!(err.is_file());
        assert!(err.to_string().contains("/tmp/x.kkb"));
    }

    #[test]
    fn test_overflow_display() {
        let err = FilterError::Overflow {
            filter: "aes-256-gcm".into(),
            size: 2048,
            max_size: 1024,
        };
        let msg = err.to_string();
        assert!(msg.contains("2048"));
        assert!(msg.contains("1024"));
    }
}
