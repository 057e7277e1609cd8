//! Checkpoint persistence for the Madara knowledge store
//!
//! This crate handles:
//! - The on-disk checkpoint format (file header, segment headers, records)
//! - Buffer filters (zstd compression, AES-256-GCM encryption, custom codecs)
//! - Full snapshots and incremental checkpoints
//! - Streaming, filtered and partial loads
//! - Timed replay of a checkpoint into a live context
//! - `.karl` and JSON exports

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod export;
pub mod filter;
pub mod format;
pub mod lister;
pub mod player;
pub mod reader;
pub mod settings;
pub mod writer;

pub use error::{CheckpointError, FilterError, Result};
pub use export::{save_as_json, save_as_karl};
pub use filter::{AesGcmFilter, BufferCodec, BufferFilter, BufferFilterChain, ZstdFilter};
pub use format::{CheckpointHeader, FileHeader, CHECKPOINT_HEADER_SIZE, FILE_HEADER_SIZE};
pub use lister::{AllRecordsLister, FixedLister, LocalChangesLister, VariablesLister};
pub use player::{CheckpointPlayer, PlaybackClock, SimTimeSource, StopToken};
pub use reader::{load_context, CheckpointReader};
pub use settings::{CheckpointSettings, DEFAULT_BUFFER_SIZE};
pub use writer::{save_checkpoint, save_checkpoint_with, save_context};
