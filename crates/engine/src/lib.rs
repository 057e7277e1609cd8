//! Knowledge base engine
//!
//! Ties the knowledge context and checkpoint persistence together:
//! - [`KnowledgeBase`]: facade over a shared context and its configuration
//! - [`KnowledgeBaseConfig`]: `madara.toml` schema
//! - [`logging`]: global `tracing` subscriber setup

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod knowledge_base;
pub mod logging;

pub use config::{ConfigError, FilterConfig, KnowledgeBaseConfig, CONFIG_FILE_NAME};
pub use error::{Error, Result};
pub use knowledge_base::KnowledgeBase;

pub use madara_core::{KnowledgeRecord, KnowledgeValue};
pub use madara_durability::{
    BufferFilter, CheckpointError, CheckpointPlayer, CheckpointReader, CheckpointSettings,
    PlaybackClock, SimTimeSource,
};
pub use madara_storage::{KnowledgeUpdateSettings, ThreadSafeContext, UpdateStatus};
