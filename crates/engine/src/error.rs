//! Engine error type

use madara_durability::CheckpointError;
use thiserror::Error;

use crate::config::ConfigError;

/// Result type alias for knowledge base operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by [`crate::KnowledgeBase`]
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be loaded or is invalid
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A checkpoint save, load or export failed
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}
