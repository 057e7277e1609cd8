//! Madara - replicated in-memory knowledge base with checkpoint persistence
//!
//! # Quick Start
//!
//! ```ignore
//! use madara::{KnowledgeBase, KnowledgeBaseConfig};
//!
//! let kb = KnowledgeBase::new(KnowledgeBaseConfig::new("kb.kkb"))?;
//! kb.set("sensor.temp", 21.5);
//! kb.save_checkpoint()?;
//!
//! let restored = KnowledgeBase::new(KnowledgeBaseConfig::new("kb.kkb"))?;
//! restored.load_context()?;
//! ```
//!
//! The lower layers are re-exported for callers that need the file format
//! or the context directly.

pub use madara_engine::*;

pub use madara_core;
pub use madara_durability;
pub use madara_storage;
