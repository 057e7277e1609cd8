//! In-memory knowledge context
//!
//! This crate provides the concurrent store that checkpoints snapshot and
//! restore:
//! - ThreadSafeContext: records, Lamport clock and change tracking
//! - KnowledgeUpdateSettings: how a mutation is applied and tracked
//! - UpdateStatus: outcome of quality/clock arbitration

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod settings;

pub use context::{ContextGuard, ThreadSafeContext};
pub use settings::{KnowledgeUpdateSettings, UpdateStatus};
