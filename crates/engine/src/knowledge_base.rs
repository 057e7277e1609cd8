//! Knowledge base facade
//!
//! [`KnowledgeBase`] bundles a shared [`ThreadSafeContext`] with its
//! configuration so callers can read, write, checkpoint and replay without
//! assembling settings by hand. Every checkpoint operation starts from
//! [`KnowledgeBaseConfig::checkpoint_settings`]; the `*_with` variants take
//! explicit settings instead.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use madara_core::{KnowledgeRecord, KnowledgeValue};
use madara_durability::{
    load_context, save_as_json, save_as_karl, save_checkpoint, save_context, CheckpointPlayer,
    CheckpointSettings,
};
use madara_storage::{ThreadSafeContext, UpdateStatus};
use tracing::{debug, info, info_span, Span};

use crate::config::{KnowledgeBaseConfig, CONFIG_FILE_NAME};
use crate::error::Result;

/// A knowledge context plus the configuration used to persist it
#[derive(Debug)]
pub struct KnowledgeBase {
    context: Arc<ThreadSafeContext>,
    config: KnowledgeBaseConfig,
    span: Span,
}

impl KnowledgeBase {
    /// Create an empty knowledge base from a validated config
    pub fn new(config: KnowledgeBaseConfig) -> Result<Self> {
        config.validate()?;
        let span = info_span!("knowledge_base", originator = %config.originator);
        info!(
            target: "madara::engine",
            parent: &span,
            checkpoint = %config.checkpoint_file.display(),
            filters = config.filters.len(),
            "Knowledge base created"
        );
        Ok(KnowledgeBase {
            context: Arc::new(ThreadSafeContext::new()),
            config,
            span,
        })
    }

    /// Open a knowledge base rooted at `dir`
    ///
    /// Reads `dir/madara.toml`, writing the default template first if it is
    /// missing. A relative `checkpoint_file` is resolved against `dir`. The
    /// checkpoint itself is not loaded; call [`load_context`](Self::load_context).
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let path = dir.join(CONFIG_FILE_NAME);
        KnowledgeBaseConfig::write_default_if_missing(&path)?;
        let mut config = KnowledgeBaseConfig::from_file(&path)?;
        if config.checkpoint_file.is_relative() {
            config.checkpoint_file = dir.join(&config.checkpoint_file);
        }
        Self::new(config)
    }

    /// The configuration in use
    pub fn config(&self) -> &KnowledgeBaseConfig {
        &self.config
    }

    /// Shared handle to the underlying context
    pub fn context(&self) -> &Arc<ThreadSafeContext> {
        &self.context
    }

    /// Set a value with the configured update settings
    pub fn set(&self, key: &str, value: impl Into<KnowledgeValue>) -> UpdateStatus {
        self.context.set_value(key, value, &self.config.update)
    }

    /// Quality stamped on later local writes to `key`
    pub fn set_quality(&self, key: &str, quality: u32) {
        self.context.set_write_quality(key, quality);
    }

    /// Apply a record received from elsewhere, with arbitration
    pub fn apply(&self, key: &str, record: &KnowledgeRecord) -> UpdateStatus {
        self.context
            .update_record_from_external(key, record, &self.config.update)
    }

    /// Current value of `key` (empty if unset)
    pub fn get(&self, key: &str) -> KnowledgeValue {
        self.context.get_value(key)
    }

    /// Full record for `key`
    pub fn get_record(&self, key: &str) -> Option<KnowledgeRecord> {
        self.context.get(key)
    }

    /// True if `key` holds a value
    pub fn exists(&self, key: &str) -> bool {
        self.context.exists(key)
    }

    /// Remove `key`; returns true if it was present
    pub fn delete(&self, key: &str) -> bool {
        self.context.delete(key)
    }

    /// Sorted keys
    pub fn keys(&self) -> Vec<String> {
        self.context.keys()
    }

    /// Current Lamport clock
    pub fn clock(&self) -> u64 {
        self.context.clock()
    }

    /// Checkpoint settings derived from the config
    pub fn checkpoint_settings(&self) -> CheckpointSettings {
        self.config.checkpoint_settings()
    }

    /// Snapshot the whole knowledge base into the checkpoint file
    pub fn save_context(&self) -> Result<u64> {
        self.save_context_with(&self.checkpoint_settings())
    }

    /// Snapshot with explicit settings
    pub fn save_context_with(&self, settings: &CheckpointSettings) -> Result<u64> {
        let _enter = self.span.enter();
        Ok(save_context(&self.context, settings)?)
    }

    /// Append changes since the last checkpoint to the checkpoint file
    pub fn save_checkpoint(&self) -> Result<u64> {
        self.save_checkpoint_with(&self.checkpoint_settings())
    }

    /// Append changes with explicit settings
    pub fn save_checkpoint_with(&self, settings: &CheckpointSettings) -> Result<u64> {
        let _enter = self.span.enter();
        Ok(save_checkpoint(&self.context, settings)?)
    }

    /// Load the checkpoint file; returns the bytes read
    pub fn load_context(&self) -> Result<u64> {
        let mut settings = self.checkpoint_settings();
        self.load_context_with(&mut settings)
    }

    /// Load with explicit settings, which receive the file's metadata
    pub fn load_context_with(&self, settings: &mut CheckpointSettings) -> Result<u64> {
        let _enter = self.span.enter();
        let read = load_context(&self.context, settings, &self.config.update)?;
        debug!(
            target: "madara::engine",
            bytes = read,
            states = settings.states,
            records = self.context.len(),
            "Checkpoint loaded"
        );
        Ok(read)
    }

    /// Export as a `.karl` script at `path`
    pub fn save_as_karl(&self, path: impl Into<PathBuf>) -> Result<u64> {
        let _enter = self.span.enter();
        let settings = self.checkpoint_settings().with_filename(path);
        Ok(save_as_karl(&self.context, &settings)?)
    }

    /// Export as JSON at `path`
    pub fn save_as_json(&self, path: impl Into<PathBuf>) -> Result<u64> {
        let _enter = self.span.enter();
        let settings = self.checkpoint_settings().with_filename(path);
        Ok(save_as_json(&self.context, &settings)?)
    }

    /// Player replaying the checkpoint file into this knowledge base
    pub fn player(&self) -> CheckpointPlayer {
        self.player_with(self.checkpoint_settings())
    }

    /// Player replaying the file named in `settings`
    pub fn player_with(&self, settings: CheckpointSettings) -> CheckpointPlayer {
        CheckpointPlayer::new(Arc::clone(&self.context), settings, self.config.update.clone())
            .with_span(self.span.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn kb_in(dir: &Path) -> KnowledgeBase {
        KnowledgeBase::new(KnowledgeBaseConfig::new(dir.join("kb.kkb"))).unwrap()
    }

    #[test]
    fn test_set_and_get() {
        let dir = tempdir().unwrap();
        let kb = kb_in(dir.path());
        assert!(kb.set("x", 5i64).is_applied());
        assert_eq!(kb.get("x"), KnowledgeValue::Integer(5));
        assert_eq!(kb.clock(), 1);
        assert!(kb.exists("x"));
        assert!(kb.delete("x"));
        assert!(!kb.exists("x"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = KnowledgeBaseConfig::new("kb.kkb");
        config.buffer_size = 0;
        assert!(KnowledgeBase::new(config).is_err());
    }

    #[test]
    fn test_quality_sticks_to_local_writes() {
        let dir = tempdir().unwrap();
        let kb = kb_in(dir.path());
        kb.set_quality("x", 7);
        kb.set("x", 1i64);
        assert_eq!(kb.get_record("x").unwrap().quality, 7);

        let status = kb.apply("x", &KnowledgeRecord::new(2i64).with_quality(3).with_clock(99));
        assert_eq!(status, UpdateStatus::InsufficientQuality);
        assert_eq!(kb.get("x"), KnowledgeValue::Integer(1));
    }
}
