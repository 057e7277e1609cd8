//! Record sources for checkpoints
//!
//! A [`VariablesLister`] decides what goes into a checkpoint segment. The
//! writer calls [`start`](VariablesLister::start) once with the context lock
//! held, drains [`next`](VariablesLister::next), and calls
//! [`finish`](VariablesLister::finish) only after the segment is on disk.

use std::collections::VecDeque;

use madara_core::KnowledgeRecord;
use madara_storage::ThreadSafeContext;

use crate::settings::CheckpointSettings;

/// Enumerates the records to checkpoint
pub trait VariablesLister {
    /// Prepare the listing; called with the context lock held
    fn start(&mut self, context: &ThreadSafeContext, settings: &CheckpointSettings);

    /// Next `(key, record)` pair, `None` when exhausted
    fn next(&mut self) -> Option<(String, KnowledgeRecord)>;

    /// Called once the segment has been written
    fn finish(&mut self, _context: &ThreadSafeContext, _settings: &CheckpointSettings) {}
}

/// Lists records changed since the last checkpoint
///
/// Clears the context's locally-modified set in
/// [`finish`](VariablesLister::finish) when `reset_checkpoint` is set.
#[derive(Debug, Default)]
pub struct LocalChangesLister {
    pending: VecDeque<(String, KnowledgeRecord)>,
}

impl LocalChangesLister {
    /// Create an empty lister
    pub fn new() -> Self {
        Self::default()
    }
}

impl VariablesLister for LocalChangesLister {
    fn start(&mut self, context: &ThreadSafeContext, _settings: &CheckpointSettings) {
        self.pending = context.local_modifieds().into();
    }

    fn next(&mut self) -> Option<(String, KnowledgeRecord)> {
        self.pending.pop_front()
    }

    fn finish(&mut self, context: &ThreadSafeContext, settings: &CheckpointSettings) {
        if settings.reset_checkpoint {
            context.reset_checkpoint();
        }
    }
}

/// Lists every record in the context
#[derive(Debug, Default)]
pub struct AllRecordsLister {
    pending: VecDeque<(String, KnowledgeRecord)>,
}

impl AllRecordsLister {
    /// Create an empty lister
    pub fn new() -> Self {
        Self::default()
    }
}

impl VariablesLister for AllRecordsLister {
    fn start(&mut self, context: &ThreadSafeContext, _settings: &CheckpointSettings) {
        self.pending = context.records().into();
    }

    fn next(&mut self) -> Option<(String, KnowledgeRecord)> {
        self.pending.pop_front()
    }
}

/// Lists a fixed set of records, independent of the context
#[derive(Debug, Default)]
pub struct FixedLister {
    records: Vec<(String, KnowledgeRecord)>,
    pending: VecDeque<(String, KnowledgeRecord)>,
}

impl FixedLister {
    /// Lister yielding `records` in order on every start
    pub fn new(records: Vec<(String, KnowledgeRecord)>) -> Self {
        FixedLister {
            records,
            pending: VecDeque::new(),
        }
    }
}

impl VariablesLister for FixedLister {
    fn start(&mut self, _context: &ThreadSafeContext, _settings: &CheckpointSettings) {
        self.pending = self.records.iter().cloned().collect();
    }

    fn next(&mut self) -> Option<(String, KnowledgeRecord)> {
        self.pending.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use madara_storage::KnowledgeUpdateSettings;

    #[test]
    fn test_local_changes_lister_resets_on_finish() {
        let ctx = ThreadSafeContext::new();
        let update = KnowledgeUpdateSettings::default();
        ctx.set_integer("a", 1, &update);
        ctx.set_integer("b", 2, &update);

        let settings = CheckpointSettings::default();
        let mut lister = LocalChangesLister::new();
        lister.start(&ctx, &settings);
        assert_eq!(lister.next().map(|(k, _)| k), Some("a".to_string()));
        assert_eq!(lister.next().map(|(k, _)| k), Some("b".to_string()));
        assert!(lister.next().is_none());

        lister.finish(&ctx, &settings);
        assert!(ctx.local_modifieds().is_empty());
    }

    #[test]
    fn test_local_changes_lister_keeps_set_without_reset() {
        let ctx = ThreadSafeContext::new();
        ctx.set_integer("a", 1, &KnowledgeUpdateSettings::default());

        let settings = CheckpointSettings::default().with_reset_checkpoint(false);
        let mut lister = LocalChangesLister::new();
        lister.start(&ctx, &settings);
        lister.finish(&ctx, &settings);
        assert_eq!(ctx.local_modifieds().len(), 1);
    }

    #[test]
    fn test_all_records_lister() {
        let ctx = ThreadSafeContext::new();
        let update = KnowledgeUpdateSettings::default();
        ctx.set_integer("a", 1, &update);
        ctx.reset_checkpoint();

        let mut lister = AllRecordsLister::new();
        lister.start(&ctx, &CheckpointSettings::default());
        assert!(lister.next().is_some());
        assert!(lister.next().is_none());
    }

    #[test]
    fn test_fixed_lister_restarts() {
        let ctx = ThreadSafeContext::new();
        let settings = CheckpointSettings::default();
        let mut lister = FixedLister::new(vec![("k".into(), KnowledgeRecord::new(1i64))]);

        for _ in 0..2 {
            lister.start(&ctx, &settings);
            assert!(lister.next().is_some());
            assert!(lister.next().is_none());
        }
    }
}
