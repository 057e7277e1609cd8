//! Thread-safe knowledge context
//!
//! The context owns every record, the Lamport clock and two change sets:
//! - `modified`: shared changes waiting to be sent to peers
//! - `local_modified`: every change since the last checkpoint
//!
//! # Locking
//!
//! All state sits behind one `parking_lot::ReentrantMutex`. Each method takes
//! the lock for its own duration. Checkpoint save and load hold a
//! [`ContextGuard`] from [`ThreadSafeContext::lock`] for the whole scan or
//! apply; nested calls from the same thread re-enter without deadlocking.
//! No user code runs while the inner state is borrowed.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

use madara_core::{is_local_key, matches_prefixes, now_nanos, KnowledgeRecord, KnowledgeValue};
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use tracing::trace;

use crate::settings::{KnowledgeUpdateSettings, UpdateStatus};

#[derive(Debug, Default)]
struct ContextState {
    records: BTreeMap<String, KnowledgeRecord>,
    modified: BTreeSet<String>,
    local_modified: BTreeSet<String>,
    clock: u64,
}

impl ContextState {
    fn mark(&mut self, key: &str, settings: &KnowledgeUpdateSettings) {
        let shared = !is_local_key(key) || settings.treat_locals_as_globals;
        if shared && !settings.treat_globals_as_locals {
            self.modified.insert(key.to_string());
        }
        if settings.track_local_changes {
            self.local_modified.insert(key.to_string());
        }
    }

    fn collect(&self, keys: &BTreeSet<String>) -> Vec<(String, KnowledgeRecord)> {
        keys.iter()
            .filter_map(|k| self.records.get(k).map(|r| (k.clone(), r.clone())))
            .collect()
    }
}

/// Holds the context lock; dropping it releases the lock
pub struct ContextGuard<'a> {
    _guard: ReentrantMutexGuard<'a, RefCell<ContextState>>,
}

/// Concurrent key/value store of knowledge records
#[derive(Default)]
pub struct ThreadSafeContext {
    state: ReentrantMutex<RefCell<ContextState>>,
}

impl std::fmt::Debug for ThreadSafeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadSafeContext")
            .field("len", &self.len())
            .field("clock", &self.clock())
            .finish()
    }
}

impl ThreadSafeContext {
    /// Create an empty context with the clock at zero
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut ContextState) -> R) -> R {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        f(&mut state)
    }

    /// Acquire the context lock until the guard is dropped
    ///
    /// Other threads block on every context call while the guard lives.
    /// The owning thread may keep calling context methods.
    pub fn lock(&self) -> ContextGuard<'_> {
        ContextGuard {
            _guard: self.state.lock(),
        }
    }

    /// Copy of the record stored under `key`
    pub fn get(&self, key: &str) -> Option<KnowledgeRecord> {
        self.with_state(|s| s.records.get(key).cloned())
    }

    /// Copy of the value stored under `key`, `Empty` if absent
    pub fn get_value(&self, key: &str) -> KnowledgeValue {
        self.get(key).map(|r| r.value).unwrap_or_default()
    }

    /// True if `key` holds a value
    pub fn exists(&self, key: &str) -> bool {
        self.with_state(|s| s.records.get(key).map_or(false, |r| r.exists()))
    }

    /// Number of records, including ones that were never assigned
    pub fn len(&self) -> usize {
        self.with_state(|s| s.records.len())
    }

    /// True if the context holds no records
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Assign a value locally
    ///
    /// Advances the Lamport clock by `settings.clock_increment` and stamps
    /// the record with the new clock, its write quality and the current
    /// time.
    pub fn set_value(
        &self,
        key: &str,
        value: impl Into<KnowledgeValue>,
        settings: &KnowledgeUpdateSettings,
    ) -> UpdateStatus {
        if key.is_empty() {
            return UpdateStatus::NullKey;
        }
        let value = value.into();
        self.with_state(|s| {
            s.clock = s.clock.saturating_add(settings.clock_increment);
            let clock = s.clock;
            let record = s.records.entry(key.to_string()).or_default();
            record.value = value;
            record.quality = record.write_quality;
            record.clock = clock;
            record.toi = now_nanos();
            s.mark(key, settings);
            trace!(target: "madara::context", key, clock, "set value");
        });
        UpdateStatus::Applied
    }

    /// Assign an integer
    pub fn set_integer(&self, key: &str, value: i64, settings: &KnowledgeUpdateSettings) -> UpdateStatus {
        self.set_value(key, value, settings)
    }

    /// Assign a double
    pub fn set_double(&self, key: &str, value: f64, settings: &KnowledgeUpdateSettings) -> UpdateStatus {
        self.set_value(key, value, settings)
    }

    /// Assign a string
    pub fn set_string(&self, key: &str, value: &str, settings: &KnowledgeUpdateSettings) -> UpdateStatus {
        self.set_value(key, value, settings)
    }

    /// Set the quality asserted by local writes to `key`
    ///
    /// Creates an empty record if the key is unknown.
    pub fn set_write_quality(&self, key: &str, quality: u32) {
        self.with_state(|s| {
            s.records.entry(key.to_string()).or_default().write_quality = quality;
        });
    }

    /// Apply a record received from outside (peer, checkpoint, player)
    ///
    /// Unless `always_overwrite` is set, a candidate with lower quality, or
    /// equal quality and an older clock, is rejected and nothing changes.
    /// An accepted record replaces value, quality, clock and toi; the stored
    /// write quality is kept. The global clock moves past the record's
    /// clock.
    pub fn update_record_from_external(
        &self,
        key: &str,
        incoming: &KnowledgeRecord,
        settings: &KnowledgeUpdateSettings,
    ) -> UpdateStatus {
        if key.is_empty() {
            return UpdateStatus::NullKey;
        }

        self.with_state(|s| {
            if !settings.always_overwrite {
                if let Some(current) = s.records.get(key) {
                    if incoming.quality < current.quality {
                        trace!(target: "madara::context", key, incoming = incoming.quality,
                            current = current.quality, "rejected: insufficient quality");
                        return UpdateStatus::InsufficientQuality;
                    }
                    if incoming.quality == current.quality && incoming.clock < current.clock {
                        trace!(target: "madara::context", key, incoming = incoming.clock,
                            current = current.clock, "rejected: stale clock");
                        return UpdateStatus::StaleClock;
                    }
                }
            }

            if incoming.clock >= s.clock {
                s.clock = incoming.clock.saturating_add(1);
            }

            let record = s.records.entry(key.to_string()).or_default();
            record.value = incoming.value.clone();
            record.quality = incoming.quality;
            record.clock = incoming.clock;
            record.toi = incoming.toi;
            s.mark(key, settings);
            UpdateStatus::Applied
        })
    }

    /// Add `key` to the change sets without changing its value
    pub fn mark_modified(&self, key: &str, settings: &KnowledgeUpdateSettings) {
        self.with_state(|s| {
            if s.records.contains_key(key) {
                s.mark(key, settings);
            }
        });
    }

    /// Add `key` to the locally-modified set only
    pub fn mark_to_checkpoint(&self, key: &str) {
        self.with_state(|s| {
            if s.records.contains_key(key) {
                s.local_modified.insert(key.to_string());
            }
        });
    }

    /// Remove `key` entirely; returns true if it existed
    pub fn delete(&self, key: &str) -> bool {
        self.with_state(|s| {
            s.modified.remove(key);
            s.local_modified.remove(key);
            s.records.remove(key).is_some()
        })
    }

    /// Drop every record and both change sets; the clock is kept
    pub fn clear(&self) {
        self.with_state(|s| {
            let dropped = s.records.len();
            s.records.clear();
            s.modified.clear();
            s.local_modified.clear();
            trace!(target: "madara::context", dropped, "cleared context");
        });
    }

    /// Current Lamport clock
    pub fn clock(&self) -> u64 {
        self.with_state(|s| s.clock)
    }

    /// Set the Lamport clock, returning the new value
    pub fn set_clock(&self, clock: u64) -> u64 {
        self.with_state(|s| {
            s.clock = clock;
            clock
        })
    }

    /// Advance the Lamport clock, returning the new value; saturates at `u64::MAX`
    pub fn inc_clock(&self, amount: u64) -> u64 {
        self.with_state(|s| {
            s.clock = s.clock.saturating_add(amount);
            s.clock
        })
    }

    /// Snapshot of shared changes since the last [`reset_modified`](Self::reset_modified)
    pub fn modifieds(&self) -> Vec<(String, KnowledgeRecord)> {
        self.with_state(|s| s.collect(&s.modified))
    }

    /// Snapshot of changes since the last [`reset_checkpoint`](Self::reset_checkpoint)
    pub fn local_modifieds(&self) -> Vec<(String, KnowledgeRecord)> {
        self.with_state(|s| s.collect(&s.local_modified))
    }

    /// Forget shared changes
    pub fn reset_modified(&self) {
        self.with_state(|s| s.modified.clear());
    }

    /// Forget changes recorded for checkpointing
    pub fn reset_checkpoint(&self) {
        self.with_state(|s| s.local_modified.clear());
    }

    /// Snapshot of every record in key order
    pub fn records(&self) -> Vec<(String, KnowledgeRecord)> {
        self.with_state(|s| {
            s.records
                .iter()
                .map(|(k, r)| (k.clone(), r.clone()))
                .collect()
        })
    }

    /// Snapshot of records whose key matches any prefix (all if empty)
    pub fn records_matching<S: AsRef<str>>(&self, prefixes: &[S]) -> Vec<(String, KnowledgeRecord)> {
        self.with_state(|s| {
            s.records
                .iter()
                .filter(|(k, _)| matches_prefixes(k, prefixes))
                .map(|(k, r)| (k.clone(), r.clone()))
                .collect()
        })
    }

    /// Sorted list of keys
    pub fn keys(&self) -> Vec<String> {
        self.with_state(|s| s.records.keys().cloned().collect())
    }
}
