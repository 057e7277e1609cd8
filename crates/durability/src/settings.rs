//! Checkpoint settings
//!
//! Controls what a save writes and what a load reads. Settings are never
//! persisted; after a load the reader copies the file's metadata (timestamps,
//! originator, states, version and Lamport clocks) back into them.

use std::path::PathBuf;

use madara_core::VERSION;

use crate::error::{CheckpointError, Result};
use crate::filter::{BufferFilter, BufferFilterChain};
use crate::format::{CHECKPOINT_HEADER_SIZE, FILE_HEADER_SIZE};

/// Default scratch buffer size in bytes
pub const DEFAULT_BUFFER_SIZE: usize = 1_024_000;

/// Checkpoint configuration
#[derive(Debug, Clone)]
pub struct CheckpointSettings {
    /// Checkpoint file path
    pub filename: PathBuf,
    /// Scratch buffer size; bounds a single segment
    pub buffer_size: usize,
    /// Clear the context before applying a load
    pub clear_knowledge: bool,
    /// Only keys starting with one of these are saved or loaded (all if empty)
    pub prefixes: Vec<String>,
    /// First segment index to load
    pub initial_state: u64,
    /// Last segment index to load
    pub last_state: u64,
    /// Identity of the writing process
    pub originator: String,
    /// Knowledge domain stamped into segment headers
    pub domain: String,
    /// Library version (written on save, read back on load)
    pub version: String,
    /// Timestamp of the first segment
    pub initial_timestamp: u64,
    /// Timestamp of the latest segment
    pub last_timestamp: u64,
    /// Write the timestamps above instead of the current time
    pub override_timestamp: bool,
    /// Lamport clock of the first segment read
    pub initial_lamport_clock: u64,
    /// Lamport clock of the last segment read, or the clock to write
    pub last_lamport_clock: u64,
    /// Write `last_lamport_clock` instead of the context clock
    pub override_lamport: bool,
    /// Segments in the file (read back on load)
    pub states: u64,
    /// Clear the context's locally-modified set after a checkpoint
    pub reset_checkpoint: bool,
    /// Filters applied to every segment
    pub buffer_filters: BufferFilterChain,
}

impl Default for CheckpointSettings {
    fn default() -> Self {
        CheckpointSettings {
            filename: PathBuf::new(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            clear_knowledge: false,
            prefixes: Vec::new(),
            initial_state: 0,
            last_state: u64::MAX,
            originator: String::new(),
            domain: String::new(),
            version: VERSION.to_string(),
            initial_timestamp: 0,
            last_timestamp: 0,
            override_timestamp: false,
            initial_lamport_clock: 0,
            last_lamport_clock: 0,
            override_lamport: false,
            states: 0,
            reset_checkpoint: true,
            buffer_filters: BufferFilterChain::new(),
        }
    }
}

impl CheckpointSettings {
    /// Settings for `filename` with defaults everywhere else
    pub fn new(filename: impl Into<PathBuf>) -> Self {
        CheckpointSettings {
            filename: filename.into(),
            ..Default::default()
        }
    }

    /// Set the file path
    pub fn with_filename(mut self, filename: impl Into<PathBuf>) -> Self {
        self.filename = filename.into();
        self
    }

    /// Set the scratch buffer size
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Clear the context before loading
    pub fn with_clear_knowledge(mut self, clear: bool) -> Self {
        self.clear_knowledge = clear;
        self
    }

    /// Restrict saves and loads to keys with these prefixes
    pub fn with_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    /// Load only segments `initial..=last`
    pub fn with_state_range(mut self, initial: u64, last: u64) -> Self {
        self.initial_state = initial;
        self.last_state = last;
        self
    }

    /// Set the originator
    pub fn with_originator(mut self, originator: impl Into<String>) -> Self {
        self.originator = originator.into();
        self
    }

    /// Set the domain
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    /// Write fixed timestamps instead of the current time
    pub fn with_timestamps(mut self, initial: u64, last: u64) -> Self {
        self.initial_timestamp = initial;
        self.last_timestamp = last;
        self.override_timestamp = true;
        self
    }

    /// Write a fixed Lamport clock instead of the context clock
    pub fn with_lamport_clock(mut self, clock: u64) -> Self {
        self.initial_lamport_clock = clock;
        self.last_lamport_clock = clock;
        self.override_lamport = true;
        self
    }

    /// Toggle clearing of the locally-modified set after a checkpoint
    pub fn with_reset_checkpoint(mut self, reset: bool) -> Self {
        self.reset_checkpoint = reset;
        self
    }

    /// Append a buffer filter
    pub fn with_filter(mut self, filter: BufferFilter) -> Self {
        self.buffer_filters.push(filter);
        self
    }

    /// Replace the filter chain
    pub fn with_filters(mut self, filters: BufferFilterChain) -> Self {
        self.buffer_filters = filters;
        self
    }

    /// True if `key` passes the prefix filter
    pub fn matches(&self, key: &str) -> bool {
        madara_core::matches_prefixes(key, &self.prefixes)
    }

    /// Validate settings
    pub fn validate(&self) -> Result<()> {
        if self.filename.as_os_str().is_empty() {
            return Err(CheckpointError::InvalidSettings("filename is empty".into()));
        }
        let minimum = FILE_HEADER_SIZE.max(CHECKPOINT_HEADER_SIZE);
        if self.buffer_size < minimum {
            return Err(CheckpointError::InvalidSettings(format!(
                "buffer_size {} is below the {} byte minimum",
                self.buffer_size, minimum
            )));
        }
        if self.initial_state > self.last_state {
            return Err(CheckpointError::InvalidSettings(format!(
                "initial_state {} is after last_state {}",
                self.initial_state, self.last_state
            )));
        }
        Ok(())
    }
}
