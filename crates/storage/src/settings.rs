//! Update settings and outcomes

use madara_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Knobs controlling how a mutation is applied and tracked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeUpdateSettings {
    /// Keep global changes out of the shared modified set
    pub treat_globals_as_locals: bool,
    /// Skip quality and clock arbitration on external updates
    pub always_overwrite: bool,
    /// Record mutations in the locally-modified set used by checkpoints
    pub track_local_changes: bool,
    /// Put `.`-prefixed local keys into the shared modified set
    pub treat_locals_as_globals: bool,
    /// Amount the Lamport clock advances per local write
    pub clock_increment: u64,
}

impl Default for KnowledgeUpdateSettings {
    fn default() -> Self {
        KnowledgeUpdateSettings {
            treat_globals_as_locals: false,
            always_overwrite: false,
            track_local_changes: true,
            treat_locals_as_globals: false,
            clock_increment: 1,
        }
    }
}

impl KnowledgeUpdateSettings {
    /// Create settings with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: bypass quality/clock arbitration
    pub fn with_always_overwrite(mut self, always_overwrite: bool) -> Self {
        self.always_overwrite = always_overwrite;
        self
    }

    /// Builder: toggle locally-modified tracking
    pub fn with_track_local_changes(mut self, track: bool) -> Self {
        self.track_local_changes = track;
        self
    }

    /// Builder: treat globals as locals
    pub fn with_treat_globals_as_locals(mut self, value: bool) -> Self {
        self.treat_globals_as_locals = value;
        self
    }

    /// Builder: treat locals as globals
    pub fn with_treat_locals_as_globals(mut self, value: bool) -> Self {
        self.treat_locals_as_globals = value;
        self
    }

    /// Builder: set the clock increment
    pub fn with_clock_increment(mut self, increment: u64) -> Self {
        self.clock_increment = increment;
        self
    }

    /// Validate settings; the clock increment must be non-zero
    pub fn validate(&self) -> Result<()> {
        if self.clock_increment == 0 {
            return Err(Error::InvalidOperation(
                "clock_increment must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Outcome of applying an update to the context
///
/// Rejections are ordinary outcomes, not errors. [`code`](Self::code) gives
/// the numeric status used by callers that log or forward it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    /// The update was applied
    Applied,
    /// The key was empty
    NullKey,
    /// The incoming quality is lower than the stored quality
    InsufficientQuality,
    /// Equal quality but the incoming clock is older
    StaleClock,
}

impl UpdateStatus {
    /// Numeric status: 0 applied, -1 null key, -2 insufficient quality, -3 stale clock
    pub fn code(self) -> i32 {
        match self {
            UpdateStatus::Applied => 0,
            UpdateStatus::NullKey => -1,
            UpdateStatus::InsufficientQuality => -2,
            UpdateStatus::StaleClock => -3,
        }
    }

    /// True if the update changed the context
    pub fn is_applied(self) -> bool {
        self == UpdateStatus::Applied
    }
}
