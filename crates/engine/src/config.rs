//! Knowledge base configuration via `madara.toml`
//!
//! Every field has a default, so an empty file is a valid configuration.
//! [`KnowledgeBaseConfig::default_toml`] is the commented template written
//! when a knowledge base is opened on a path with no config file.

use std::path::{Path, PathBuf};

use madara_durability::{
    BufferFilter, BufferFilterChain, CheckpointSettings, DEFAULT_BUFFER_SIZE,
};
use madara_storage::KnowledgeUpdateSettings;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::Level;
use uuid::Uuid;

/// Config file name
pub const CONFIG_FILE_NAME: &str = "madara.toml";

/// Longest originator that fits the on-disk headers
pub const MAX_ORIGINATOR_LEN: usize = 63;

/// Errors raised while reading, writing or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read or written
    #[error("config file '{path}': {source}")]
    Io {
        /// Path of the config file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for this schema
    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        /// Path of the config file
        path: PathBuf,
        /// Underlying TOML error
        #[source]
        source: toml::de::Error,
    },

    /// The config could not be serialized
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A field holds an unusable value
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// One buffer filter entry in the `[[filters]]` array
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FilterConfig {
    /// zstd compression
    Zstd {
        /// Compression level
        #[serde(default = "default_zstd_level")]
        level: i32,
    },
    /// AES-256-GCM with a key derived from `password`
    Aes256 {
        /// Password the key is derived from
        password: String,
    },
}

fn default_zstd_level() -> i32 {
    3
}

impl FilterConfig {
    /// Build the runtime filter
    pub fn to_filter(&self) -> BufferFilter {
        match self {
            FilterConfig::Zstd { level } => BufferFilter::zstd(*level),
            FilterConfig::Aes256 { password } => BufferFilter::aes256_password(password),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self {
            FilterConfig::Zstd { level } if !(1..=22).contains(level) => Err(
                ConfigError::Invalid(format!("zstd level {} is outside 1..=22", level)),
            ),
            FilterConfig::Aes256 { password } if password.is_empty() => Err(
                ConfigError::Invalid("aes256 filter needs a non-empty password".into()),
            ),
            _ => Ok(()),
        }
    }
}

/// Knowledge base configuration loaded from `madara.toml`
///
/// # Example
///
/// ```toml
/// originator = "sensor-node-1"
/// checkpoint_file = "kb.kkb"
/// prefixes = ["sensor."]
///
/// [[filters]]
/// kind = "zstd"
/// level = 3
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeBaseConfig {
    /// Identity written into checkpoint headers
    #[serde(default = "default_originator")]
    pub originator: String,
    /// Knowledge domain stamped into segment headers
    #[serde(default)]
    pub domain: String,
    /// Checkpoint file; `KnowledgeBase::open` resolves a relative path
    /// against its directory
    #[serde(default = "default_checkpoint_file")]
    pub checkpoint_file: PathBuf,
    /// Scratch buffer size for checkpoint reads and writes
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Log level for [`crate::logging::init`]
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Key prefixes to save and load (all keys if empty)
    #[serde(default)]
    pub prefixes: Vec<String>,
    /// Clear the context before loading a checkpoint
    #[serde(default)]
    pub clear_on_load: bool,
    /// Buffer filters, applied in order on save
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<FilterConfig>,
    /// Update arbitration and tracking
    #[serde(default)]
    pub update: KnowledgeUpdateSettings,
}

fn default_originator() -> String {
    format!("madara-{}", Uuid::new_v4())
}

fn default_checkpoint_file() -> PathBuf {
    PathBuf::from("madara.kkb")
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            originator: default_originator(),
            domain: String::new(),
            checkpoint_file: default_checkpoint_file(),
            buffer_size: default_buffer_size(),
            log_level: default_log_level(),
            prefixes: Vec::new(),
            clear_on_load: false,
            filters: Vec::new(),
            update: KnowledgeUpdateSettings::default(),
        }
    }
}

impl KnowledgeBaseConfig {
    /// Default config with the checkpoint file set
    pub fn new(checkpoint_file: impl Into<PathBuf>) -> Self {
        Self {
            checkpoint_file: checkpoint_file.into(),
            ..Default::default()
        }
    }

    /// Commented template written for new knowledge bases
    pub fn default_toml() -> &'static str {
        r#"# Madara knowledge base configuration
#
# Identity written into checkpoint headers (default: a random "madara-<uuid>")
# originator = "node-1"

# Checkpoint file used by save_context / save_checkpoint / load_context
checkpoint_file = "madara.kkb"

# Scratch buffer in bytes; one checkpoint segment must fit in it
buffer_size = 1024000

# trace, debug, info, warn or error
log_level = "info"

# Only keys starting with one of these prefixes are saved and loaded
prefixes = []

# Clear the knowledge base before loading a checkpoint
clear_on_load = false

# Buffer filters, applied in order on save and in reverse on load
# [[filters]]
# kind = "zstd"
# level = 3
#
# [[filters]]
# kind = "aes256"
# password = "change me"

# [update]
# always_overwrite = false
# track_local_changes = true
# clock_increment = 1
"#
    }

    /// Load and validate `path`
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: KnowledgeBaseConfig =
            toml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Write [`default_toml`](Self::default_toml) to `path` unless a file is already there
    pub fn write_default_if_missing(path: &Path) -> Result<(), ConfigError> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        }
        Ok(())
    }

    /// Save this config as TOML, replacing `path`
    pub fn write_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parsed log level
    pub fn level(&self) -> Result<Level, ConfigError> {
        self.log_level.parse::<Level>().map_err(|_| {
            ConfigError::Invalid(format!(
                "log_level '{}' is not one of trace, debug, info, warn, error",
                self.log_level
            ))
        })
    }

    /// Filter chain built from `filters`
    pub fn filter_chain(&self) -> BufferFilterChain {
        self.filters.iter().map(FilterConfig::to_filter).collect::<Vec<_>>().into()
    }

    /// Checkpoint settings for the configured file
    pub fn checkpoint_settings(&self) -> CheckpointSettings {
        CheckpointSettings::new(&self.checkpoint_file)
            .with_buffer_size(self.buffer_size)
            .with_prefixes(self.prefixes.iter().cloned())
            .with_originator(self.originator.clone())
            .with_domain(self.domain.clone())
            .with_clear_knowledge(self.clear_on_load)
            .with_filters(self.filter_chain())
    }

    /// Validate every field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.originator.len() > MAX_ORIGINATOR_LEN {
            return Err(ConfigError::Invalid(format!(
                "originator is {} bytes, at most {} fit",
                self.originator.len(),
                MAX_ORIGINATOR_LEN
            )));
        }
        self.level()?;
        for filter in &self.filters {
            filter.validate()?;
        }
        self.update
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.checkpoint_settings()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}
