//! Global log subscriber
//!
//! Library code only emits `tracing` events. Applications call [`init`] once
//! at startup to print them; `RUST_LOG` overrides the configured level.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{ConfigError, KnowledgeBaseConfig};

/// Install a formatting subscriber for `madara` targets at `level`
///
/// Returns `Ok(false)` if a global subscriber was already installed.
pub fn init(level: &str) -> Result<bool, ConfigError> {
    let level: tracing::Level = level
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("unknown log level '{}'", level)))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("madara={}", level)));

    Ok(tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
        .is_ok())
}

/// [`init`] at the level named in `config`
pub fn init_from_config(config: &KnowledgeBaseConfig) -> Result<bool, ConfigError> {
    init(&config.log_level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_level() {
        assert!(init("chatty").is_err());
    }

    #[test]
    fn second_init_reports_existing_subscriber() {
        // The first call may lose to another test in this binary
        init("debug").unwrap();
        assert!(!init("info").unwrap());
    }
}
