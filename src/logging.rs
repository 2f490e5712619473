//! Tracing subscriber setup for the binary.

use std::io;

use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;
use crate::error::{DispatchError, Result};

/// Builds the filter: `RUST_LOG` when set, the configured level otherwise.
///
/// # Errors
///
/// Returns [`DispatchError::Configuration`] if the configured level is not a
/// valid filter directive.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level)
        .map_err(|e| DispatchError::configuration("logging.level", e.to_string()))
}

/// Installs the global subscriber. Output goes to stderr so stdout stays
/// reserved for the tick report.
///
/// # Errors
///
/// Returns [`DispatchError::Configuration`] for an invalid level or when a
/// global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(config)?;

    let base = fmt::layer().with_writer(io::stderr).with_target(false);
    let layer = if config.json {
        base.json().boxed()
    } else {
        base.boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
        .map_err(|e| DispatchError::configuration("logging", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_level_is_rejected() {
        let cfg = LoggingConfig {
            level: "dispatch=loud".to_string(),
            json: false,
        };
        if std::env::var_os("RUST_LOG").is_none() {
            assert!(build_filter(&cfg).is_err());
        }
    }

    #[test]
    fn default_level_builds() {
        assert!(build_filter(&LoggingConfig::default()).is_ok());
    }
}
