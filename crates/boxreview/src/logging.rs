//! Process-wide log setup.
//!
//! Library code logs through the `log` facade; `init` installs a
//! `tracing-subscriber` registry that also receives those records.

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};
use crate::error::BoxReviewError;

/// Installs the global subscriber. Fails if one is already installed.
pub fn init(config: &LoggingConfig) -> Result<(), BoxReviewError> {
    let filter = EnvFilter::try_new(&config.level).map_err(|e| {
        BoxReviewError::Logging(format!("invalid filter '{}': {}", config.level, e))
    })?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.format {
        LogFormat::Text => registry.with(fmt::layer().with_target(true)).try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(false))
            .try_init(),
    };

    result.map_err(|e| BoxReviewError::Logging(e.to_string()))?;
    tracing::debug!(level = %config.level, format = ?config.format, "logging initialized");
    Ok(())
}
