// Logging module for structured logging using the tracing crate

use tracing::Span;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::security::sanitize_for_log;

/// Logging setup error types
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("Failed to install subscriber: {0}")]
    InitError(String),
}

/// Initialize the tracing subscriber for structured logging
///
/// The subscriber is configured with:
/// - JSON lines (default) or human-readable output on stdout
/// - An `EnvFilter` taken from RUST_LOG, falling back to `config.level`
///
/// # Errors
///
/// Returns an error if the filter does not parse or a global subscriber is
/// already installed.
pub fn init_subscriber(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = build_filter(config)?;

    let json = config.json.then(|| fmt::layer().json().with_current_span(true));
    let pretty = (!config.json).then(fmt::layer);

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(pretty)
        .try_init()
        .map_err(|e| LoggingError::InitError(e.to_string()))
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level).map_err(|e| LoggingError::InvalidFilter {
        filter: config.level.clone(),
        reason: e.to_string(),
    })
}

/// Span for resolving one request path
#[inline]
pub fn request_span(path: &str) -> Span {
    tracing::info_span!("request", path = %sanitize_for_log(path))
}
