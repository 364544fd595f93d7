//! Logger module
//!
//! Provides logging utilities for the framework including:
//! - Subscriber setup from configuration
//! - Dispatch diagnostics, errors and warnings
//! - Access logging with multiple formats

mod format;

pub use format::AccessLogEntry;

use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::{Error, Result};

static ACCESS_LOG: OnceLock<AccessLogSettings> = OnceLock::new();

#[derive(Debug, Clone)]
struct AccessLogSettings {
    enabled: bool,
    format: String,
}

/// Initialize the logger with configuration
///
/// Should be called once at application startup. `RUST_LOG` overrides the
/// configured level.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| Error::Logger(e.to_string()))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| Error::Logger(e.to_string()))?;

    configure_access_log(config);
    log_info(&format!("Log level: {}", config.level));
    if config.access_log {
        log_info(&format!("Access log format: {}", config.access_log_format));
    }
    Ok(())
}

/// Remember the access log settings; the first call wins
pub fn configure_access_log(config: &LoggingConfig) {
    let settings = AccessLogSettings {
        enabled: config.access_log,
        format: config.access_log_format.clone(),
    };
    if ACCESS_LOG.set(settings).is_err() {
        log_debug("Access log already configured, keeping the first settings");
    }
}

/// Configured access log format, `None` while access logging is off
pub fn access_log_format() -> Option<&'static str> {
    ACCESS_LOG
        .get()
        .filter(|settings| settings.enabled)
        .map(|settings| settings.format.as_str())
}

pub fn log_debug(message: &str) {
    tracing::debug!("{message}");
}

pub fn log_info(message: &str) {
    tracing::info!("{message}");
}

pub fn log_warning(message: &str) {
    tracing::warn!("{message}");
}

pub fn log_error(message: &str) {
    tracing::error!("{message}");
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    tracing::info!(target: "trellis::access", "{}", entry.format(format));
}
