//! Structured logging with tracing.
//!
//! Installs a `tracing-subscriber` registry writing to stderr, so stdout
//! stays reserved for command output. `DOCSIFT_LOG` (an `EnvFilter`
//! directive such as `docsift=debug`) overrides the configured level.

use anyhow::{anyhow, bail, Result};
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::LoggingConfig;

pub const LOG_ENV_VAR: &str = "DOCSIFT_LOG";

/// Initialize logging once per process.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let level = parse_log_level(&config.level)?;
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let registry = Registry::default().with(filter);
    let installed = if config.json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            )
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false),
            )
            .try_init()
    };
    installed.map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    tracing::debug!(level = %level, json = config.json, "logging initialized");
    Ok(())
}

/// Parse a log level name.
pub fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => bail!(
            "Invalid log level: {}. Use trace, debug, info, warn, or error",
            level
        ),
    }
}
