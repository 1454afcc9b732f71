//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::CoreError;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the configured level. Fails instead of panicking when
/// a subscriber is already installed.
pub fn init(config: &LoggingConfig) -> Result<(), CoreError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| CoreError::Telemetry(format!("invalid log level {}: {e}", config.level)))?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let result = match config.format.as_str() {
        "json" => builder.json().try_init(),
        _ => builder.try_init(),
    };

    result.map_err(|e| CoreError::Telemetry(e.to_string()))
}
