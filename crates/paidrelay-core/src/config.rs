//! Engine configuration loading and management.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::CoreError;

/// Full configuration for the relay engine and sweeper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    /// Relay attempt settings.
    #[serde(default)]
    pub relay: RelayConfig,

    /// Settlement sweeper settings.
    #[serde(default)]
    pub sweeper: SweeperConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// What to do when the node refuses a payment dispatch outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DispatchErrorPolicy {
    /// Absorb every dispatch error and go on to look the payment up.
    #[default]
    AlwaysDefer,
    /// Fail the relay when the node rejected the dispatch synchronously.
    FailOnRejection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Blocks added to the caller's final CLTV delta when probing.
    #[serde(default = "default_cltv_delta_buffer")]
    pub cltv_delta_buffer: u32,
    /// Upper bound on a route probe, in seconds.
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    /// Refuse to hold an incoming payment longer than this many blocks.
    #[serde(default = "default_max_hold_blocks")]
    pub max_hold_blocks: u32,
    /// Refuse to relay with fewer blocks than this left on the hold.
    #[serde(default = "default_min_hold_blocks")]
    pub min_hold_blocks: u32,
    /// Blocks the hold must outlive the outgoing route by.
    #[serde(default = "default_min_cltv_gap")]
    pub min_cltv_gap: u32,
    #[serde(default)]
    pub dispatch_error_policy: DispatchErrorPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweeperConfig {
    /// Held invoices with fewer blocks left than this are canceled.
    #[serde(default = "default_cancel_threshold_blocks")]
    pub cancel_threshold_blocks: u32,
    /// Invoices older than this many seconds are considered resolved and not scanned.
    #[serde(default = "default_invoice_max_age_secs")]
    pub invoice_max_age_secs: u64,
    /// Invoices requested per listing page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Most invoices resolved against the node at once.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: u32,
    /// Pause between sweeps, in seconds.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or an `EnvFilter` directive.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_cltv_delta_buffer() -> u32 {
    6
}
fn default_probe_timeout_secs() -> u64 {
    30 * 60
}
fn default_max_hold_blocks() -> u32 {
    2016
}
fn default_min_hold_blocks() -> u32 {
    50
}
fn default_min_cltv_gap() -> u32 {
    70
}
fn default_cancel_threshold_blocks() -> u32 {
    15
}
fn default_invoice_max_age_secs() -> u64 {
    30 * 24 * 60 * 60
}
fn default_page_size() -> u32 {
    100
}
fn default_max_concurrency() -> u32 {
    8
}
fn default_interval_secs() -> u64 {
    60
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            cltv_delta_buffer: default_cltv_delta_buffer(),
            probe_timeout_secs: default_probe_timeout_secs(),
            max_hold_blocks: default_max_hold_blocks(),
            min_hold_blocks: default_min_hold_blocks(),
            min_cltv_gap: default_min_cltv_gap(),
            dispatch_error_policy: DispatchErrorPolicy::default(),
        }
    }
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            cancel_threshold_blocks: default_cancel_threshold_blocks(),
            invoice_max_age_secs: default_invoice_max_age_secs(),
            page_size: default_page_size(),
            max_concurrency: default_max_concurrency(),
            interval_secs: default_interval_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl RelayConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

impl SweeperConfig {
    /// Saturates instead of overflowing for absurdly large settings.
    pub fn invoice_max_age(&self) -> chrono::Duration {
        i64::try_from(self.invoice_max_age_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl EngineConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: EngineConfig = toml::from_str(&contents)?;
            config.validate()?;
            tracing::info!(path = %path.display(), "loaded engine config");
            Ok(config)
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Save the current config to a TOML file.
    pub fn save(&self, path: &Path) -> Result<(), CoreError> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.relay.min_hold_blocks > self.relay.max_hold_blocks {
            return Err(CoreError::InvalidConfig(format!(
                "relay.min_hold_blocks ({}) exceeds relay.max_hold_blocks ({})",
                self.relay.min_hold_blocks, self.relay.max_hold_blocks
            )));
        }
        if self.relay.probe_timeout_secs == 0 {
            return Err(CoreError::InvalidConfig(
                "relay.probe_timeout_secs must be positive".into(),
            ));
        }
        if self.sweeper.page_size == 0 {
            return Err(CoreError::InvalidConfig(
                "sweeper.page_size must be positive".into(),
            ));
        }
        if self.sweeper.max_concurrency == 0 {
            return Err(CoreError::InvalidConfig(
                "sweeper.max_concurrency must be positive".into(),
            ));
        }
        if self.sweeper.interval_secs == 0 {
            return Err(CoreError::InvalidConfig(
                "sweeper.interval_secs must be positive".into(),
            ));
        }
        match self.logging.format.as_str() {
            "text" | "json" => Ok(()),
            other => Err(CoreError::InvalidConfig(format!(
                "logging.format must be text or json, got {other}"
            ))),
        }
    }
}
