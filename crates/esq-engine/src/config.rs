//! Engine configuration.
//!
//! One serde-deserializable struct loadable from TOML, with defaults
//! matching the backend's expected cadences. The binary layers CLI
//! overrides on top.

use std::time::Duration;

use serde::Deserialize;

use esq_api::ApiConfig;
use esq_core::SortSpec;
use esq_store::StoreConfig;
use esq_stream::{ChannelConfig, ReconnectPolicy};

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// File did not parse as TOML of the expected shape.
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Full engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Backend REST base URL.
    pub base_url: String,

    /// Backend push-channel endpoint.
    pub ws_url: String,

    /// Seconds between periodic snapshot fetches.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Seconds between SLA reclassification ticks.
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,

    /// Per-request timeout for REST calls, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Consecutive snapshot misses before a record is dropped.
    #[serde(default = "default_snapshot_miss_allowance")]
    pub snapshot_miss_allowance: u32,

    /// How long resolved/closed records stay visible, in seconds.
    /// Absent means for the rest of the session.
    #[serde(default)]
    pub terminal_grace_secs: Option<u64>,

    /// Base reconnect backoff delay, in milliseconds.
    #[serde(default = "default_reconnect_base_ms")]
    pub reconnect_base_ms: u64,

    /// Maximum reconnect backoff delay, in milliseconds.
    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_ms: u64,

    /// Initial queue ordering.
    #[serde(default)]
    pub sort: SortSpec,
}

const fn default_poll_interval_secs() -> u64 {
    15
}

const fn default_tick_interval_secs() -> u64 {
    60
}

const fn default_request_timeout_secs() -> u64 {
    10
}

const fn default_snapshot_miss_allowance() -> u32 {
    2
}

const fn default_reconnect_base_ms() -> u64 {
    1_000
}

const fn default_reconnect_max_ms() -> u64 {
    30_000
}

impl EngineConfig {
    /// Parse a TOML document.
    ///
    /// # Errors
    /// Returns `ConfigError::Parse` for malformed or mistyped TOML.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Load from a TOML file.
    ///
    /// # Errors
    /// Returns `ConfigError::Io` when unreadable, `ConfigError::Parse`
    /// when malformed.
    pub fn from_path(path: &std::path::Path) -> Result<Self, ConfigError> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    /// REST client settings.
    #[must_use]
    pub fn api(&self) -> ApiConfig {
        ApiConfig::new(self.base_url.clone())
            .with_request_timeout(Duration::from_secs(self.request_timeout_secs))
    }

    /// Push-channel settings.
    #[must_use]
    pub fn channel(&self) -> ChannelConfig {
        ChannelConfig::new(self.ws_url.clone()).with_reconnect(
            ReconnectPolicy::new()
                .with_base_delay_ms(self.reconnect_base_ms)
                .with_max_delay_ms(self.reconnect_max_ms),
        )
    }

    /// Store policy.
    #[must_use]
    pub fn store(&self) -> StoreConfig {
        StoreConfig {
            snapshot_miss_allowance: self.snapshot_miss_allowance,
            terminal_grace: self
                .terminal_grace_secs
                .and_then(|secs| chrono::Duration::try_seconds(secs.try_into().ok()?)),
        }
    }

    /// Periodic fetch cadence.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// SLA tick cadence.
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }
}
