//! rowbridge CLI Configuration
//!
//! Settings come from, in increasing priority: built-in defaults, an optional
//! TOML file, command-line flags. Durations are plain milliseconds in the
//! file so it stays hand-editable:
//!
//! ```toml
//! device_name = "erg"
//! source = "stdin"
//! radio = "memory"
//! notify_timeout_ms = 4000
//! ```

use std::path::Path;
use std::time::Duration;

use clap::ValueEnum;
use rowbridge_core::BridgeConfig;
use serde::{Deserialize, Serialize};

use crate::cli::Cli;
use crate::error::{CliError, Result};

/// Telemetry source selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Built-in simulated rowing session
    #[default]
    Simulated,
    /// One JSON status per line on standard input
    Stdin,
}

/// Wireless host stack selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RadioKind {
    /// BlueZ on Linux, in-memory elsewhere
    #[default]
    Platform,
    /// In-memory host; nothing is broadcast
    Memory,
}

/// Complete configuration for the rowbridge binary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub device_name: String,
    pub source: SourceKind,
    pub radio: RadioKind,
    /// Simulated rower update interval
    pub interval_ms: u64,
    pub notify_timeout_ms: u64,
    pub service_settle_ms: u64,
    pub reset_settle_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        let bridge = BridgeConfig::default();
        Self {
            device_name: bridge.device_name,
            source: SourceKind::default(),
            radio: RadioKind::default(),
            interval_ms: 500,
            notify_timeout_ms: bridge.notify_timeout.as_millis() as u64,
            service_settle_ms: bridge.service_settle.as_millis() as u64,
            reset_settle_ms: bridge.reset_settle.as_millis() as u64,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file; missing keys keep their defaults
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides
    pub fn with_overrides(mut self, cli: &Cli) -> Result<Self> {
        if let Some(name) = &cli.name {
            self.device_name = name.clone();
        }
        if let Some(source) = cli.source {
            self.source = source;
        }
        if let Some(radio) = cli.radio {
            self.radio = radio;
        }
        if let Some(interval_ms) = cli.interval_ms {
            self.interval_ms = interval_ms;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.device_name.is_empty() {
            return Err(CliError::Config("device name must not be empty".to_string()));
        }
        if self.interval_ms == 0 {
            return Err(CliError::Config("interval must be at least 1 ms".to_string()));
        }
        if self.notify_timeout_ms == 0 {
            return Err(CliError::Config(
                "notify timeout must be at least 1 ms".to_string(),
            ));
        }
        if self.reset_settle_ms == 0 {
            return Err(CliError::Config(
                "reset settle must be at least 1 ms".to_string(),
            ));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Timing and naming handed to the supervisor
    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig::new()
            .with_device_name(self.device_name.clone())
            .with_notify_timeout(Duration::from_millis(self.notify_timeout_ms))
            .with_service_settle(Duration::from_millis(self.service_settle_ms))
            .with_reset_settle(Duration::from_millis(self.reset_settle_ms))
    }
}
