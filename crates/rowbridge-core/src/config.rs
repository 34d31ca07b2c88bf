//! Bridge configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Timing and naming for the bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Name advertised to clients
    pub device_name: String,
    /// Keepalive interval for a subscribed client that receives no telemetry
    pub notify_timeout: Duration,
    /// Pause after registering a service before the next one
    pub service_settle: Duration,
    /// Pause after stopping the wireless stack before reacquiring it
    pub reset_settle: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            device_name: "rowbridge".to_string(),
            notify_timeout: Duration::from_secs(4),
            service_settle: Duration::from_secs(1),
            reset_settle: Duration::from_secs(5),
        }
    }
}

impl BridgeConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the advertised device name
    pub fn with_device_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = name.into();
        self
    }

    /// Set the notify keepalive timeout
    pub fn with_notify_timeout(mut self, timeout: Duration) -> Self {
        self.notify_timeout = timeout;
        self
    }

    /// Set the per-service settling delay
    pub fn with_service_settle(mut self, settle: Duration) -> Self {
        self.service_settle = settle;
        self
    }

    /// Set the reset settling delay
    pub fn with_reset_settle(mut self, settle: Duration) -> Self {
        self.reset_settle = settle;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.device_name, "rowbridge");
        assert_eq!(config.notify_timeout, Duration::from_secs(4));
        assert_eq!(config.service_settle, Duration::from_secs(1));
        assert_eq!(config.reset_settle, Duration::from_secs(5));
    }

    #[test]
    fn test_builder() {
        let config = BridgeConfig::new()
            .with_device_name("erg")
            .with_notify_timeout(Duration::from_millis(500))
            .with_reset_settle(Duration::ZERO);
        assert_eq!(config.device_name, "erg");
        assert_eq!(config.notify_timeout, Duration::from_millis(500));
        assert_eq!(config.reset_settle, Duration::ZERO);
        assert_eq!(config.service_settle, Duration::from_secs(1));
    }
}
