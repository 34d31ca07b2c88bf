//! Error types for rowbridge
//!
//! Only [`AdapterError`] and [`ConfigurationError`] ever leave the component
//! that produced them. The others are absorbed locally and drive recovery: a
//! [`ConnectionError`] or [`HostError`] triggers a supervisor reset, and a
//! [`NotifyWriteError`] ends a single subscription.

use thiserror::Error;
use uuid::Uuid;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// The radio handle could not be obtained. Fatal.
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("Wireless session unavailable: {0}")]
    SessionUnavailable(String),

    #[error("BLE adapter not available: {0}")]
    AdapterNotAvailable(String),

    #[error("Failed to power on adapter: {0}")]
    PowerOnFailed(String),
}

/// The telemetry source could not be reached. Recoverable.
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Telemetry device not found: {0}")]
    DeviceNotFound(String),

    #[error("Telemetry source exhausted")]
    Exhausted,

    #[error("Telemetry I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A sensor definition that cannot be turned into a GATT service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Unknown characteristic function '{function}' on {characteristic}")]
    UnknownFunction {
        characteristic: Uuid,
        function: String,
    },

    #[error("Sensor '{sensor}' has no characteristics")]
    NoCharacteristics { sensor: String },

    #[error("Sensor '{sensor}' has no Notify characteristic")]
    MissingNotify { sensor: String },

    #[error("Sensor '{sensor}' declares more than one Notify characteristic")]
    DuplicateNotify { sensor: String },
}

/// The wireless stack rejected a registration or advertisement. Recoverable.
#[derive(Error, Debug)]
pub enum HostError {
    #[error("Failed to register GATT service {service}: {reason}")]
    RegistrationFailed { service: Uuid, reason: String },

    #[error("Failed to start advertising: {0}")]
    AdvertisingFailed(String),

    #[error("Adapter already released")]
    Released,
}

/// A subscribed client could not be written to; treated as a disconnect.
#[derive(Error, Debug)]
pub enum NotifyWriteError {
    #[error("Client unreachable: {0}")]
    ClientUnreachable(String),

    #[error("Subscription closed")]
    Closed,
}
