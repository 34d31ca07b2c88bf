//! GATT peripheral layer for rowbridge
//!
//! This crate turns the profile table from `rowbridge-core` into live GATT
//! services on a wireless host stack.
//!
//! ## Architecture
//!
//! - [`host`] - The wireless host stack seam: `Radio`, `PeripheralAdapter`, `Notifier`
//! - [`sensor`] - One GATT service built from a `SensorProfile`
//! - [`notify`] - The per-subscription notify state machine
//! - [`registry`] - The ordered set of sensors plus the telemetry fan-out
//! - [`memory`] - In-process backend used by tests and unsupported platforms
//! - `bluez` - BlueZ backend via `bluer` (Linux only)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rowbridge_ble::{PlatformRadio, Radio, Sensors};
//! use rowbridge_core::{standard_profiles, BridgeConfig, Status};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BridgeConfig::default();
//! let radio = PlatformRadio::new();
//! let mut adapter = radio.acquire(&config.device_name).await?;
//!
//! let sensors = Sensors::register(adapter.as_mut(), &standard_profiles(), &config).await?;
//! adapter.advertise(&config.device_name, &sensors.identifiers()).await?;
//!
//! sensors.distribute(Status::with_power(150));
//! # Ok(())
//! # }
//! ```

#[cfg(target_os = "linux")]
pub mod bluez;
mod error;
pub mod host;
pub mod memory;
pub mod notify;
mod platform;
pub mod registry;
pub mod sensor;

// Public API exports
pub use error::RegistrationError;
pub use host::{
    CharacteristicHandler, GattCharacteristic, NotifyHandler, Notifier, PeripheralAdapter, Radio,
    ServiceDefinition,
};
pub use memory::{MemoryRadio, MemorySubscription};
pub use notify::{NotifyExit, NotifyFeed};
pub use platform::PlatformRadio;
pub use registry::Sensors;
pub use sensor::Sensor;
