//! rowbridge Core
//!
//! This crate provides the platform-independent building blocks of the rowbridge
//! sensor bridge:
//!
//! - [`Status`]: one telemetry snapshot produced by the rowing machine
//! - [`characteristic`]: characteristic specs, behaviors and payload transforms
//! - [`profiles`]: the fixed table of emulated GATT profiles
//! - [`channel`]: per-sensor status channels and the non-blocking fan-out
//! - [`config`]: bridge timing configuration
//! - [`errors`]: the error taxonomy shared by every rowbridge crate
//!
//! Nothing in here touches a radio or a telemetry device; see `rowbridge-ble`
//! and `rowbridge-runtime` for that.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod channel;
pub mod characteristic;
pub mod config;
pub mod errors;
pub mod profiles;
pub mod status;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use channel::{
    create_status_channel, ChannelStats, Delivery, FanOut, StatusReceiver, StatusSender,
};
pub use characteristic::{
    resolve_characteristics, Behavior, Characteristic, CharacteristicKind, CharacteristicSpec,
    Transform,
};
pub use config::BridgeConfig;
pub use errors::{AdapterError, ConfigurationError, ConnectionError, HostError, NotifyWriteError};
pub use profiles::{standard_profiles, SensorProfile};
pub use status::Status;
