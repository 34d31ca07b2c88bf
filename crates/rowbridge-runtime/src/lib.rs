//! rowbridge Runtime
//!
//! This crate drives the bridge:
//! - [`telemetry`]: the `TelemetrySource` abstraction, a simulated rower and a
//!   JSON-lines reader
//! - [`supervisor`]: the reset-and-reconnect loop that owns the radio, the
//!   telemetry connection and the registered sensors
//!
//! `rowbridge-core` defines the data and `rowbridge-ble` puts it on the air;
//! this crate decides when.

pub mod supervisor;
pub mod telemetry;

pub use supervisor::{ShutdownHandle, Supervisor, SupervisorError};
pub use telemetry::{
    JsonLinesSource, SimulatedRower, TelemetrySender, TelemetrySource, TelemetryStream,
};
