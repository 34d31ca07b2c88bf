//! Emulated GATT profiles
//!
//! The bridge exposes the rower as three standard sensors: a cycling power
//! meter, a running speed & cadence pod and a heart rate monitor. Each entry
//! here is a service UUID, its characteristic table and the transform that
//! fills the Notify payload from a [`Status`].
//!
//! All multi-byte fields are little-endian, as the Bluetooth SIG profiles
//! require.

use std::fmt;

use uuid::Uuid;

use crate::characteristic::{CharacteristicSpec, Transform};
use crate::status::Status;

// ----------------------------------------------------------------------------
// UUIDs
// ----------------------------------------------------------------------------

/// Expands a 16-bit SIG assigned number onto the Bluetooth base UUID
pub const fn bluetooth_uuid(short: u16) -> Uuid {
    Uuid::from_u128(((short as u128) << 96) | 0x0000_0000_0000_1000_8000_0080_5f9b_34fb)
}

/// Cycling Power Service (0x1818)
pub const CYCLING_POWER_SERVICE_UUID: Uuid = bluetooth_uuid(0x1818);
/// Cycling Power Measurement (0x2A63)
pub const CYCLING_POWER_MEASUREMENT_UUID: Uuid = bluetooth_uuid(0x2A63);
/// Cycling Power Feature (0x2A65)
pub const CYCLING_POWER_FEATURE_UUID: Uuid = bluetooth_uuid(0x2A65);
/// Sensor Location (0x2A5D)
pub const SENSOR_LOCATION_UUID: Uuid = bluetooth_uuid(0x2A5D);

/// Running Speed and Cadence Service (0x1814)
pub const RSC_SERVICE_UUID: Uuid = bluetooth_uuid(0x1814);
/// RSC Measurement (0x2A53)
pub const RSC_MEASUREMENT_UUID: Uuid = bluetooth_uuid(0x2A53);
/// RSC Feature (0x2A54)
pub const RSC_FEATURE_UUID: Uuid = bluetooth_uuid(0x2A54);

/// Heart Rate Service (0x180D)
pub const HEART_RATE_SERVICE_UUID: Uuid = bluetooth_uuid(0x180D);
/// Heart Rate Measurement (0x2A37)
pub const HEART_RATE_MEASUREMENT_UUID: Uuid = bluetooth_uuid(0x2A37);
/// Body Sensor Location (0x2A38)
pub const BODY_SENSOR_LOCATION_UUID: Uuid = bluetooth_uuid(0x2A38);

// ----------------------------------------------------------------------------
// Sensor Profile
// ----------------------------------------------------------------------------

/// Static description of one emulated sensor
#[derive(Clone)]
pub struct SensorProfile {
    pub name: String,
    pub uuid: Uuid,
    pub characteristics: Vec<CharacteristicSpec>,
    pub transform: Transform,
}

impl SensorProfile {
    pub fn new(
        name: impl Into<String>,
        uuid: Uuid,
        characteristics: Vec<CharacteristicSpec>,
        transform: Transform,
    ) -> Self {
        Self {
            name: name.into(),
            uuid,
            characteristics,
            transform,
        }
    }

    /// Cycling power meter reporting rowing power, with strokes counted as
    /// crank revolutions
    pub fn cycling_power() -> Self {
        Self::new(
            "Cycling Power",
            CYCLING_POWER_SERVICE_UUID,
            vec![
                // flags 0x0020: crank revolution data present
                CharacteristicSpec::notify(
                    CYCLING_POWER_MEASUREMENT_UUID,
                    vec![0x20, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
                ),
                // bit 3: crank revolution data supported
                CharacteristicSpec::read(CYCLING_POWER_FEATURE_UUID, vec![0x08, 0x00, 0x00, 0x00]),
                CharacteristicSpec::read(SENSOR_LOCATION_UUID, vec![0x00]),
            ],
            cycling_power_measurement,
        )
    }

    /// Footpod reporting boat speed, stroke rate and distance
    pub fn running_speed_cadence() -> Self {
        Self::new(
            "Running Speed and Cadence",
            RSC_SERVICE_UUID,
            vec![
                // flags 0x02: total distance present
                CharacteristicSpec::notify(
                    RSC_MEASUREMENT_UUID,
                    vec![0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
                ),
                CharacteristicSpec::read(RSC_FEATURE_UUID, vec![0x02, 0x00]),
            ],
            rsc_measurement,
        )
    }

    /// Heart rate monitor relaying the strap paired with the rower
    pub fn heart_rate() -> Self {
        Self::new(
            "Heart Rate",
            HEART_RATE_SERVICE_UUID,
            vec![
                CharacteristicSpec::notify(HEART_RATE_MEASUREMENT_UUID, vec![0x00, 0x00]),
                // 0x01: chest
                CharacteristicSpec::read(BODY_SENSOR_LOCATION_UUID, vec![0x01]),
            ],
            heart_rate_measurement,
        )
    }
}

impl fmt::Debug for SensorProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SensorProfile")
            .field("name", &self.name)
            .field("uuid", &self.uuid)
            .field("characteristics", &self.characteristics)
            .finish_non_exhaustive()
    }
}

/// The fixed profile table, in registration order
pub fn standard_profiles() -> Vec<SensorProfile> {
    vec![
        SensorProfile::cycling_power(),
        SensorProfile::running_speed_cadence(),
        SensorProfile::heart_rate(),
    ]
}

// ----------------------------------------------------------------------------
// Transforms
// ----------------------------------------------------------------------------

fn put(payload: &mut [u8], offset: usize, bytes: &[u8]) {
    if let Some(field) = payload.get_mut(offset..offset + bytes.len()) {
        field.copy_from_slice(bytes);
    }
}

/// Scales and saturates a float reading; negative and NaN become 0
fn scaled(value: f32, scale: f32) -> f64 {
    let scaled = (value as f64 * scale as f64).round();
    if scaled.is_nan() || scaled < 0.0 {
        0.0
    } else {
        scaled
    }
}

/// Converts elapsed milliseconds into the 1/1024 s event clock, wrapping
fn event_time_1024(elapsed_ms: u64) -> u16 {
    ((elapsed_ms as u128 * 1024 / 1000) & 0xFFFF) as u16
}

/// Cycling Power Measurement: power i16 @2, crank revs u16 @4, last crank
/// event time u16 @6
pub fn cycling_power_measurement(status: &Status, mut payload: Vec<u8>) -> Vec<u8> {
    let power = status.power.min(i16::MAX as u16) as i16;
    put(&mut payload, 2, &power.to_le_bytes());
    put(&mut payload, 4, &status.stroke_count.to_le_bytes());
    put(&mut payload, 6, &event_time_1024(status.elapsed_ms).to_le_bytes());
    payload
}

/// RSC Measurement: speed u16 (1/256 m/s) @1, cadence u8 @3, total distance
/// u32 (1/10 m) @4
pub fn rsc_measurement(status: &Status, mut payload: Vec<u8>) -> Vec<u8> {
    let speed = scaled(status.speed, 256.0).min(u16::MAX as f64) as u16;
    let distance = scaled(status.distance, 10.0).min(u32::MAX as f64) as u32;
    put(&mut payload, 1, &speed.to_le_bytes());
    put(&mut payload, 3, &[status.cadence]);
    put(&mut payload, 4, &distance.to_le_bytes());
    payload
}

/// Heart Rate Measurement: bpm u8 @1
pub fn heart_rate_measurement(status: &Status, mut payload: Vec<u8>) -> Vec<u8> {
    put(&mut payload, 1, &[status.heart_rate]);
    payload
}
