//! Telemetry snapshot produced by the rowing machine

use serde::{Deserialize, Serialize};

/// One telemetry snapshot.
///
/// A `Status` is produced once by the telemetry source and moved, never
/// shared, into each sensor channel that accepts it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Status {
    /// Milliseconds since the workout started
    pub elapsed_ms: u64,
    /// Instantaneous power in watts
    pub power: u16,
    /// Boat speed in metres per second
    pub speed: f32,
    /// Stroke rate in strokes per minute
    pub cadence: u8,
    /// Strokes taken since the workout started
    pub stroke_count: u16,
    /// Distance rowed in metres
    pub distance: f32,
    /// Heart rate in beats per minute, 0 when no strap is paired
    pub heart_rate: u8,
}

impl Status {
    /// Snapshot carrying only a power reading
    pub fn with_power(power: u16) -> Self {
        Self {
            power,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_default_to_zero() {
        let status: Status = serde_json::from_str(r#"{"power": 150, "cadence": 24}"#).unwrap();
        assert_eq!(status.power, 150);
        assert_eq!(status.cadence, 24);
        assert_eq!(status.heart_rate, 0);
        assert_eq!(status.elapsed_ms, 0);
    }

    #[test]
    fn test_with_power() {
        let status = Status::with_power(210);
        assert_eq!(status.power, 210);
        assert_eq!(status.stroke_count, 0);
    }
}
