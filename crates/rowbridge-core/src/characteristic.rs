//! Characteristic specs, behaviors and payload transforms
//!
//! A profile table describes each characteristic with a textual function name
//! (`"Notify"` or `"Read"`). [`resolve_characteristics`] turns that table into
//! the tagged [`Behavior`] variant the wireless layer dispatches on, rejecting
//! anything it does not recognise before a single service is registered.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ConfigurationError;
use crate::status::Status;

// ----------------------------------------------------------------------------
// Transform
// ----------------------------------------------------------------------------

/// Encodes a status into a characteristic payload.
///
/// The second argument is an owned copy of the default payload; the stored
/// template is never handed out mutably.
pub type Transform = fn(&Status, Vec<u8>) -> Vec<u8>;

// ----------------------------------------------------------------------------
// Characteristic Kind
// ----------------------------------------------------------------------------

/// How a characteristic is accessed by a client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CharacteristicKind {
    Notify,
    Read,
}

impl FromStr for CharacteristicKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "notify" => Ok(Self::Notify),
            "read" => Ok(Self::Read),
            _ => Err(s.to_string()),
        }
    }
}

impl fmt::Display for CharacteristicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Notify => write!(f, "Notify"),
            Self::Read => write!(f, "Read"),
        }
    }
}

// ----------------------------------------------------------------------------
// Characteristic Spec
// ----------------------------------------------------------------------------

/// One row of a profile table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacteristicSpec {
    pub uuid: Uuid,
    /// Access function name, matched case-insensitively
    pub function: String,
    /// Default payload for Notify, static value for Read
    pub payload: Vec<u8>,
}

impl CharacteristicSpec {
    pub fn new(uuid: Uuid, function: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            uuid,
            function: function.into(),
            payload: payload.into(),
        }
    }

    pub fn notify(uuid: Uuid, default_payload: impl Into<Vec<u8>>) -> Self {
        Self::new(uuid, CharacteristicKind::Notify.to_string(), default_payload)
    }

    pub fn read(uuid: Uuid, payload: impl Into<Vec<u8>>) -> Self {
        Self::new(uuid, CharacteristicKind::Read.to_string(), payload)
    }

    /// Parse the function name
    pub fn kind(&self) -> Result<CharacteristicKind, ConfigurationError> {
        self.function
            .parse()
            .map_err(|function| ConfigurationError::UnknownFunction {
                characteristic: self.uuid,
                function,
            })
    }
}

// ----------------------------------------------------------------------------
// Behavior
// ----------------------------------------------------------------------------

/// Resolved characteristic behavior
#[derive(Clone)]
pub enum Behavior {
    /// Pushes transformed telemetry to subscribers, falling back to the
    /// default payload as a keepalive
    Notify {
        transform: Transform,
        default_payload: Arc<[u8]>,
    },
    /// Answers every read with the same bytes
    Read { payload: Arc<[u8]> },
}

impl Behavior {
    pub fn kind(&self) -> CharacteristicKind {
        match self {
            Self::Notify { .. } => CharacteristicKind::Notify,
            Self::Read { .. } => CharacteristicKind::Read,
        }
    }

    /// Payload for `status`. Read characteristics ignore the status.
    pub fn render(&self, status: &Status) -> Vec<u8> {
        match self {
            Self::Notify {
                transform,
                default_payload,
            } => transform(status, default_payload.to_vec()),
            Self::Read { payload } => payload.to_vec(),
        }
    }
}

impl fmt::Debug for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Notify {
                default_payload, ..
            } => f
                .debug_struct("Notify")
                .field("default_payload", default_payload)
                .finish_non_exhaustive(),
            Self::Read { payload } => f.debug_struct("Read").field("payload", payload).finish(),
        }
    }
}

/// A characteristic ready to be installed on a service
#[derive(Debug, Clone)]
pub struct Characteristic {
    pub uuid: Uuid,
    pub behavior: Behavior,
}

// ----------------------------------------------------------------------------
// Resolution
// ----------------------------------------------------------------------------

/// Resolves an ordered spec list for one sensor.
///
/// Returns the characteristics in spec order together with the sensor's
/// default payload, which is shared with its Notify characteristic. Fails
/// without side effects on an empty list, an unknown function name, or a
/// Notify count other than one.
pub fn resolve_characteristics(
    sensor: &str,
    specs: &[CharacteristicSpec],
    transform: Transform,
) -> Result<(Vec<Characteristic>, Arc<[u8]>), ConfigurationError> {
    if specs.is_empty() {
        return Err(ConfigurationError::NoCharacteristics {
            sensor: sensor.to_string(),
        });
    }

    let mut default_payload: Option<Arc<[u8]>> = None;
    let mut characteristics = Vec::with_capacity(specs.len());

    for spec in specs {
        let behavior = match spec.kind()? {
            CharacteristicKind::Notify => {
                if default_payload.is_some() {
                    return Err(ConfigurationError::DuplicateNotify {
                        sensor: sensor.to_string(),
                    });
                }
                let payload: Arc<[u8]> = Arc::from(spec.payload.as_slice());
                default_payload = Some(Arc::clone(&payload));
                Behavior::Notify {
                    transform,
                    default_payload: payload,
                }
            }
            CharacteristicKind::Read => Behavior::Read {
                payload: Arc::from(spec.payload.as_slice()),
            },
        };
        characteristics.push(Characteristic {
            uuid: spec.uuid,
            behavior,
        });
    }

    let default_payload = default_payload.ok_or_else(|| ConfigurationError::MissingNotify {
        sensor: sensor.to_string(),
    })?;

    Ok((characteristics, default_payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOTIFY_UUID: Uuid = Uuid::from_u128(0x0000_2a63_0000_1000_8000_0080_5f9b_34fb);
    const READ_UUID: Uuid = Uuid::from_u128(0x0000_2a65_0000_1000_8000_0080_5f9b_34fb);

    fn write_power(status: &Status, mut payload: Vec<u8>) -> Vec<u8> {
        if let Some(field) = payload.get_mut(2..4) {
            field.copy_from_slice(&status.power.to_le_bytes());
        }
        payload
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("Notify".parse::<CharacteristicKind>(), Ok(CharacteristicKind::Notify));
        assert_eq!("read".parse::<CharacteristicKind>(), Ok(CharacteristicKind::Read));
        assert_eq!("Write".parse::<CharacteristicKind>(), Err("Write".to_string()));
    }

    #[test]
    fn test_resolve_keeps_order_and_shares_default_payload() {
        let specs = vec![
            CharacteristicSpec::notify(NOTIFY_UUID, vec![0x20, 0, 0, 0]),
            CharacteristicSpec::read(READ_UUID, vec![0x08, 0, 0, 0]),
        ];

        let (characteristics, default_payload) =
            resolve_characteristics("power", &specs, write_power).unwrap();

        assert_eq!(characteristics.len(), 2);
        assert_eq!(characteristics[0].uuid, NOTIFY_UUID);
        assert_eq!(characteristics[1].uuid, READ_UUID);
        assert_eq!(&*default_payload, &[0x20, 0, 0, 0]);

        match &characteristics[0].behavior {
            Behavior::Notify {
                default_payload: stored,
                ..
            } => assert!(Arc::ptr_eq(stored, &default_payload)),
            other => panic!("expected Notify, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_function_is_rejected() {
        let specs = vec![
            CharacteristicSpec::notify(NOTIFY_UUID, vec![0; 4]),
            CharacteristicSpec::new(READ_UUID, "Indicate", vec![1]),
        ];

        let err = resolve_characteristics("power", &specs, write_power).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::UnknownFunction {
                characteristic: READ_UUID,
                function: "Indicate".to_string(),
            }
        );
    }

    #[test]
    fn test_notify_count_must_be_one() {
        let none = vec![CharacteristicSpec::read(READ_UUID, vec![1])];
        assert!(matches!(
            resolve_characteristics("s", &none, write_power),
            Err(ConfigurationError::MissingNotify { .. })
        ));

        let two = vec![
            CharacteristicSpec::notify(NOTIFY_UUID, vec![1]),
            CharacteristicSpec::notify(READ_UUID, vec![2]),
        ];
        assert!(matches!(
            resolve_characteristics("s", &two, write_power),
            Err(ConfigurationError::DuplicateNotify { .. })
        ));

        assert!(matches!(
            resolve_characteristics("s", &[], write_power),
            Err(ConfigurationError::NoCharacteristics { .. })
        ));
    }

    #[test]
    fn test_read_behavior_ignores_status() {
        let behavior = Behavior::Read {
            payload: Arc::from(&[0x01u8][..]),
        };
        assert_eq!(behavior.render(&Status::with_power(999)), vec![0x01]);
        assert_eq!(behavior.render(&Status::default()), vec![0x01]);
    }

    #[test]
    fn test_power_written_at_offset_two() {
        let template = [0x20u8, 0x00, 0xAA, 0xBB, 0x01, 0x02, 0x03, 0x04];
        let behavior = Behavior::Notify {
            transform: write_power,
            default_payload: Arc::from(&template[..]),
        };

        let payload = behavior.render(&Status::with_power(150));

        assert_eq!(&payload[2..4], &[0x96, 0x00]);
        assert_eq!(&payload[..2], &template[..2]);
        assert_eq!(&payload[4..], &template[4..]);
    }
}
