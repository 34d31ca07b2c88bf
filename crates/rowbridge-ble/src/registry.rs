//! Sensor registry
//!
//! [`Sensors`] holds every live sensor in registration order together with
//! the fan-out that feeds them. The order is what clients see in the
//! advertisement, so it is the profile table order and nothing else.

use std::time::Duration;

use rowbridge_core::{BridgeConfig, ChannelStats, Delivery, FanOut, SensorProfile, Status};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::RegistrationError;
use crate::host::PeripheralAdapter;
use crate::sensor::Sensor;

#[derive(Debug, Default)]
pub struct Sensors {
    sensors: Vec<Sensor>,
    fanout: FanOut,
}

impl Sensors {
    /// Build every sensor without registering any of them
    pub fn build(profiles: &[SensorProfile], timeout: Duration) -> Result<Self, RegistrationError> {
        let mut sensors = Self::default();
        for profile in profiles {
            sensors.push(Sensor::new(profile, timeout)?);
        }
        Ok(sensors)
    }

    /// Register one service per profile, in order.
    ///
    /// Every profile is validated first, so a malformed table registers
    /// nothing. After that the first host failure aborts and is returned;
    /// services registered before it stay until the adapter is released.
    pub async fn register(
        adapter: &mut dyn PeripheralAdapter,
        profiles: &[SensorProfile],
        config: &BridgeConfig,
    ) -> Result<Self, RegistrationError> {
        // Validation only; the sensors built here are discarded
        Self::build(profiles, config.notify_timeout)?;

        let mut sensors = Self::default();
        for profile in profiles {
            sensors.push(Sensor::register(profile, adapter, config).await?);
        }

        info!(
            "Registered {} sensors: {}",
            sensors.len(),
            sensors
                .iter()
                .map(Sensor::name)
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(sensors)
    }

    fn push(&mut self, sensor: Sensor) {
        self.fanout.add_target(sensor.name(), sensor.sender());
        self.sensors.push(sensor);
    }

    /// Service UUIDs in registration order
    pub fn identifiers(&self) -> Vec<Uuid> {
        self.sensors.iter().map(Sensor::identifier).collect()
    }

    /// Offer one status to every sensor without blocking
    pub fn distribute(&self, status: Status) -> Vec<Delivery> {
        let deliveries = self.fanout.distribute(status);
        let dropped = deliveries
            .iter()
            .filter(|delivery| **delivery != Delivery::Delivered)
            .count();
        if dropped > 0 {
            debug!("Status dropped for {} of {} sensors", dropped, deliveries.len());
        }
        deliveries
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sensor> {
        self.sensors.iter()
    }

    pub fn get(&self, identifier: Uuid) -> Option<&Sensor> {
        self.sensors
            .iter()
            .find(|sensor| sensor.identifier() == identifier)
    }

    /// Per-sensor delivery counters, in registration order
    pub fn distributor_stats(&self) -> Vec<ChannelStats> {
        self.fanout.stats()
    }
}
