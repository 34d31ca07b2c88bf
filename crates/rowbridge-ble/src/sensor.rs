//! A live emulated sensor
//!
//! A [`Sensor`] is one GATT primary service built from a [`SensorProfile`].
//! It owns the sensor's inbound status channel; every notify subscription on
//! the service shares the same receiver, so a status is consumed by at most
//! one subscriber.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use rowbridge_core::{
    create_status_channel, resolve_characteristics, Behavior, BridgeConfig, Characteristic,
    ConfigurationError, SensorProfile, StatusReceiver, StatusSender,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::RegistrationError;
use crate::host::{
    CharacteristicHandler, GattCharacteristic, NotifyHandler, Notifier, PeripheralAdapter,
    ServiceDefinition,
};
use crate::notify::NotifyFeed;

// ----------------------------------------------------------------------------
// Sensor
// ----------------------------------------------------------------------------

pub struct Sensor {
    name: String,
    uuid: Uuid,
    characteristics: Vec<Characteristic>,
    default_payload: Arc<[u8]>,
    timeout: Duration,
    sender: StatusSender,
    receiver: StatusReceiver,
    subscribers: Arc<AtomicUsize>,
}

impl Sensor {
    /// Build a sensor without registering it.
    ///
    /// Fails if the profile's characteristic list cannot be resolved; nothing
    /// is created in that case.
    pub fn new(profile: &SensorProfile, timeout: Duration) -> Result<Self, ConfigurationError> {
        let (characteristics, default_payload) =
            resolve_characteristics(&profile.name, &profile.characteristics, profile.transform)?;
        let (sender, receiver) = create_status_channel();

        Ok(Self {
            name: profile.name.clone(),
            uuid: profile.uuid,
            characteristics,
            default_payload,
            timeout,
            sender,
            receiver,
            subscribers: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Build a sensor and make its service live on `adapter`.
    ///
    /// Waits `config.service_settle` after the service is added so the
    /// stack can finish its bookkeeping before the next registration.
    pub async fn register(
        profile: &SensorProfile,
        adapter: &mut dyn PeripheralAdapter,
        config: &BridgeConfig,
    ) -> Result<Self, RegistrationError> {
        let sensor = Self::new(profile, config.notify_timeout)?;

        adapter.add_service(sensor.service_definition()).await?;
        info!("Registered {} service {}", sensor.name, sensor.uuid);

        tokio::time::sleep(config.service_settle).await;
        Ok(sensor)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The service UUID; advertised as-is
    pub fn identifier(&self) -> Uuid {
        self.uuid
    }

    pub fn characteristics(&self) -> &[Characteristic] {
        &self.characteristics
    }

    /// Keepalive template shared by every subscription
    pub fn default_payload(&self) -> &[u8] {
        &self.default_payload
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Producer side of the inbound status channel
    pub fn sender(&self) -> StatusSender {
        self.sender.clone()
    }

    /// Number of notify loops currently running for this sensor
    pub fn active_subscriptions(&self) -> usize {
        self.subscribers.load(Ordering::Relaxed)
    }

    /// Describe the service for the host stack
    pub fn service_definition(&self) -> ServiceDefinition {
        let characteristics = self
            .characteristics
            .iter()
            .map(|characteristic| GattCharacteristic {
                uuid: characteristic.uuid,
                handler: self.handler_for(characteristic),
            })
            .collect();

        ServiceDefinition {
            name: self.name.clone(),
            uuid: self.uuid,
            characteristics,
        }
    }

    fn handler_for(&self, characteristic: &Characteristic) -> CharacteristicHandler {
        match &characteristic.behavior {
            Behavior::Read { payload } => CharacteristicHandler::Read(Arc::clone(payload)),
            Behavior::Notify {
                transform,
                default_payload,
            } => {
                let feed = NotifyFeed {
                    sensor: self.name.clone(),
                    characteristic: characteristic.uuid,
                    receiver: self.receiver.clone(),
                    transform: *transform,
                    default_payload: Arc::clone(default_payload),
                    timeout: self.timeout,
                };
                CharacteristicHandler::Notify(notify_handler(feed, Arc::clone(&self.subscribers)))
            }
        }
    }
}

impl std::fmt::Debug for Sensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sensor")
            .field("name", &self.name)
            .field("uuid", &self.uuid)
            .field("characteristics", &self.characteristics)
            .field("timeout", &self.timeout)
            .field("subscribers", &self.active_subscriptions())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Subscription Handling
// ----------------------------------------------------------------------------

/// Decrements the subscriber count even if the notify loop is aborted
struct SubscriberGuard(Arc<AtomicUsize>);

impl SubscriberGuard {
    fn enter(count: Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::Relaxed);
        Self(count)
    }
}

impl Drop for SubscriberGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

fn notify_handler(feed: NotifyFeed, subscribers: Arc<AtomicUsize>) -> NotifyHandler {
    Arc::new(move |mut notifier: Box<dyn Notifier>| {
        let feed = feed.clone();
        let subscribers = Arc::clone(&subscribers);
        async move {
            let _guard = SubscriberGuard::enter(subscribers);
            let exit = feed.run(notifier.as_mut()).await;
            debug!("{} subscription on {} ended: {}", feed.sensor, feed.characteristic, exit);
        }
        .boxed()
    })
}
