//! BlueZ backend (Linux, via `bluer`)
//!
//! Each registered sensor becomes its own GATT application so services can be
//! added one at a time. Dropping the application and advertisement handles
//! unregisters them from bluetoothd, which is all a release needs to do.

use std::collections::BTreeSet;

use bluer::adv::{Advertisement, AdvertisementHandle, Type as AdvertisementType};
use bluer::gatt::local::{
    Application, ApplicationHandle, Characteristic, CharacteristicNotifier,
    CharacteristicNotify, CharacteristicNotifyMethod, CharacteristicRead, ReqError, Service,
};
use futures::future::BoxFuture;
use futures::FutureExt;
use rowbridge_core::{AdapterError, HostError, NotifyWriteError};
use tracing::{debug, info};
use uuid::Uuid;

use crate::host::{
    CharacteristicHandler, GattCharacteristic, NotifyHandler, Notifier, PeripheralAdapter, Radio,
    ServiceDefinition,
};

// ----------------------------------------------------------------------------
// Radio
// ----------------------------------------------------------------------------

/// Acquires the default BlueZ adapter
#[derive(Debug, Default, Clone, Copy)]
pub struct BluezRadio;

impl BluezRadio {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Radio for BluezRadio {
    async fn acquire(
        &self,
        device_name: &str,
    ) -> Result<Box<dyn PeripheralAdapter>, AdapterError> {
        let session = bluer::Session::new()
            .await
            .map_err(|e| AdapterError::SessionUnavailable(e.to_string()))?;

        let adapter = session
            .default_adapter()
            .await
            .map_err(|e| AdapterError::AdapterNotAvailable(e.to_string()))?;

        // Enable adapter if needed
        if !adapter.is_powered().await.unwrap_or(false) {
            adapter
                .set_powered(true)
                .await
                .map_err(|e| AdapterError::PowerOnFailed(e.to_string()))?;
        }

        info!(
            "BlueZ adapter {} acquired for '{}'",
            adapter.name(),
            device_name
        );

        Ok(Box::new(BluezAdapter {
            _session: session,
            adapter,
            applications: Vec::new(),
            advertisement: None,
        }))
    }
}

// ----------------------------------------------------------------------------
// Adapter
// ----------------------------------------------------------------------------

struct BluezAdapter {
    _session: bluer::Session,
    adapter: bluer::Adapter,
    applications: Vec<ApplicationHandle>,
    advertisement: Option<AdvertisementHandle>,
}

#[async_trait::async_trait]
impl PeripheralAdapter for BluezAdapter {
    async fn add_service(&mut self, service: ServiceDefinition) -> Result<(), HostError> {
        let uuid = service.uuid;
        let application = Application {
            services: vec![gatt_service(service)],
            ..Default::default()
        };

        let handle = self
            .adapter
            .serve_gatt_application(application)
            .await
            .map_err(|e| HostError::RegistrationFailed {
                service: uuid,
                reason: e.to_string(),
            })?;

        self.applications.push(handle);
        Ok(())
    }

    async fn advertise(&mut self, device_name: &str, services: &[Uuid]) -> Result<(), HostError> {
        // Replace any previous advertisement
        self.advertisement = None;

        let advertisement = Advertisement {
            advertisement_type: AdvertisementType::Peripheral,
            service_uuids: services.iter().copied().collect::<BTreeSet<_>>(),
            local_name: Some(device_name.to_string()),
            discoverable: Some(true),
            ..Default::default()
        };

        let handle = self
            .adapter
            .advertise(advertisement)
            .await
            .map_err(|e| HostError::AdvertisingFailed(e.to_string()))?;

        self.advertisement = Some(handle);
        info!("Advertising '{}' with {} services", device_name, services.len());
        Ok(())
    }

    async fn release(&mut self) -> Result<(), HostError> {
        // Dropping the handles stops advertising and removes the services
        if self.advertisement.take().is_some() {
            debug!("Stopped BLE advertising");
        }
        let count = self.applications.len();
        self.applications.clear();
        if count > 0 {
            debug!("Removed {} GATT applications", count);
        }
        Ok(())
    }
}

fn gatt_service(service: ServiceDefinition) -> Service {
    Service {
        uuid: service.uuid,
        primary: true,
        characteristics: service
            .characteristics
            .into_iter()
            .map(gatt_characteristic)
            .collect(),
        ..Default::default()
    }
}

fn gatt_characteristic(characteristic: GattCharacteristic) -> Characteristic {
    match characteristic.handler {
        CharacteristicHandler::Read(payload) => Characteristic {
            uuid: characteristic.uuid,
            read: Some(CharacteristicRead {
                read: true,
                fun: Box::new(move |_request| {
                    let value = payload.to_vec();
                    async move { Ok::<_, ReqError>(value) }.boxed()
                }),
                ..Default::default()
            }),
            ..Default::default()
        },
        CharacteristicHandler::Notify(handler) => Characteristic {
            uuid: characteristic.uuid,
            notify: Some(CharacteristicNotify {
                notify: true,
                method: CharacteristicNotifyMethod::Fun(notify_fun(handler)),
                ..Default::default()
            }),
            ..Default::default()
        },
    }
}

fn notify_fun(
    handler: NotifyHandler,
) -> Box<dyn Fn(CharacteristicNotifier) -> BoxFuture<'static, ()> + Send + Sync> {
    Box::new(move |notifier| handler(Box::new(BluezNotifier { inner: notifier })))
}

// ----------------------------------------------------------------------------
// Notifier
// ----------------------------------------------------------------------------

struct BluezNotifier {
    inner: CharacteristicNotifier,
}

#[async_trait::async_trait]
impl Notifier for BluezNotifier {
    async fn notify(&mut self, payload: Vec<u8>) -> Result<(), NotifyWriteError> {
        self.inner
            .notify(payload)
            .await
            .map_err(|e| NotifyWriteError::ClientUnreachable(e.to_string()))
    }

    fn is_stopped(&self) -> bool {
        self.inner.is_stopped()
    }

    fn stopped(&self) -> BoxFuture<'static, ()> {
        self.inner.stopped().boxed()
    }
}
