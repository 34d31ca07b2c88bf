//! In-process wireless host
//!
//! [`MemoryRadio`] records every service and advertisement it is given and
//! lets a caller play the part of a client: read a characteristic, subscribe
//! to a Notify characteristic, unsubscribe, or vanish mid-subscription. It is
//! the backend for tests and for platforms without a supported stack.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::BoxFuture;
use futures::FutureExt;
use rowbridge_core::{AdapterError, HostError, NotifyWriteError};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::host::{
    CharacteristicHandler, Notifier, PeripheralAdapter, Radio, ServiceDefinition,
};

// ----------------------------------------------------------------------------
// Recorded State
// ----------------------------------------------------------------------------

/// What an adapter is currently advertising
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    pub device_name: String,
    pub services: Vec<Uuid>,
}

#[derive(Debug, Default)]
struct MemoryState {
    services: Vec<ServiceDefinition>,
    advertisement: Option<Advertisement>,
    acquire_attempts: usize,
    releases: usize,
    acquire_failure: Option<String>,
    registration_failures: usize,
    advertising_failures: usize,
    subscriptions: Vec<Arc<watch::Sender<bool>>>,
}

// ----------------------------------------------------------------------------
// Memory Radio
// ----------------------------------------------------------------------------

/// Shared handle to an in-process host; clones observe the same state
#[derive(Debug, Clone, Default)]
pub struct MemoryRadio {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryRadio {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every following acquisition fail with `reason`
    pub fn fail_acquire(&self, reason: impl Into<String>) {
        self.state().acquire_failure = Some(reason.into());
    }

    /// Reject the next `count` service registrations
    pub fn fail_registrations(&self, count: usize) {
        self.state().registration_failures = count;
    }

    /// Reject the next `count` advertise calls
    pub fn fail_advertising(&self, count: usize) {
        self.state().advertising_failures = count;
    }

    pub fn acquire_attempts(&self) -> usize {
        self.state().acquire_attempts
    }

    pub fn releases(&self) -> usize {
        self.state().releases
    }

    /// UUIDs of the live services, in registration order
    pub fn services(&self) -> Vec<Uuid> {
        self.state().services.iter().map(|s| s.uuid).collect()
    }

    pub fn advertisement(&self) -> Option<Advertisement> {
        self.state().advertisement.clone()
    }

    fn handler(&self, service: Uuid, characteristic: Uuid) -> Option<CharacteristicHandler> {
        self.state()
            .services
            .iter()
            .find(|s| s.uuid == service)?
            .characteristics
            .iter()
            .find(|c| c.uuid == characteristic)
            .map(|c| c.handler.clone())
    }

    /// Read a characteristic the way a client would.
    ///
    /// Returns `None` for unknown or Notify-only characteristics.
    pub fn read(&self, service: Uuid, characteristic: Uuid) -> Option<Vec<u8>> {
        match self.handler(service, characteristic)? {
            CharacteristicHandler::Read(payload) => Some(payload.to_vec()),
            CharacteristicHandler::Notify(_) => None,
        }
    }

    /// Subscribe to a Notify characteristic; must be called inside a runtime.
    ///
    /// Returns `None` for unknown or Read-only characteristics.
    pub fn subscribe(&self, service: Uuid, characteristic: Uuid) -> Option<MemorySubscription> {
        let CharacteristicHandler::Notify(handler) = self.handler(service, characteristic)? else {
            return None;
        };

        let (writes_tx, writes_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = watch::channel(false);
        let stop = Arc::new(stop_tx);
        let reachable = Arc::new(AtomicBool::new(true));

        self.state().subscriptions.push(Arc::clone(&stop));

        let notifier = MemoryNotifier {
            writes: writes_tx,
            stop: stop_rx,
            reachable: Arc::clone(&reachable),
        };
        let task = tokio::spawn(handler(Box::new(notifier)));

        debug!("Memory client subscribed to {}", characteristic);
        Some(MemorySubscription {
            writes: writes_rx,
            stop,
            reachable,
            task,
        })
    }
}

#[async_trait::async_trait]
impl Radio for MemoryRadio {
    async fn acquire(
        &self,
        device_name: &str,
    ) -> Result<Box<dyn PeripheralAdapter>, AdapterError> {
        let mut state = self.state();
        state.acquire_attempts += 1;

        if let Some(reason) = &state.acquire_failure {
            return Err(AdapterError::AdapterNotAvailable(reason.clone()));
        }

        info!("Acquired in-memory adapter for '{}'", device_name);
        Ok(Box::new(MemoryAdapter {
            radio: self.clone(),
            released: false,
        }))
    }
}

// ----------------------------------------------------------------------------
// Memory Adapter
// ----------------------------------------------------------------------------

struct MemoryAdapter {
    radio: MemoryRadio,
    released: bool,
}

#[async_trait::async_trait]
impl PeripheralAdapter for MemoryAdapter {
    async fn add_service(&mut self, service: ServiceDefinition) -> Result<(), HostError> {
        if self.released {
            return Err(HostError::Released);
        }

        let mut state = self.radio.state();
        if state.registration_failures > 0 {
            state.registration_failures -= 1;
            return Err(HostError::RegistrationFailed {
                service: service.uuid,
                reason: "rejected by memory host".to_string(),
            });
        }

        state.services.push(service);
        Ok(())
    }

    async fn advertise(&mut self, device_name: &str, services: &[Uuid]) -> Result<(), HostError> {
        if self.released {
            return Err(HostError::Released);
        }

        let mut state = self.radio.state();
        if state.advertising_failures > 0 {
            state.advertising_failures -= 1;
            return Err(HostError::AdvertisingFailed(
                "rejected by memory host".to_string(),
            ));
        }

        state.advertisement = Some(Advertisement {
            device_name: device_name.to_string(),
            services: services.to_vec(),
        });
        Ok(())
    }

    async fn release(&mut self) -> Result<(), HostError> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let mut state = self.radio.state();
        for stop in state.subscriptions.drain(..) {
            stop.send_replace(true);
        }
        state.services.clear();
        state.advertisement = None;
        state.releases += 1;
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Subscriptions
// ----------------------------------------------------------------------------

struct MemoryNotifier {
    writes: mpsc::UnboundedSender<Vec<u8>>,
    stop: watch::Receiver<bool>,
    reachable: Arc<AtomicBool>,
}

#[async_trait::async_trait]
impl Notifier for MemoryNotifier {
    async fn notify(&mut self, payload: Vec<u8>) -> Result<(), NotifyWriteError> {
        if !self.reachable.load(Ordering::Acquire) {
            return Err(NotifyWriteError::ClientUnreachable(
                "memory client disconnected".to_string(),
            ));
        }
        self.writes
            .send(payload)
            .map_err(|_| NotifyWriteError::Closed)
    }

    fn is_stopped(&self) -> bool {
        *self.stop.borrow()
    }

    fn stopped(&self) -> BoxFuture<'static, ()> {
        let mut stop = self.stop.clone();
        async move {
            // A dropped sender also counts as stopped
            let _ = stop.wait_for(|stopped| *stopped).await;
        }
        .boxed()
    }
}

/// Client end of one notify subscription
pub struct MemorySubscription {
    writes: mpsc::UnboundedReceiver<Vec<u8>>,
    stop: Arc<watch::Sender<bool>>,
    reachable: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl MemorySubscription {
    /// Wait for the next notification
    pub async fn next(&mut self) -> Option<Vec<u8>> {
        self.writes.recv().await
    }

    /// A notification that has already arrived, if any
    pub fn try_next(&mut self) -> Option<Vec<u8>> {
        self.writes.try_recv().ok()
    }

    /// Unsubscribe
    pub fn cancel(&self) {
        self.stop.send_replace(true);
    }

    /// Vanish without unsubscribing; the next write fails
    pub fn disconnect(&self) {
        self.reachable.store(false, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the notify loop behind this subscription to return
    pub async fn finished(self) {
        let _ = self.task.await;
    }
}
