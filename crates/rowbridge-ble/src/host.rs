//! Wireless host stack abstraction
//!
//! The bridge only needs three things from a BLE stack: register a service,
//! advertise a set of service UUIDs under a name, and hand each new notify
//! subscription to a callback. [`Radio`] hands out the adapter handle;
//! [`PeripheralAdapter`] is that handle with an explicit release.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use rowbridge_core::{AdapterError, HostError, NotifyWriteError};
use uuid::Uuid;

// ----------------------------------------------------------------------------
// Notifier
// ----------------------------------------------------------------------------

/// Write handle and cancellation signal for one notify subscription
#[async_trait::async_trait]
pub trait Notifier: Send {
    /// Push a value to the subscribed client
    async fn notify(&mut self, payload: Vec<u8>) -> Result<(), NotifyWriteError>;

    /// Check whether the client has unsubscribed
    fn is_stopped(&self) -> bool;

    /// Resolves once the client has unsubscribed
    fn stopped(&self) -> BoxFuture<'static, ()>;
}

/// Callback run by the stack for every new subscription
pub type NotifyHandler = Arc<dyn Fn(Box<dyn Notifier>) -> BoxFuture<'static, ()> + Send + Sync>;

// ----------------------------------------------------------------------------
// Service Definition
// ----------------------------------------------------------------------------

/// What the stack must do when a client touches a characteristic
#[derive(Clone)]
pub enum CharacteristicHandler {
    Read(Arc<[u8]>),
    Notify(NotifyHandler),
}

impl fmt::Debug for CharacteristicHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read(payload) => f.debug_tuple("Read").field(payload).finish(),
            Self::Notify(_) => f.write_str("Notify"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GattCharacteristic {
    pub uuid: Uuid,
    pub handler: CharacteristicHandler,
}

/// A primary service ready for registration
#[derive(Debug, Clone)]
pub struct ServiceDefinition {
    pub name: String,
    pub uuid: Uuid,
    pub characteristics: Vec<GattCharacteristic>,
}

// ----------------------------------------------------------------------------
// Adapter and Radio
// ----------------------------------------------------------------------------

/// An acquired radio handle
#[async_trait::async_trait]
pub trait PeripheralAdapter: Send {
    /// Register a primary service; it stays live until [`release`](Self::release)
    async fn add_service(&mut self, service: ServiceDefinition) -> Result<(), HostError>;

    /// Start advertising `device_name` with the given service UUIDs
    async fn advertise(&mut self, device_name: &str, services: &[Uuid]) -> Result<(), HostError>;

    /// Stop advertising and remove every registered service
    async fn release(&mut self) -> Result<(), HostError>;
}

/// Source of adapter handles
#[async_trait::async_trait]
pub trait Radio: Send + Sync {
    async fn acquire(&self, device_name: &str)
        -> Result<Box<dyn PeripheralAdapter>, AdapterError>;
}
