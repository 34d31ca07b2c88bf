//! Platform detection

use rowbridge_core::AdapterError;
use tracing::warn;

#[cfg(target_os = "linux")]
use crate::bluez::BluezRadio;
use crate::host::{PeripheralAdapter, Radio};
use crate::memory::MemoryRadio;

/// Radio for the current platform
#[derive(Debug, Clone)]
pub enum PlatformRadio {
    #[cfg(target_os = "linux")]
    Linux(BluezRadio),
    Fallback(MemoryRadio),
}

impl PlatformRadio {
    /// Create the appropriate radio for the current platform
    pub fn new() -> Self {
        #[cfg(target_os = "linux")]
        {
            Self::Linux(BluezRadio::new())
        }
        #[cfg(not(target_os = "linux"))]
        {
            warn!("No supported wireless host stack on this platform, using in-memory radio");
            Self::Fallback(MemoryRadio::new())
        }
    }

    /// Use the in-memory radio regardless of platform
    pub fn in_memory() -> Self {
        warn!("Using in-memory radio; nothing will be broadcast");
        Self::Fallback(MemoryRadio::new())
    }
}

impl Default for PlatformRadio {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Radio for PlatformRadio {
    async fn acquire(
        &self,
        device_name: &str,
    ) -> Result<Box<dyn PeripheralAdapter>, AdapterError> {
        match self {
            #[cfg(target_os = "linux")]
            Self::Linux(ref radio) => radio.acquire(device_name).await,
            Self::Fallback(ref radio) => radio.acquire(device_name).await,
        }
    }
}
