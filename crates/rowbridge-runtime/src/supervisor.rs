//! Supervisory Loop
//!
//! Owns the reset cycle around the telemetry source and the wireless stack:
//!
//! 1. release the previous adapter, if any, and wait `reset_settle`
//! 2. acquire a radio handle (failure is fatal)
//! 3. connect to the telemetry source
//! 4. register every sensor
//! 5. advertise the combined identifier set
//! 6. fan statuses out until the telemetry stream ends
//!
//! Any failure in steps 3 to 6 other than a bad profile table starts the
//! next cycle. There is no backoff and no retry ceiling.

use std::future::Future;
use std::sync::Arc;

use rowbridge_ble::{PeripheralAdapter, Radio, RegistrationError, Sensors};
use rowbridge_core::{AdapterError, BridgeConfig, ConfigurationError, SensorProfile};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::telemetry::{TelemetrySource, TelemetryStream};

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Outcomes that stop the supervisor for good
#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Wireless adapter unavailable: {0}")]
    Adapter(#[from] AdapterError),

    #[error("Invalid sensor table: {0}")]
    Configuration(#[from] ConfigurationError),
}

// ----------------------------------------------------------------------------
// Shutdown Handle
// ----------------------------------------------------------------------------

/// Stops a running supervisor from another task
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.sender.borrow()
    }
}

/// How one cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleEnd {
    Reset,
    Shutdown,
}

/// Runs `future` unless shutdown is requested first
async fn until_shutdown<F: Future>(
    shutdown: &mut watch::Receiver<bool>,
    future: F,
) -> Option<F::Output> {
    tokio::select! {
        biased;

        _ = shutdown.wait_for(|stop| *stop) => None,
        output = future => Some(output),
    }
}

// ----------------------------------------------------------------------------
// Supervisor
// ----------------------------------------------------------------------------

pub struct Supervisor<R, S> {
    radio: R,
    source: S,
    profiles: Vec<SensorProfile>,
    config: BridgeConfig,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
    cycles: u64,
}

impl<R, S> Supervisor<R, S>
where
    R: Radio,
    S: TelemetrySource,
{
    pub fn new(radio: R, source: S, profiles: Vec<SensorProfile>, config: BridgeConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            radio,
            source,
            profiles,
            config,
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
            cycles: 0,
        }
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            sender: Arc::clone(&self.shutdown_tx),
        }
    }

    /// Completed reset cycles
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Run reset cycles until shutdown or a fatal error.
    ///
    /// Returns `Ok(())` once shutdown was requested and the adapter released.
    pub async fn run(&mut self) -> Result<(), SupervisorError> {
        info!(
            "Supervisor starting: '{}' with {} sensors from {}",
            self.config.device_name,
            self.profiles.len(),
            self.source.name()
        );

        loop {
            info!(
                "Resetting wireless stack, settling for {:?}",
                self.config.reset_settle
            );
            let settle = tokio::time::sleep(self.config.reset_settle);
            if until_shutdown(&mut self.shutdown_rx, settle).await.is_none() {
                break;
            }

            let acquired = until_shutdown(
                &mut self.shutdown_rx,
                self.radio.acquire(&self.config.device_name),
            )
            .await;
            let mut adapter = match acquired {
                None => break,
                Some(Ok(adapter)) => adapter,
                Some(Err(e)) => {
                    error!("Failed to acquire wireless adapter: {}", e);
                    return Err(e.into());
                }
            };

            let outcome = self.cycle(adapter.as_mut()).await;

            if let Err(e) = adapter.release().await {
                warn!("Failed to release wireless adapter: {}", e);
            }
            self.cycles += 1;
            debug!("Supervisor cycle {} finished", self.cycles);

            match outcome {
                Ok(CycleEnd::Reset) => continue,
                Ok(CycleEnd::Shutdown) => break,
                Err(e) => {
                    error!("{}", e);
                    return Err(e);
                }
            }
        }

        info!("Supervisor stopped after {} cycles", self.cycles);
        Ok(())
    }

    async fn cycle(
        &mut self,
        adapter: &mut dyn PeripheralAdapter,
    ) -> Result<CycleEnd, SupervisorError> {
        let connected = until_shutdown(&mut self.shutdown_rx, self.source.connect()).await;
        let stream = match connected {
            None => return Ok(CycleEnd::Shutdown),
            Some(Ok(stream)) => stream,
            Some(Err(e)) => {
                warn!("Telemetry connection to {} failed: {}", self.source.name(), e);
                return Ok(CycleEnd::Reset);
            }
        };

        let registered = until_shutdown(
            &mut self.shutdown_rx,
            Sensors::register(adapter, &self.profiles, &self.config),
        )
        .await;
        let sensors = match registered {
            None => return Ok(CycleEnd::Shutdown),
            Some(Ok(sensors)) => sensors,
            Some(Err(RegistrationError::Configuration(e))) => return Err(e.into()),
            Some(Err(RegistrationError::Host(e))) => {
                warn!("Sensor registration failed: {}", e);
                return Ok(CycleEnd::Reset);
            }
        };

        let identifiers = sensors.identifiers();
        let advertised = until_shutdown(
            &mut self.shutdown_rx,
            adapter.advertise(&self.config.device_name, &identifiers),
        )
        .await;
        match advertised {
            None => return Ok(CycleEnd::Shutdown),
            Some(Ok(())) => info!(
                "Advertising '{}' with {} services",
                self.config.device_name,
                identifiers.len()
            ),
            Some(Err(e)) => {
                warn!("Advertising failed: {}", e);
                return Ok(CycleEnd::Reset);
            }
        }

        Ok(self.fan_out(stream, &sensors).await)
    }

    /// Forward every status to every sensor until the stream ends
    async fn fan_out(&mut self, mut stream: TelemetryStream, sensors: &Sensors) -> CycleEnd {
        let mut forwarded = 0u64;

        let end = loop {
            match until_shutdown(&mut self.shutdown_rx, stream.next()).await {
                None => break CycleEnd::Shutdown,
                Some(Some(status)) => {
                    sensors.distribute(status);
                    forwarded += 1;
                }
                Some(None) => {
                    warn!("Telemetry stream from {} ended", self.source.name());
                    break CycleEnd::Reset;
                }
            }
        };

        debug!("Forwarded {} statuses this cycle", forwarded);
        for stats in sensors.distributor_stats() {
            debug!(
                "{}: {} delivered, {} dropped ({:.1}% drop rate)",
                stats.sensor,
                stats.delivered(),
                stats.dropped(),
                stats.drop_rate() * 100.0
            );
        }
        end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_handle_is_shared() {
        let (tx, _rx) = watch::channel(false);
        let handle = ShutdownHandle {
            sender: Arc::new(tx),
        };
        let clone = handle.clone();

        assert!(!handle.is_shutdown());
        clone.shutdown();
        assert!(handle.is_shutdown());
    }

    #[tokio::test]
    async fn test_until_shutdown_prefers_shutdown() {
        let (tx, mut rx) = watch::channel(false);
        tx.send_replace(true);

        assert!(until_shutdown(&mut rx, async { 1 }).await.is_none());
    }

    #[tokio::test]
    async fn test_until_shutdown_passes_output_through() {
        let (_tx, mut rx) = watch::channel(false);

        assert_eq!(until_shutdown(&mut rx, async { 7 }).await, Some(7));
    }
}
