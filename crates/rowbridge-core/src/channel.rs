//! Sensor Channels and Fan-out
//!
//! Every sensor owns a bounded channel of capacity one. The receiving half is
//! cloned into each notify loop of that sensor (the channel is multi-consumer),
//! and the sending half is handed to the [`FanOut`], which pushes every
//! telemetry snapshot to all sensors without ever waiting on one of them.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use async_channel::TrySendError;
use tracing::trace;

use crate::status::Status;

// ----------------------------------------------------------------------------
// Channel Types
// ----------------------------------------------------------------------------

/// Capacity of every sensor inbound channel
pub const SENSOR_CHANNEL_CAPACITY: usize = 1;

pub type StatusSender = async_channel::Sender<Status>;
pub type StatusReceiver = async_channel::Receiver<Status>;

/// Create a sensor inbound channel
pub fn create_status_channel() -> (StatusSender, StatusReceiver) {
    async_channel::bounded(SENSOR_CHANNEL_CAPACITY)
}

/// Outcome of offering a status to one sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// The sensor still holds an undelivered status
    DroppedFull,
    /// The sensor's receivers are gone
    DroppedClosed,
}

impl fmt::Display for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delivery::Delivered => write!(f, "delivered"),
            Delivery::DroppedFull => write!(f, "dropped (channel full)"),
            Delivery::DroppedClosed => write!(f, "dropped (channel closed)"),
        }
    }
}

// ----------------------------------------------------------------------------
// Channel Statistics
// ----------------------------------------------------------------------------

/// Per-sensor delivery counters
/// Uses atomic counters so a snapshot can be read while the fan-out runs
#[derive(Debug)]
pub struct ChannelStats {
    pub sensor: String,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl ChannelStats {
    pub fn new(sensor: impl Into<String>) -> Self {
        Self {
            sensor: sensor.into(),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn record(&self, delivery: Delivery) {
        match delivery {
            Delivery::Delivered => self.delivered.fetch_add(1, Ordering::Relaxed),
            Delivery::DroppedFull | Delivery::DroppedClosed => {
                self.dropped.fetch_add(1, Ordering::Relaxed)
            }
        };
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Fraction of offered statuses that were dropped
    pub fn drop_rate(&self) -> f32 {
        let delivered = self.delivered();
        let dropped = self.dropped();

        if delivered + dropped == 0 {
            0.0
        } else {
            dropped as f32 / (delivered + dropped) as f32
        }
    }
}

// Implement Clone manually since atomic types don't implement Clone
impl Clone for ChannelStats {
    fn clone(&self) -> Self {
        Self {
            sensor: self.sensor.clone(),
            delivered: AtomicU64::new(self.delivered()),
            dropped: AtomicU64::new(self.dropped()),
        }
    }
}

// ----------------------------------------------------------------------------
// Fan-out Distributor
// ----------------------------------------------------------------------------

/// Non-blocking distributor from one telemetry stream to many sensors
#[derive(Debug, Default)]
pub struct FanOut {
    targets: Vec<(StatusSender, ChannelStats)>,
}

impl FanOut {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sensor channel; targets are offered statuses in insertion order
    pub fn add_target(&mut self, sensor: impl Into<String>, sender: StatusSender) {
        self.targets.push((sender, ChannelStats::new(sensor)));
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Offer `status` to every sensor.
    ///
    /// A sensor whose channel is still full keeps its pending status and
    /// misses this one. Never blocks.
    pub fn distribute(&self, status: Status) -> Vec<Delivery> {
        self.targets
            .iter()
            .map(|(sender, stats)| {
                let delivery = match sender.try_send(status) {
                    Ok(()) => Delivery::Delivered,
                    Err(TrySendError::Full(_)) => Delivery::DroppedFull,
                    Err(TrySendError::Closed(_)) => Delivery::DroppedClosed,
                };
                stats.record(delivery);
                trace!("status for {}: {}", stats.sensor, delivery);
                delivery
            })
            .collect()
    }

    /// Snapshot of the per-sensor counters
    pub fn stats(&self) -> Vec<ChannelStats> {
        self.targets.iter().map(|(_, stats)| stats.clone()).collect()
    }
}
