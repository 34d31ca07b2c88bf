//! Notify state machine
//!
//! One [`NotifyFeed::run`] call drives one subscription. Each iteration races
//! three events, in this order of precedence when several are ready:
//!
//! 1. a status arrives on the sensor channel: write the transformed payload
//! 2. the timeout expires with no status: write the default payload
//! 3. the client unsubscribes: stop
//!
//! The cancellation signal is also checked before every race, so a
//! subscription that was cancelled performs no further writes even while
//! telemetry keeps flowing. A failed write ends the subscription; the client
//! has to subscribe again to get notifications back.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rowbridge_core::{StatusReceiver, Transform};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::host::Notifier;

// ----------------------------------------------------------------------------
// Exit Reasons
// ----------------------------------------------------------------------------

/// Why a subscription ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyExit {
    /// The client unsubscribed
    Cancelled,
    /// A write failed; treated as an implicit disconnect
    ClientGone,
}

impl fmt::Display for NotifyExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotifyExit::Cancelled => write!(f, "client unsubscribed"),
            NotifyExit::ClientGone => write!(f, "client unreachable"),
        }
    }
}

// ----------------------------------------------------------------------------
// Notify Feed
// ----------------------------------------------------------------------------

/// Everything a notify loop needs from its sensor
#[derive(Clone)]
pub struct NotifyFeed {
    pub sensor: String,
    pub characteristic: Uuid,
    pub receiver: StatusReceiver,
    pub transform: Transform,
    pub default_payload: Arc<[u8]>,
    pub timeout: Duration,
}

impl NotifyFeed {
    /// Serve one subscription until it is cancelled or the client is lost
    pub async fn run<N>(&self, notifier: &mut N) -> NotifyExit
    where
        N: Notifier + ?Sized,
    {
        info!(
            "Client subscribed for {} notifications on {}",
            self.sensor, self.characteristic
        );

        // Closed once the sensor's registry is torn down; keepalives continue
        let mut data_open = true;

        loop {
            if notifier.is_stopped() {
                info!("Client un-subscribed from {} notifications", self.sensor);
                return NotifyExit::Cancelled;
            }

            let payload = tokio::select! {
                biased;

                received = self.receiver.recv(), if data_open => match received {
                    Ok(status) => Some((self.transform)(&status, self.default_payload.to_vec())),
                    Err(_) => {
                        debug!("{} channel closed, sending keepalives only", self.sensor);
                        data_open = false;
                        None
                    }
                },

                _ = tokio::time::sleep(self.timeout) => {
                    debug!(
                        "Waiting for data, default {} packet sent: {}",
                        self.sensor,
                        hex::encode(&self.default_payload)
                    );
                    Some(self.default_payload.to_vec())
                },

                _ = notifier.stopped() => {
                    info!("Client un-subscribed from {} notifications", self.sensor);
                    return NotifyExit::Cancelled;
                }
            };

            let Some(payload) = payload else {
                continue;
            };

            debug!("{} notify: {}", self.sensor, hex::encode(&payload));
            if let Err(e) = notifier.notify(payload).await {
                warn!("Client missing for {} notification: {}", self.sensor, e);
                return NotifyExit::ClientGone;
            }
        }
    }
}
