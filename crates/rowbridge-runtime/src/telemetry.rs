//! Telemetry Sources
//!
//! A [`TelemetrySource`] is opened once per supervisory cycle and yields a
//! [`TelemetryStream`]. The stream ending, for whatever reason, is the only
//! failure signal the supervisor needs: it resets and reconnects.

use std::f32::consts::PI;
use std::sync::Arc;
use std::time::Duration;

use rowbridge_core::{ConnectionError, Status};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Capacity of the source-to-supervisor channel
pub const TELEMETRY_CHANNEL_CAPACITY: usize = 1;

pub type TelemetrySender = mpsc::Sender<Status>;

// ----------------------------------------------------------------------------
// Telemetry Stream
// ----------------------------------------------------------------------------

/// Statuses from one connection; `None` from [`next`](Self::next) means the
/// connection is gone
#[derive(Debug)]
pub struct TelemetryStream {
    receiver: mpsc::Receiver<Status>,
    producer: Option<JoinHandle<()>>,
}

impl TelemetryStream {
    /// Create a stream fed through the returned sender
    pub fn channel() -> (TelemetrySender, Self) {
        let (sender, receiver) = mpsc::channel(TELEMETRY_CHANNEL_CAPACITY);
        (
            sender,
            Self {
                receiver,
                producer: None,
            },
        )
    }

    /// Tie a producer task to the stream; dropping the stream aborts it
    pub fn with_producer(mut self, producer: JoinHandle<()>) -> Self {
        self.producer = Some(producer);
        self
    }

    pub async fn next(&mut self) -> Option<Status> {
        self.receiver.recv().await
    }
}

impl Drop for TelemetryStream {
    fn drop(&mut self) {
        if let Some(producer) = self.producer.take() {
            producer.abort();
        }
    }
}

// ----------------------------------------------------------------------------
// Source Trait
// ----------------------------------------------------------------------------

#[async_trait::async_trait]
pub trait TelemetrySource: Send {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Open a new connection to the device
    async fn connect(&mut self) -> Result<TelemetryStream, ConnectionError>;
}

// ----------------------------------------------------------------------------
// Simulated Rower
// ----------------------------------------------------------------------------

const STROKE_RATE: u8 = 24;
const BASE_POWER: f32 = 180.0;
const RESTING_HEART_RATE: f32 = 90.0;
const WORKING_HEART_RATE: f32 = 150.0;

/// Deterministic steady-state rowing session
#[derive(Debug, Clone)]
pub struct SimulatedRower {
    interval: Duration,
    session: Option<Duration>,
}

impl SimulatedRower {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            session: None,
        }
    }

    /// End every connection after `length` of simulated rowing
    pub fn with_session_length(mut self, length: Duration) -> Self {
        self.session = Some(length);
        self
    }

    /// The status reported `elapsed` into a session
    pub fn status_at(elapsed: Duration) -> Status {
        let seconds = elapsed.as_secs_f32();

        // A slow one-minute swell around the base power
        let power = BASE_POWER + 20.0 * (2.0 * PI * seconds / 60.0).sin();
        // Concept2 pace model: watts = 2.80 * speed^3
        let speed = (power / 2.8).cbrt();
        let base_speed = (BASE_POWER / 2.8).cbrt();
        let heart_rate = (RESTING_HEART_RATE + seconds / 2.0).min(WORKING_HEART_RATE);
        let strokes = seconds * STROKE_RATE as f32 / 60.0;

        Status {
            elapsed_ms: elapsed.as_millis() as u64,
            power: power.round() as u16,
            speed,
            cadence: STROKE_RATE,
            stroke_count: strokes as u16,
            distance: base_speed * seconds,
            heart_rate: heart_rate.round() as u8,
        }
    }
}

#[async_trait::async_trait]
impl TelemetrySource for SimulatedRower {
    fn name(&self) -> &str {
        "simulated rower"
    }

    async fn connect(&mut self) -> Result<TelemetryStream, ConnectionError> {
        let (sender, stream) = TelemetryStream::channel();
        let interval = self.interval;
        let session = self.session;

        let producer = tokio::spawn(async move {
            let start = tokio::time::Instant::now();
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let elapsed = start.elapsed();
                if session.is_some_and(|length| elapsed > length) {
                    info!("Simulated session finished after {:?}", elapsed);
                    break;
                }
                if sender.send(Self::status_at(elapsed)).await.is_err() {
                    break;
                }
            }
        });

        info!("Connected to simulated rower ({:?} interval)", interval);
        Ok(stream.with_producer(producer))
    }
}

// ----------------------------------------------------------------------------
// JSON Lines Source
// ----------------------------------------------------------------------------

/// Reader position shared by every connection of one [`JsonLinesSource`]
struct LineReader<R> {
    lines: Lines<BufReader<R>>,
    number: usize,
    /// Parsed but not yet accepted by a stream
    pending: Option<Status>,
    error: Option<std::io::Error>,
    eof: bool,
}

impl<R> LineReader<R>
where
    R: AsyncRead + Unpin,
{
    /// Forward statuses until EOF, a read error or the stream going away
    async fn forward(&mut self, sender: &TelemetrySender) {
        loop {
            if let Some(status) = self.pending {
                if sender.send(status).await.is_err() {
                    return;
                }
                self.pending = None;
            }

            let line = match self.lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    info!("Telemetry input ended after {} lines", self.number);
                    self.eof = true;
                    return;
                }
                Err(e) => {
                    warn!("Failed to read telemetry input: {}", e);
                    self.error = Some(e);
                    return;
                }
            };
            self.number += 1;

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match serde_json::from_str::<Status>(line) {
                Ok(status) => self.pending = Some(status),
                Err(e) => warn!("Skipping malformed telemetry line {}: {}", self.number, e),
            }
        }
    }
}

/// One JSON `Status` per line, typically piped in on stdin.
///
/// Unread input survives a dropped stream and is picked up by the next
/// connection. A read error fails the next connection attempt with
/// [`ConnectionError::Io`]; once the input hits EOF every connection fails
/// with [`ConnectionError::Exhausted`].
pub struct JsonLinesSource<R> {
    reader: Arc<Mutex<LineReader<R>>>,
}

impl<R> JsonLinesSource<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader: Arc::new(Mutex::new(LineReader {
                lines: BufReader::new(reader).lines(),
                number: 0,
                pending: None,
                error: None,
                eof: false,
            })),
        }
    }
}

impl JsonLinesSource<tokio::io::Stdin> {
    pub fn stdin() -> Self {
        Self::new(tokio::io::stdin())
    }
}

#[async_trait::async_trait]
impl<R> TelemetrySource for JsonLinesSource<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    fn name(&self) -> &str {
        "json lines"
    }

    async fn connect(&mut self) -> Result<TelemetryStream, ConnectionError> {
        // Held by the previous producer until its abort lands
        let mut reader = Arc::clone(&self.reader).lock_owned().await;
        if reader.eof {
            return Err(ConnectionError::Exhausted);
        }
        if let Some(e) = reader.error.take() {
            return Err(ConnectionError::Io(e));
        }

        let (sender, stream) = TelemetryStream::channel();
        let producer = tokio::spawn(async move {
            reader.forward(&sender).await;
            debug!("JSON lines producer stopped");
        });

        Ok(stream.with_producer(producer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_status_is_deterministic() {
        let a = SimulatedRower::status_at(Duration::from_secs(30));
        let b = SimulatedRower::status_at(Duration::from_secs(30));
        assert_eq!(a, b);
        assert_eq!(a.elapsed_ms, 30_000);
        assert_eq!(a.cadence, 24);
        assert_eq!(a.stroke_count, 12);
        assert_eq!(a.heart_rate, 105);
    }

    #[test]
    fn test_simulated_session_progresses() {
        let early = SimulatedRower::status_at(Duration::from_secs(10));
        let late = SimulatedRower::status_at(Duration::from_secs(600));

        assert!(late.distance > early.distance);
        assert!(late.stroke_count > early.stroke_count);
        assert_eq!(late.heart_rate, 150);
        assert!((160..=200).contains(&early.power));
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_session_ends() {
        let mut rower = SimulatedRower::new(Duration::from_secs(1))
            .with_session_length(Duration::from_secs(3));
        let mut stream = rower.connect().await.unwrap();

        let mut count = 0;
        while stream.next().await.is_some() {
            count += 1;
        }
        // ticks at 0, 1, 2 and 3 seconds
        assert_eq!(count, 4);
    }

    #[tokio::test]
    async fn test_json_lines_skip_malformed_input() {
        let input: &[u8] = b"{\"power\": 120}\nnot json\n\n{\"power\": 130, \"heart_rate\": 140}\n";
        let mut source = JsonLinesSource::new(input);
        let mut stream = source.connect().await.unwrap();

        assert_eq!(stream.next().await.unwrap().power, 120);
        let second = stream.next().await.unwrap();
        assert_eq!(second.power, 130);
        assert_eq!(second.heart_rate, 140);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_json_lines_reconnect_after_eof_fails() {
        let input: &[u8] = b"";
        let mut source = JsonLinesSource::new(input);

        let mut stream = source.connect().await.unwrap();
        assert!(stream.next().await.is_none());

        let err = source.connect().await.unwrap_err();
        assert!(matches!(err, ConnectionError::Exhausted));
    }

    #[tokio::test]
    async fn test_json_lines_survive_dropped_stream() {
        let input: &[u8] = b"{\"power\": 120}\n{\"power\": 130}\n";
        let mut source = JsonLinesSource::new(input);

        let unread = source.connect().await.unwrap();
        drop(unread);

        let mut stream = source.connect().await.unwrap();
        assert_eq!(stream.next().await.unwrap().power, 120);
        assert_eq!(stream.next().await.unwrap().power, 130);
        assert!(stream.next().await.is_none());
        drop(stream);

        let err = source.connect().await.unwrap_err();
        assert!(matches!(err, ConnectionError::Exhausted));
    }

    #[tokio::test]
    async fn test_json_lines_read_error_fails_next_connect() {
        let input = tokio_test::io::Builder::new()
            .read(b"{\"power\": 120}\n")
            .read_error(std::io::Error::new(
                std::io::ErrorKind::Other,
                "serial link reset",
            ))
            .read(b"{\"power\": 130}\n")
            .build();
        let mut source = JsonLinesSource::new(input);

        let mut stream = source.connect().await.unwrap();
        assert_eq!(stream.next().await.unwrap().power, 120);
        assert!(stream.next().await.is_none());
        drop(stream);

        let err = source.connect().await.unwrap_err();
        assert!(matches!(err, ConnectionError::Io(_)));

        let mut stream = source.connect().await.unwrap();
        assert_eq!(stream.next().await.unwrap().power, 130);
        assert!(stream.next().await.is_none());
    }
}
