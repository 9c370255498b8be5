//! Heartbeat Monitor
//!
//! Emits a liveness ping on a fixed interval while the connection is up, so
//! intermediaries do not treat the connection as idle. Pongs are not tracked
//! and the monitor never decides to reconnect; that is driven solely by the
//! transport's own close and error signals.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Configuration for heartbeat behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// Interval between ping messages.
    pub ping_interval: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
        }
    }
}

impl HeartbeatConfig {
    /// Create a new configuration.
    #[must_use]
    pub const fn new(ping_interval: Duration) -> Self {
        Self { ping_interval }
    }
}

/// Events emitted by the heartbeat monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatEvent {
    /// Request to send a ping message.
    SendPing,
}

/// Heartbeat monitor for one connected session.
///
/// The owner spawns [`HeartbeatMonitor::run`] when the connection is
/// established and cancels the token when it leaves the connected state.
///
/// # Example
///
/// ```rust,no_run
/// use price_stream_client::infrastructure::stream::heartbeat::{
///     HeartbeatConfig, HeartbeatEvent, HeartbeatMonitor,
/// };
/// use tokio::sync::mpsc;
/// use tokio_util::sync::CancellationToken;
///
/// async fn example() {
///     let (event_tx, mut event_rx) = mpsc::channel(4);
///     let cancel = CancellationToken::new();
///
///     let monitor = HeartbeatMonitor::new(HeartbeatConfig::default(), event_tx, cancel.clone());
///     tokio::spawn(monitor.run());
///
///     while let Some(HeartbeatEvent::SendPing) = event_rx.recv().await {
///         // Send {"action":"ping"} over the connection
///     }
/// }
/// ```
pub struct HeartbeatMonitor {
    config: HeartbeatConfig,
    event_tx: mpsc::Sender<HeartbeatEvent>,
    cancel: CancellationToken,
}

impl HeartbeatMonitor {
    /// Create a new heartbeat monitor.
    #[must_use]
    pub const fn new(
        config: HeartbeatConfig,
        event_tx: mpsc::Sender<HeartbeatEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            event_tx,
            cancel,
        }
    }

    /// Run until cancelled or the event channel closes.
    ///
    /// The first ping is requested one full interval after start.
    pub async fn run(self) {
        let period = self.config.ping_interval;
        if period.is_zero() {
            tracing::warn!("Heartbeat interval is zero, pings disabled");
            return;
        }

        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::debug!("Heartbeat monitor cancelled");
                    break;
                }
                _ = interval.tick() => {
                    if self.event_tx.send(HeartbeatEvent::SendPing).await.is_err() {
                        tracing::debug!("Event channel closed, stopping heartbeat");
                        break;
                    }
                }
            }
        }
    }
}
