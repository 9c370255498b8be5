//! Connection Manager
//!
//! Owns the one physical connection and drives the connection state
//! machine:
//!
//! ```text
//! Disconnected ──connect()──► Connecting ──open──► Connected
//!      ▲                        │    ▲               │
//!      │                  fail  │    │ delay         │ close / error
//!      │                        ▼    │               ▼
//!  disconnect()            Reconnecting ◄────────────┘
//!  (any state)                  │
//!                               │ cap reached
//!                               ▼
//!                       FailedPermanently
//! ```
//!
//! Everything runs on a single task: facade commands, inbound frames,
//! heartbeat ticks and the reconnect timer are serialized through one
//! `select!` loop, so transitions never race each other.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::codec::JsonCodec;
use super::heartbeat::{HeartbeatConfig, HeartbeatEvent, HeartbeatMonitor};
use super::messages::{ClientCommand, ServerMessage};
use super::reconnect::{ReconnectConfig, ReconnectError, ReconnectPolicy};
use crate::application::ports::{TransportConnector, TransportError, TransportSession};
use crate::application::services::StreamState;
use crate::domain::streaming::ConnectionState;
use crate::infrastructure::metrics;

/// Buffered heartbeat events; ticks are skipped rather than queued.
const HEARTBEAT_CHANNEL_CAPACITY: usize = 1;

/// Requests posted by the facade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    /// Begin or resume connection attempts.
    Connect,
    /// Sever the transport and suppress reconnection.
    Disconnect,
    /// Transmit a command if connected; otherwise the replay covers it.
    Send(ClientCommand),
}

/// Where the state machine goes next.
enum Step {
    Idle,
    Connect,
    Connected(Box<dyn TransportSession>),
    Retry,
    Wait(Duration),
    Shutdown,
}

/// The connection actor.
pub(crate) struct ConnectionManager {
    url: String,
    connector: Arc<dyn TransportConnector>,
    policy: ReconnectPolicy,
    heartbeat: HeartbeatConfig,
    codec: JsonCodec,
    state: Arc<StreamState>,
    commands: mpsc::UnboundedReceiver<Command>,
    shutdown: CancellationToken,
}

impl ConnectionManager {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        url: String,
        connector: Arc<dyn TransportConnector>,
        reconnect: ReconnectConfig,
        heartbeat: HeartbeatConfig,
        state: Arc<StreamState>,
        commands: mpsc::UnboundedReceiver<Command>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            url,
            connector,
            policy: ReconnectPolicy::new(reconnect),
            heartbeat,
            codec: JsonCodec::new(),
            state,
            commands,
            shutdown,
        }
    }

    /// Run until shutdown is requested or every command sender is dropped.
    pub(crate) async fn run(mut self) {
        let mut step = Step::Idle;

        loop {
            step = match step {
                Step::Idle => self.idle().await,
                Step::Connect => self.connect().await,
                Step::Connected(session) => self.connected(session).await,
                Step::Retry => self.retry(),
                Step::Wait(delay) => self.wait(delay).await,
                Step::Shutdown => break,
            };
        }

        self.transition(ConnectionState::Disconnected);
        tracing::info!("Connection manager stopped");
    }

    /// `Disconnected` / `FailedPermanently`: wait for an explicit connect.
    async fn idle(&mut self) -> Step {
        loop {
            let command = tokio::select! {
                () = self.shutdown.cancelled() => return Step::Shutdown,
                command = self.commands.recv() => command,
            };

            match command {
                None => return Step::Shutdown,
                Some(Command::Connect) => {
                    self.policy.reset();
                    self.publish_attempts();
                    return Step::Connect;
                }
                Some(Command::Disconnect) => self.enter_disconnected(),
                Some(Command::Send(command)) => defer(&command),
            }
        }
    }

    /// `Connecting`: one transport open.
    async fn connect(&mut self) -> Step {
        self.transition(ConnectionState::Connecting);
        tracing::info!(
            url = %self.url,
            attempt = self.policy.attempt_count(),
            "Connecting to price stream"
        );

        let connector = Arc::clone(&self.connector);
        let url = self.url.clone();
        let opening = async move { connector.connect(&url).await };
        tokio::pin!(opening);

        loop {
            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => return Step::Shutdown,
                command = self.commands.recv() => match command {
                    None => return Step::Shutdown,
                    Some(Command::Connect) => tracing::debug!("Connection attempt already in flight"),
                    Some(Command::Disconnect) => {
                        self.enter_disconnected();
                        return Step::Idle;
                    }
                    Some(Command::Send(command)) => defer(&command),
                },
                result = &mut opening => {
                    return match result {
                        Ok(session) => Step::Connected(session),
                        Err(e) => {
                            self.on_transport_error(&e);
                            Step::Retry
                        }
                    };
                }
            }
        }
    }

    /// `Connected`: replay, heartbeat and frame processing.
    async fn connected(&mut self, mut session: Box<dyn TransportSession>) -> Step {
        self.policy.reset();
        self.publish_attempts();
        self.state.clear_error();
        self.transition(ConnectionState::Connected);
        tracing::info!(url = %self.url, "Price stream connected");

        if let Some(symbols) = self.state.subscriptions().replay_batch() {
            tracing::info!(count = symbols.len(), "Replaying subscriptions");
            let replay = ClientCommand::Subscribe { symbols };
            if let Err(e) = send_command(session.as_mut(), self.codec, &replay).await {
                return self.connection_lost(Some(&e));
            }
        }

        // Cancelled on every exit from this function.
        let heartbeat_cancel = self.shutdown.child_token();
        let _heartbeat_guard = heartbeat_cancel.clone().drop_guard();
        let (heartbeat_tx, mut heartbeat_rx) = mpsc::channel(HEARTBEAT_CHANNEL_CAPACITY);
        tokio::spawn(
            HeartbeatMonitor::new(self.heartbeat.clone(), heartbeat_tx, heartbeat_cancel).run(),
        );

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => {
                    session.close().await;
                    return Step::Shutdown;
                }
                command = self.commands.recv() => match command {
                    None => {
                        session.close().await;
                        return Step::Shutdown;
                    }
                    Some(Command::Connect) => tracing::debug!("Already connected"),
                    Some(Command::Disconnect) => {
                        session.close().await;
                        self.enter_disconnected();
                        return Step::Idle;
                    }
                    Some(Command::Send(command)) => {
                        if let Err(e) = send_command(session.as_mut(), self.codec, &command).await {
                            return self.connection_lost(Some(&e));
                        }
                    }
                },
                Some(HeartbeatEvent::SendPing) = heartbeat_rx.recv() => {
                    if let Err(e) = send_command(session.as_mut(), self.codec, &ClientCommand::Ping).await {
                        return self.connection_lost(Some(&e));
                    }
                }
                frame = session.next_text() => match frame {
                    Some(Ok(text)) => self.handle_frame(&text),
                    Some(Err(e)) => return self.connection_lost(Some(&e)),
                    None => return self.connection_lost(None),
                },
            }
        }
    }

    /// Count a failed or closed attempt and decide between retrying and
    /// giving up.
    fn retry(&mut self) -> Step {
        if let Some(delay) = self.policy.next_delay() {
            let attempt = self.policy.attempt_count();
            self.publish_attempts();
            metrics::record_reconnect();
            tracing::info!(
                attempt,
                max_attempts = self.policy.max_attempts(),
                delay_ms = delay.as_millis(),
                "Reconnecting to price stream"
            );
            self.transition(ConnectionState::Reconnecting);
            Step::Wait(delay)
        } else {
            let error = ReconnectError::MaxAttemptsExceeded(self.policy.max_attempts());
            tracing::error!(error = %error, "Giving up on price stream");
            self.state.set_error(error.to_string());
            self.transition(ConnectionState::FailedPermanently);
            Step::Idle
        }
    }

    /// `Reconnecting`: wait out the delay unless told otherwise.
    async fn wait(&mut self, delay: Duration) -> Step {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => return Step::Shutdown,
                () = &mut sleep => return Step::Connect,
                command = self.commands.recv() => match command {
                    None => return Step::Shutdown,
                    Some(Command::Connect) => {
                        tracing::debug!("Explicit connect, skipping reconnect delay");
                        return Step::Connect;
                    }
                    Some(Command::Disconnect) => {
                        self.enter_disconnected();
                        return Step::Idle;
                    }
                    Some(Command::Send(command)) => defer(&command),
                },
            }
        }
    }

    fn handle_frame(&self, text: &str) {
        let message = match self.codec.decode(text) {
            Ok(message) => message,
            Err(e) => {
                metrics::record_frame_dropped();
                tracing::warn!(error = %e, "Dropping undecodable frame");
                return;
            }
        };

        metrics::record_frame_received(message.frame_type());

        match message {
            ServerMessage::PriceUpdate(update) => {
                let delta = self.state.prices().ingest(update.data);
                metrics::set_cached_symbols(self.state.prices().len());
                if !delta.is_empty() {
                    self.state.price_listeners().notify(&delta);
                }
            }
            ServerMessage::Subscribed(ack) => {
                tracing::debug!(symbols = ?ack.symbols, "Subscription confirmed");
            }
            ServerMessage::Unsubscribed(ack) => {
                tracing::debug!(symbols = ?ack.symbols, "Unsubscription confirmed");
            }
            ServerMessage::Pong => tracing::trace!("Pong received"),
            ServerMessage::Error(error) => {
                tracing::error!(message = %error.message, "Price stream error");
                self.state.set_error(error.message);
            }
        }
    }

    fn connection_lost(&self, error: Option<&TransportError>) -> Step {
        match error {
            Some(e) => self.on_transport_error(e),
            None => tracing::warn!("Price stream closed by server"),
        }
        Step::Retry
    }

    fn on_transport_error(&self, error: &TransportError) {
        metrics::record_transport_error();
        tracing::warn!(error = %error, "Price stream transport error");
        self.state.set_error(format!("connection error: {error}"));
    }

    fn enter_disconnected(&mut self) {
        self.policy.exhaust();
        self.publish_attempts();
        self.transition(ConnectionState::Disconnected);
        tracing::info!("Price stream disconnected");
    }

    fn transition(&self, state: ConnectionState) {
        self.state.set_connection_state(state);
        metrics::set_connected(state.is_connected());
    }

    fn publish_attempts(&self) {
        self.state.set_reconnect_attempts(self.policy.attempt_count());
    }
}

fn defer(command: &ClientCommand) {
    tracing::debug!(
        action = command.action(),
        "Not connected, subscription state will be replayed on connect"
    );
}

async fn send_command(
    session: &mut dyn TransportSession,
    codec: JsonCodec,
    command: &ClientCommand,
) -> Result<(), TransportError> {
    let text = match codec.encode(command) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(error = %e, action = command.action(), "Failed to encode command");
            return Ok(());
        }
    };

    session.send_text(text).await?;
    metrics::record_command_sent(command.action());
    tracing::debug!(action = command.action(), "Command sent");
    Ok(())
}
