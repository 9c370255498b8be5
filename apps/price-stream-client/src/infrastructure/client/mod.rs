//! Price Stream Client
//!
//! The public facade. Every operation is synchronous: commands are posted to
//! the connection actor and observable state is read from shared snapshots,
//! so callers never wait on the network.
//!
//! # Usage
//!
//! ```ignore
//! use price_stream_client::{ClientOptions, PriceStreamClient};
//!
//! let client = PriceStreamClient::create(
//!     ClientOptions::default()
//!         .with_backend_url("https://api.example.com")
//!         .on_price_update(|delta| println!("{delta:?}")),
//! )?;
//!
//! client.subscribe(["TCS", "INFY"]);
//! let price = client.get_price("TCS");
//! ```

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::application::ports::TransportConnector;
use crate::application::services::{Listener, ListenerId, StreamState};
use crate::domain::streaming::{ConnectionState, PriceEntry, PricePayload, PriceUpdate};
use crate::domain::subscription::{Symbol, normalize_batch};
use crate::infrastructure::config::{
    ClientSettings, ConfigError, DEFAULT_BACKEND_URL, derive_stream_url,
};
use crate::infrastructure::metrics;
use crate::infrastructure::stream::connection::{Command, ConnectionManager};
use crate::infrastructure::stream::{
    ClientCommand, HeartbeatConfig, ReconnectConfig, WebSocketConnector,
};

// =============================================================================
// Options
// =============================================================================

/// Construction options for [`PriceStreamClient`].
#[derive(Clone)]
pub struct ClientOptions {
    /// Explicit stream URL; wins over derivation from `backend_url`.
    pub url: Option<String>,
    /// HTTP(S) base URL the stream endpoint is derived from.
    pub backend_url: String,
    /// Reconnection policy.
    pub reconnect: ReconnectConfig,
    /// Heartbeat cadence.
    pub heartbeat: HeartbeatConfig,
    /// Connect immediately after construction.
    pub auto_connect: bool,
    /// Listener registered before the first connect.
    pub on_price_update: Option<Listener<PriceUpdate>>,
    /// Listener registered before the first connect.
    pub on_connection_change: Option<Listener<bool>>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            url: None,
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            reconnect: ReconnectConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            auto_connect: true,
            on_price_update: None,
            on_connection_change: None,
        }
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("url", &self.url)
            .field("backend_url", &self.backend_url)
            .field("reconnect", &self.reconnect)
            .field("heartbeat", &self.heartbeat)
            .field("auto_connect", &self.auto_connect)
            .field("on_price_update", &self.on_price_update.is_some())
            .field("on_connection_change", &self.on_connection_change.is_some())
            .finish()
    }
}

impl ClientOptions {
    /// Options mirroring loaded settings. Callbacks are left unset.
    #[must_use]
    pub fn from_settings(settings: &ClientSettings) -> Self {
        Self {
            url: settings.url.clone(),
            backend_url: settings.backend_url.clone(),
            reconnect: ReconnectConfig::new(
                settings.reconnect_delay,
                settings.max_reconnect_attempts,
            ),
            heartbeat: HeartbeatConfig::new(settings.heartbeat_interval),
            auto_connect: settings.auto_connect,
            on_price_update: None,
            on_connection_change: None,
        }
    }

    /// Connect to this exact URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Derive the stream URL from this backend.
    #[must_use]
    pub fn with_backend_url(mut self, backend_url: impl Into<String>) -> Self {
        self.backend_url = backend_url.into();
        self
    }

    /// Replace the reconnection policy.
    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Replace the heartbeat cadence.
    #[must_use]
    pub fn with_heartbeat(mut self, heartbeat: HeartbeatConfig) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    /// Whether to connect on construction.
    #[must_use]
    pub const fn auto_connect(mut self, auto_connect: bool) -> Self {
        self.auto_connect = auto_connect;
        self
    }

    /// Invoke `listener` with every non-empty price delta.
    #[must_use]
    pub fn on_price_update<F>(mut self, listener: F) -> Self
    where
        F: Fn(&PriceUpdate) + Send + Sync + 'static,
    {
        self.on_price_update = Some(Arc::new(listener));
        self
    }

    /// Invoke `listener` whenever the connected flag flips.
    #[must_use]
    pub fn on_connection_change<F>(mut self, listener: F) -> Self
    where
        F: Fn(&bool) + Send + Sync + 'static,
    {
        self.on_connection_change = Some(Arc::new(listener));
        self
    }

    /// The endpoint these options resolve to.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidUrl`] if no explicit URL is set and the
    /// backend URL cannot be converted.
    pub fn stream_url(&self) -> Result<String, ConfigError> {
        match &self.url {
            Some(url) => Ok(url.clone()),
            None => derive_stream_url(&self.backend_url),
        }
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Errors from constructing or shutting down a client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The options could not be resolved to an endpoint.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The client was created outside a Tokio runtime.
    #[error("price stream client requires a Tokio runtime")]
    NoRuntime,
    /// The connection task panicked or was aborted.
    #[error("connection task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

// =============================================================================
// Client
// =============================================================================

/// Handle to one shared price stream connection.
///
/// Dropping the handle stops the connection task; [`close`](Self::close)
/// additionally waits for it to finish.
pub struct PriceStreamClient {
    url: String,
    state: Arc<StreamState>,
    commands: mpsc::UnboundedSender<Command>,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl fmt::Debug for PriceStreamClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriceStreamClient")
            .field("url", &self.url)
            .field("state", &self.state.connection_state())
            .finish_non_exhaustive()
    }
}

impl PriceStreamClient {
    /// Create a client over WebSocket.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint cannot be resolved or no runtime is
    /// available.
    pub fn create(options: ClientOptions) -> Result<Self, ClientError> {
        Self::with_connector(options, Arc::new(WebSocketConnector::new()))
    }

    /// Create a client over a custom transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint cannot be resolved or no runtime is
    /// available.
    pub fn with_connector(
        options: ClientOptions,
        connector: Arc<dyn TransportConnector>,
    ) -> Result<Self, ClientError> {
        let url = options.stream_url()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| ClientError::NoRuntime)?;

        let state = Arc::new(StreamState::new());
        if let Some(listener) = options.on_price_update {
            state.price_listeners().add_shared(listener);
        }
        if let Some(listener) = options.on_connection_change {
            state.connection_listeners().add_shared(listener);
        }

        let (commands, rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let manager = ConnectionManager::new(
            url.clone(),
            connector,
            options.reconnect,
            options.heartbeat,
            Arc::clone(&state),
            rx,
            shutdown.clone(),
        );
        let span = tracing::info_span!("price_stream", url = %url);
        let task = runtime.spawn(manager.run().instrument(span));

        let client = Self {
            url,
            state,
            commands,
            shutdown,
            task: Some(task),
        };

        if options.auto_connect {
            client.connect();
        }

        Ok(client)
    }

    /// Begin connecting. No effect while connected or connecting.
    ///
    /// From `Disconnected` or `FailedPermanently` the attempt counter is
    /// reset; while `Reconnecting` the pending delay is skipped.
    pub fn connect(&self) {
        self.post(Command::Connect);
    }

    /// Close the connection and suppress automatic reconnection.
    pub fn disconnect(&self) {
        self.post(Command::Disconnect);
    }

    /// Add symbols to the desired subscription set.
    ///
    /// Symbols are trimmed and upper-cased; empty entries are ignored. The
    /// batch is sent immediately when connected and replayed on every
    /// future connect.
    pub fn subscribe<I, S>(&self, symbols: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let batch = normalize_batch(symbols);
        if batch.is_empty() {
            return;
        }

        let added = self.state.subscriptions().add(&batch);
        metrics::set_subscriptions(self.state.subscriptions().len());
        tracing::debug!(symbols = ?batch, added, "Subscribe requested");
        self.post(Command::Send(ClientCommand::Subscribe { symbols: batch }));
    }

    /// Remove symbols from the desired subscription set.
    ///
    /// Cached prices for these symbols are kept.
    pub fn unsubscribe<I, S>(&self, symbols: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let batch = normalize_batch(symbols);
        if batch.is_empty() {
            return;
        }

        let removed = self.state.subscriptions().remove(&batch);
        metrics::set_subscriptions(self.state.subscriptions().len());
        tracing::debug!(symbols = ?batch, removed, "Unsubscribe requested");
        self.post(Command::Send(ClientCommand::Unsubscribe { symbols: batch }));
    }

    /// Latest payload for `symbol`, case-insensitive.
    #[must_use]
    pub fn get_price(&self, symbol: &str) -> Option<PricePayload> {
        self.state.prices().get(symbol)
    }

    /// Latest payload for `symbol` with its receive time.
    #[must_use]
    pub fn price_entry(&self, symbol: &str) -> Option<PriceEntry> {
        self.state.prices().entry(symbol)
    }

    /// Every cached payload.
    #[must_use]
    pub fn prices(&self) -> HashMap<Symbol, PricePayload> {
        self.state.prices().snapshot()
    }

    /// Whether the transport is currently open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state.connection_state().is_connected()
    }

    /// Current connection state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.state.connection_state()
    }

    /// Receiver observing every connection state change.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.state_changes()
    }

    /// The desired subscription set.
    #[must_use]
    pub fn subscribed_symbols(&self) -> BTreeSet<Symbol> {
        self.state.subscriptions().snapshot()
    }

    /// Most recent error, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.state.last_error()
    }

    /// Reconnection attempts since the last successful connect.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.state.reconnect_attempts()
    }

    /// Register a price delta listener.
    pub fn add_price_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&PriceUpdate) + Send + Sync + 'static,
    {
        self.state.price_listeners().add(listener)
    }

    /// Register a connected-flag listener.
    pub fn add_connection_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&bool) + Send + Sync + 'static,
    {
        self.state.connection_listeners().add(listener)
    }

    /// Remove a listener of either kind. Returns whether it was registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.state.price_listeners().remove(id) || self.state.connection_listeners().remove(id)
    }

    /// The endpoint this client connects to.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Stop the connection task and wait for it to finish.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Task`] if the task panicked.
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.shutdown.cancel();
        if let Some(task) = self.task.take() {
            task.await?;
        }
        Ok(())
    }

    fn post(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::debug!("Connection task has stopped, command ignored");
        }
    }
}

impl Drop for PriceStreamClient {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use parking_lot::Mutex;
    use serde_json::json;
    use tokio::time::{Instant, timeout};

    use super::*;
    use crate::infrastructure::stream::testing::{MemoryConnector, MemoryPeer};

    const LONG: Duration = Duration::from_secs(600);

    fn options() -> ClientOptions {
        ClientOptions::default()
            .auto_connect(false)
            .with_reconnect(ReconnectConfig::new(Duration::from_secs(3), 5))
            .with_heartbeat(HeartbeatConfig::new(Duration::from_secs(30)))
    }

    fn client_with(connector: &Arc<MemoryConnector>) -> PriceStreamClient {
        PriceStreamClient::with_connector(
            options(),
            Arc::clone(connector) as Arc<dyn TransportConnector>,
        )
        .unwrap()
    }

    async fn wait_for(client: &PriceStreamClient, state: ConnectionState) {
        let mut changes = client.state_changes();
        timeout(LONG, changes.wait_for(|s| *s == state))
            .await
            .expect("state not reached")
            .expect("connection task alive");
    }

    async fn next_peer(peers: &mut mpsc::UnboundedReceiver<MemoryPeer>) -> MemoryPeer {
        timeout(LONG, peers.recv())
            .await
            .expect("no session opened")
            .expect("connector alive")
    }

    fn record_connection_changes(client: &PriceStreamClient) -> Arc<Mutex<Vec<bool>>> {
        let changes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&changes);
        client.add_connection_listener(move |connected| sink.lock().push(*connected));
        changes
    }

    fn subscribe_cmd(symbols: &[&str]) -> ClientCommand {
        ClientCommand::Subscribe {
            symbols: symbols.iter().map(ToString::to_string).collect(),
        }
    }

    fn price_update(data: serde_json::Value) -> serde_json::Value {
        json!({"type": "price_update", "data": data})
    }

    #[test]
    fn create_requires_runtime() {
        let result = PriceStreamClient::create(ClientOptions::default());
        assert!(matches!(result, Err(ClientError::NoRuntime)));
    }

    #[tokio::test]
    async fn invalid_backend_is_rejected() {
        let result = PriceStreamClient::create(options().with_backend_url("ftp://nope"));
        assert!(matches!(
            result,
            Err(ClientError::Config(ConfigError::InvalidUrl(_)))
        ));
    }

    #[tokio::test]
    async fn url_is_derived_unless_explicit() {
        let (connector, _peers) = MemoryConnector::accepting();

        let derived = client_with(&connector);
        assert_eq!(derived.url(), "ws://localhost:8000/ws/prices");

        let explicit = PriceStreamClient::with_connector(
            options().with_url("ws://10.0.0.1:9000/stream"),
            connector,
        )
        .unwrap();
        assert_eq!(explicit.url(), "ws://10.0.0.1:9000/stream");
    }

    #[tokio::test(start_paused = true)]
    async fn auto_connect_opens_on_construction() {
        let (connector, mut peers) = MemoryConnector::accepting();
        let client = PriceStreamClient::with_connector(
            options().auto_connect(true),
            Arc::clone(&connector) as Arc<dyn TransportConnector>,
        )
        .unwrap();

        let _peer = next_peer(&mut peers).await;
        wait_for(&client, ConnectionState::Connected).await;
        assert!(client.is_connected());
        assert_eq!(connector.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn subscriptions_made_offline_are_replayed_as_one_batch() {
        let (connector, mut peers) = MemoryConnector::accepting();
        let client = client_with(&connector);

        client.subscribe(["tcs"]);
        client.subscribe([" INFY ", ""]);
        client.subscribe(Vec::<String>::new());
        client.connect();

        let mut peer = next_peer(&mut peers).await;
        assert_eq!(peer.next_command().await, Some(subscribe_cmd(&["INFY", "TCS"])));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(peer.try_next_command(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_is_replayed_without_subscriptions() {
        let (connector, mut peers) = MemoryConnector::accepting();
        let client = client_with(&connector);

        client.connect();
        let mut peer = next_peer(&mut peers).await;
        wait_for(&client, ConnectionState::Connected).await;

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(peer.try_next_command(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn connect_is_idempotent() {
        let (connector, mut peers) = MemoryConnector::accepting();
        let client = client_with(&connector);
        let changes = record_connection_changes(&client);

        client.connect();
        client.connect();
        let mut peer = next_peer(&mut peers).await;
        wait_for(&client, ConnectionState::Connected).await;
        client.connect();

        // Processed after the extra connects, so they have been handled too.
        client.subscribe(["TCS"]);
        assert_eq!(peer.next_command().await, Some(subscribe_cmd(&["TCS"])));

        assert_eq!(connector.attempts(), 1);
        assert_eq!(*changes.lock(), vec![true]);
    }

    #[tokio::test(start_paused = true)]
    async fn subscribe_while_connected_sends_only_the_new_batch() {
        let (connector, mut peers) = MemoryConnector::accepting();
        let client = client_with(&connector);
        client.subscribe(["TCS"]);
        client.connect();

        let mut peer = next_peer(&mut peers).await;
        assert_eq!(peer.next_command().await, Some(subscribe_cmd(&["TCS"])));

        client.subscribe(["wipro", "TCS"]);
        assert_eq!(peer.next_command().await, Some(subscribe_cmd(&["WIPRO", "TCS"])));
        assert_eq!(
            client.subscribed_symbols(),
            BTreeSet::from(["TCS".to_string(), "WIPRO".to_string()])
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unsubscribe_keeps_cached_price() {
        let (connector, mut peers) = MemoryConnector::accepting();
        let client = client_with(&connector);
        let (tx, mut deltas) = mpsc::unbounded_channel();
        client.add_price_listener(move |delta| {
            let _ = tx.send(delta.clone());
        });
        client.subscribe(["TCS"]);
        client.connect();

        let mut peer = next_peer(&mut peers).await;
        assert_eq!(peer.next_command().await, Some(subscribe_cmd(&["TCS"])));
        peer.send(&price_update(json!({"TCS": {"last": 3500.5}})));
        deltas.recv().await.unwrap();

        client.unsubscribe(["tcs"]);
        assert_eq!(
            peer.next_command().await,
            Some(ClientCommand::Unsubscribe {
                symbols: vec!["TCS".to_string()]
            })
        );
        assert!(client.subscribed_symbols().is_empty());
        assert_eq!(
            client.get_price("TCS").unwrap().as_value(),
            &json!({"last": 3500.5})
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unsubscribe_offline_is_excluded_from_replay() {
        let (connector, mut peers) = MemoryConnector::accepting();
        let client = client_with(&connector);

        client.subscribe(["TCS", "INFY"]);
        client.unsubscribe(["TCS"]);
        client.connect();

        let mut peer = next_peer(&mut peers).await;
        assert_eq!(peer.next_command().await, Some(subscribe_cmd(&["INFY"])));
    }

    #[tokio::test(start_paused = true)]
    async fn price_updates_merge_and_notify_deltas() {
        let (connector, mut peers) = MemoryConnector::accepting();
        let client = client_with(&connector);
        let (tx, mut deltas) = mpsc::unbounded_channel();
        client.add_price_listener(move |delta| {
            let _ = tx.send(delta.clone());
        });

        client.connect();
        let peer = next_peer(&mut peers).await;
        wait_for(&client, ConnectionState::Connected).await;

        peer.send(&price_update(json!({"TCS": {"last": 100}})));
        peer.send(&price_update(json!({"infy": {"last": 50}})));

        let first = deltas.recv().await.unwrap();
        let second = deltas.recv().await.unwrap();

        assert_eq!(first.keys().collect::<Vec<_>>(), vec!["TCS"]);
        assert_eq!(second.keys().collect::<Vec<_>>(), vec!["INFY"]);
        assert_eq!(client.get_price("tcs").unwrap().as_value(), &json!({"last": 100}));
        assert_eq!(client.get_price("INFY").unwrap().as_value(), &json!({"last": 50}));
        assert_eq!(client.prices().len(), 2);
        assert!(client.price_entry("TCS").is_some());
        assert!(client.get_price("WIPRO").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_frames_are_dropped() {
        let (connector, mut peers) = MemoryConnector::accepting();
        let client = client_with(&connector);

        client.connect();
        let peer = next_peer(&mut peers).await;
        wait_for(&client, ConnectionState::Connected).await;

        peer.send_raw("not json");
        peer.send_raw("[1, 2, 3]");
        peer.send(&json!({"type": "mystery"}));
        peer.send(&json!({"data": {"TCS": {"last": 1}}}));
        peer.send(&json!({"type": "price_update", "data": "oops"}));
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(client.connection_state(), ConnectionState::Connected);
        assert!(client.prices().is_empty());
        assert_eq!(client.last_error(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn acks_and_pongs_change_nothing() {
        let (connector, mut peers) = MemoryConnector::accepting();
        let client = client_with(&connector);

        client.connect();
        let peer = next_peer(&mut peers).await;
        wait_for(&client, ConnectionState::Connected).await;

        peer.send(&json!({"type": "subscribed", "symbols": ["TCS"]}));
        peer.send(&json!({"type": "unsubscribed", "symbols": ["TCS"]}));
        peer.send(&json!({"type": "pong"}));
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(client.is_connected());
        assert!(client.prices().is_empty());
        assert!(client.subscribed_symbols().is_empty());
        assert_eq!(client.last_error(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn error_frame_sets_last_error_only() {
        let (connector, mut peers) = MemoryConnector::accepting();
        let client = client_with(&connector);

        client.connect();
        let peer = next_peer(&mut peers).await;
        wait_for(&client, ConnectionState::Connected).await;

        peer.send(&json!({"type": "error", "message": "unknown symbol XYZ"}));
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(client.last_error().as_deref(), Some("unknown symbol XYZ"));
        assert!(client.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_pings_every_interval_until_disconnect() {
        let (connector, mut peers) = MemoryConnector::accepting();
        let client = client_with(&connector);

        client.connect();
        let mut peer = next_peer(&mut peers).await;
        wait_for(&client, ConnectionState::Connected).await;
        let start = Instant::now();

        for n in 1..=3u64 {
            assert_eq!(peer.next_command().await, Some(ClientCommand::Ping));
            let elapsed = start.elapsed();
            assert!(elapsed >= Duration::from_secs(30 * n));
            assert!(elapsed < Duration::from_secs(30 * n + 1));
        }

        client.disconnect();
        wait_for(&client, ConnectionState::Disconnected).await;
        tokio::time::sleep(Duration::from_secs(300)).await;

        assert_eq!(peer.try_next_command(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn connection_loss_reconnects_and_replays() {
        let (connector, mut peers) = MemoryConnector::accepting();
        let client = client_with(&connector);
        let changes = record_connection_changes(&client);
        client.subscribe(["TCS"]);
        client.connect();

        let mut first = next_peer(&mut peers).await;
        assert_eq!(first.next_command().await, Some(subscribe_cmd(&["TCS"])));
        let started = Instant::now();
        first.close();

        let mut second = next_peer(&mut peers).await;
        assert!(started.elapsed() >= Duration::from_secs(3));
        assert_eq!(second.next_command().await, Some(subscribe_cmd(&["TCS"])));

        wait_for(&client, ConnectionState::Connected).await;
        assert_eq!(connector.attempts(), 2);
        assert_eq!(client.reconnect_attempts(), 0);
        assert_eq!(*changes.lock(), vec![true, false, true]);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_error_is_reported_then_cleared() {
        let (connector, mut peers) = MemoryConnector::accepting();
        let client = client_with(&connector);

        client.connect();
        let first = next_peer(&mut peers).await;
        wait_for(&client, ConnectionState::Connected).await;

        first.fail("connection reset");
        wait_for(&client, ConnectionState::Reconnecting).await;
        let error = client.last_error().unwrap();
        assert!(error.starts_with("connection error:"), "{error}");
        assert!(error.contains("connection reset"), "{error}");
        assert_eq!(client.reconnect_attempts(), 1);

        let _second = next_peer(&mut peers).await;
        wait_for(&client, ConnectionState::Connected).await;
        assert_eq!(client.last_error(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let (connector, _peers) = MemoryConnector::refusing();
        let client = client_with(&connector);
        let changes = record_connection_changes(&client);

        client.connect();
        wait_for(&client, ConnectionState::FailedPermanently).await;

        assert_eq!(connector.attempts(), 6);
        assert_eq!(client.reconnect_attempts(), 5);
        assert_eq!(
            client.last_error().as_deref(),
            Some("connection lost after 5 reconnection attempts")
        );

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(connector.attempts(), 6);
        assert_eq!(client.connection_state(), ConnectionState::FailedPermanently);
        assert!(changes.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_max_attempts_never_reconnects() {
        let (connector, _peers) = MemoryConnector::refusing();
        let client = PriceStreamClient::with_connector(
            options().with_reconnect(ReconnectConfig::new(Duration::from_secs(3), 0)),
            Arc::clone(&connector) as Arc<dyn TransportConnector>,
        )
        .unwrap();

        client.connect();
        wait_for(&client, ConnectionState::FailedPermanently).await;
        assert_eq!(connector.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_connect_recovers_from_failure() {
        let (connector, mut peers) = MemoryConnector::with_plan([false; 6], true);
        let client = client_with(&connector);

        client.connect();
        wait_for(&client, ConnectionState::FailedPermanently).await;

        client.connect();
        let _peer = next_peer(&mut peers).await;
        wait_for(&client, ConnectionState::Connected).await;

        assert_eq!(connector.attempts(), 7);
        assert_eq!(client.reconnect_attempts(), 0);
        assert_eq!(client.last_error(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_during_delay_suppresses_reconnect() {
        let (connector, _peers) = MemoryConnector::refusing();
        let client = client_with(&connector);

        client.connect();
        wait_for(&client, ConnectionState::Reconnecting).await;
        client.disconnect();
        wait_for(&client, ConnectionState::Disconnected).await;

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(connector.attempts(), 1);
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
        assert_eq!(client.reconnect_attempts(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn connect_while_reconnecting_skips_delay() {
        let (connector, mut peers) = MemoryConnector::with_plan([false], true);
        let client = client_with(&connector);

        client.connect();
        wait_for(&client, ConnectionState::Reconnecting).await;
        let started = Instant::now();
        client.connect();

        let _peer = next_peer(&mut peers).await;
        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(connector.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_while_connected_notifies_and_stays_down() {
        let (connector, mut peers) = MemoryConnector::accepting();
        let client = client_with(&connector);
        let changes = record_connection_changes(&client);

        client.connect();
        let _peer = next_peer(&mut peers).await;
        wait_for(&client, ConnectionState::Connected).await;

        client.disconnect();
        wait_for(&client, ConnectionState::Disconnected).await;
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(connector.attempts(), 1);
        assert_eq!(*changes.lock(), vec![true, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn option_callbacks_are_registered() {
        let (connector, mut peers) = MemoryConnector::accepting();
        let (tx, mut connected) = mpsc::unbounded_channel();
        let client = PriceStreamClient::with_connector(
            options().on_connection_change(move |flag| {
                let _ = tx.send(*flag);
            }),
            Arc::clone(&connector) as Arc<dyn TransportConnector>,
        )
        .unwrap();

        client.connect();
        let _peer = next_peer(&mut peers).await;
        assert_eq!(connected.recv().await, Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn removed_listener_is_not_called() {
        let (connector, mut peers) = MemoryConnector::accepting();
        let client = client_with(&connector);
        let changes = record_connection_changes(&client);
        let removed = Arc::new(Mutex::new(0_u32));
        let sink = Arc::clone(&removed);
        let id = client.add_connection_listener(move |_| *sink.lock() += 1);

        assert!(client.remove_listener(id));
        assert!(!client.remove_listener(id));

        client.connect();
        let _peer = next_peer(&mut peers).await;
        wait_for(&client, ConnectionState::Connected).await;

        assert_eq!(*changes.lock(), vec![true]);
        assert_eq!(*removed.lock(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn close_stops_connection_task() {
        let (connector, mut peers) = MemoryConnector::accepting();
        let client = client_with(&connector);
        let changes = record_connection_changes(&client);
        let state = client.state_changes();

        client.connect();
        let _peer = next_peer(&mut peers).await;
        wait_for(&client, ConnectionState::Connected).await;

        client.close().await.unwrap();

        assert_eq!(*state.borrow(), ConnectionState::Disconnected);
        assert_eq!(*changes.lock(), vec![true, false]);
    }
}
