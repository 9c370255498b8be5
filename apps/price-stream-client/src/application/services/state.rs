use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::RwLock;
use tokio::sync::watch;

use super::listeners::ListenerRegistry;
use crate::domain::streaming::{ConnectionState, PriceStore, PriceUpdate};
use crate::domain::subscription::SubscriptionRegistry;

/// State shared between the client facade and the connection manager.
///
/// Only the connection manager writes the connection state, the reconnect
/// counter and the price cache. The facade writes the subscription registry.
/// Everyone may read.
#[derive(Debug)]
pub struct StreamState {
    connection: watch::Sender<ConnectionState>,
    subscriptions: SubscriptionRegistry,
    prices: PriceStore,
    last_error: RwLock<Option<String>>,
    reconnect_attempts: AtomicU32,
    price_listeners: ListenerRegistry<PriceUpdate>,
    connection_listeners: ListenerRegistry<bool>,
}

impl Default for StreamState {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamState {
    /// Create state for a fresh, disconnected client.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connection: watch::Sender::new(ConnectionState::Disconnected),
            subscriptions: SubscriptionRegistry::new(),
            prices: PriceStore::new(),
            last_error: RwLock::new(None),
            reconnect_attempts: AtomicU32::new(0),
            price_listeners: ListenerRegistry::new(),
            connection_listeners: ListenerRegistry::new(),
        }
    }

    // =========================================================================
    // Connection State
    // =========================================================================

    /// Current connection state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        *self.connection.borrow()
    }

    /// Receiver that observes every connection state change.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.connection.subscribe()
    }

    /// Publish a new connection state.
    ///
    /// Connection listeners fire only when `is_connected` flips, so repeated
    /// transitions between non-connected states are silent.
    pub fn set_connection_state(&self, state: ConnectionState) {
        let previous = self.connection.send_replace(state);
        if previous == state {
            return;
        }

        tracing::debug!(from = %previous, to = %state, "Connection state changed");

        if previous.is_connected() != state.is_connected() {
            self.connection_listeners.notify(&state.is_connected());
        }
    }

    /// Reconnection attempts made since the last successful connect.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts.load(Ordering::Relaxed)
    }

    /// Record the reconnect counter.
    pub fn set_reconnect_attempts(&self, attempts: u32) {
        self.reconnect_attempts.store(attempts, Ordering::Relaxed);
    }

    // =========================================================================
    // Errors
    // =========================================================================

    /// The most recent consumer-facing error, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Replace the current error.
    pub fn set_error(&self, message: impl Into<String>) {
        *self.last_error.write() = Some(message.into());
    }

    /// Clear the current error.
    pub fn clear_error(&self) {
        *self.last_error.write() = None;
    }

    // =========================================================================
    // Subscriptions & Prices
    // =========================================================================

    /// Desired subscription set.
    #[must_use]
    pub const fn subscriptions(&self) -> &SubscriptionRegistry {
        &self.subscriptions
    }

    /// Last-value price cache.
    #[must_use]
    pub const fn prices(&self) -> &PriceStore {
        &self.prices
    }

    // =========================================================================
    // Listeners
    // =========================================================================

    /// Listeners receiving each applied price delta.
    #[must_use]
    pub const fn price_listeners(&self) -> &ListenerRegistry<PriceUpdate> {
        &self.price_listeners
    }

    /// Listeners receiving `true`/`false` on connect/disconnect.
    #[must_use]
    pub const fn connection_listeners(&self) -> &ListenerRegistry<bool> {
        &self.connection_listeners
    }
}
