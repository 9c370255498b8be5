//! Port Interfaces
//!
//! Defines the transport contract the connection manager drives, following
//! the Hexagonal Architecture pattern. The production adapter is the
//! tokio-tungstenite client in `infrastructure::stream::websocket`.
//!
//! ## Driven Ports (Outbound)
//!
//! - `TransportConnector`: Opens one physical connection to an endpoint
//! - `TransportSession`: An open connection exchanging text frames

use async_trait::async_trait;

/// Errors raised by a transport adapter.
///
/// Every variant is transient from the client's point of view: it feeds the
/// reconnection policy rather than being returned to consumers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The connection could not be opened.
    #[error("failed to open connection: {0}")]
    Connect(String),

    /// A frame could not be written.
    #[error("failed to send frame: {0}")]
    Send(String),

    /// The connection failed while reading.
    #[error("failed to receive frame: {0}")]
    Receive(String),
}

/// Opens physical connections.
#[async_trait]
pub trait TransportConnector: Send + Sync {
    /// Open a connection to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Connect`] if the endpoint cannot be reached
    /// or the handshake fails.
    async fn connect(&self, url: &str) -> Result<Box<dyn TransportSession>, TransportError>;
}

/// One open connection.
#[async_trait]
pub trait TransportSession: Send {
    /// Write a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Send`] if the connection is no longer usable.
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Wait for the next inbound text frame.
    ///
    /// Control frames are handled by the adapter. Returns `None` once the
    /// peer has closed the connection. Must be cancel-safe.
    async fn next_text(&mut self) -> Option<Result<String, TransportError>>;

    /// Close the connection, best effort.
    async fn close(&mut self);
}
