//! Price Stream Transport
//!
//! The connection actor and the pieces it is assembled from:
//!
//! - **messages / codec**: JSON wire protocol (`action` out, `type` in)
//! - **reconnect**: fixed-delay, capped retry policy
//! - **heartbeat**: application-level ping cadence
//! - **connection**: the state machine task owning the transport
//! - **websocket**: tokio-tungstenite adapter for the transport ports

pub mod codec;
pub(crate) mod connection;
pub mod heartbeat;
pub mod messages;
pub mod reconnect;
pub mod websocket;

#[cfg(test)]
pub(crate) mod testing;

pub use codec::{CodecError, JsonCodec};
pub use heartbeat::{HeartbeatConfig, HeartbeatEvent, HeartbeatMonitor};
pub use messages::{AckMessage, ClientCommand, ErrorMessage, PriceUpdateMessage, ServerMessage};
pub use reconnect::{ReconnectConfig, ReconnectError, ReconnectPolicy};
pub use websocket::WebSocketConnector;
