//! Price Stream Message Types
//!
//! Wire format types for the JSON frames exchanged with the price stream
//! endpoint.
//!
//! # Client → Server
//!
//! ```json
//! {"action": "subscribe", "symbols": ["TCS", "INFY"]}
//! {"action": "unsubscribe", "symbols": ["TCS"]}
//! {"action": "ping"}
//! ```
//!
//! # Server → Client
//!
//! Discriminated by `type`:
//!
//! ```json
//! {"type": "price_update", "data": {"TCS": {"last": 3500.25}}}
//! {"type": "subscribed", "symbols": ["TCS"]}
//! {"type": "unsubscribed", "symbols": ["TCS"]}
//! {"type": "pong"}
//! {"type": "error", "message": "unknown symbol"}
//! ```

use serde::{Deserialize, Serialize};

use crate::domain::streaming::PriceUpdate;
use crate::domain::subscription::Symbol;

// =============================================================================
// Outbound Commands
// =============================================================================

/// Command sent from the client to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ClientCommand {
    /// Start streaming the given symbols.
    Subscribe {
        /// Normalized symbols.
        symbols: Vec<Symbol>,
    },
    /// Stop streaming the given symbols.
    Unsubscribe {
        /// Normalized symbols.
        symbols: Vec<Symbol>,
    },
    /// Liveness ping.
    Ping,
}

impl ClientCommand {
    /// The `action` discriminator.
    #[must_use]
    pub const fn action(&self) -> &'static str {
        match self {
            Self::Subscribe { .. } => "subscribe",
            Self::Unsubscribe { .. } => "unsubscribe",
            Self::Ping => "ping",
        }
    }
}

// =============================================================================
// Inbound Frames
// =============================================================================

/// Discriminator values of inbound frames.
pub mod frame_type {
    /// Symbol-keyed price delta.
    pub const PRICE_UPDATE: &str = "price_update";
    /// Subscribe acknowledgement.
    pub const SUBSCRIBED: &str = "subscribed";
    /// Unsubscribe acknowledgement.
    pub const UNSUBSCRIBED: &str = "unsubscribed";
    /// Ping response.
    pub const PONG: &str = "pong";
    /// Server-side error.
    pub const ERROR: &str = "error";
}

/// Body of a `price_update` frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PriceUpdateMessage {
    /// Symbol to payload.
    pub data: PriceUpdate,
}

/// Body of a `subscribed` / `unsubscribed` acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AckMessage {
    /// Symbols the acknowledgement covers.
    #[serde(default)]
    pub symbols: Vec<Symbol>,
}

/// Body of an `error` frame.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ErrorMessage {
    /// Human-readable description.
    pub message: String,
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// Price delta, routed to the price store.
    PriceUpdate(PriceUpdateMessage),
    /// Subscribe acknowledgement (informational).
    Subscribed(AckMessage),
    /// Unsubscribe acknowledgement (informational).
    Unsubscribed(AckMessage),
    /// Ping response (dropped).
    Pong,
    /// Server error, surfaced as the client's current error.
    Error(ErrorMessage),
}

impl ServerMessage {
    /// The `type` discriminator.
    #[must_use]
    pub const fn frame_type(&self) -> &'static str {
        match self {
            Self::PriceUpdate(_) => frame_type::PRICE_UPDATE,
            Self::Subscribed(_) => frame_type::SUBSCRIBED,
            Self::Unsubscribed(_) => frame_type::UNSUBSCRIBED,
            Self::Pong => frame_type::PONG,
            Self::Error(_) => frame_type::ERROR,
        }
    }
}
