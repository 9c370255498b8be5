//! Streaming Types
//!
//! Connection state of the single physical stream and the last-value price
//! cache fed by it.

mod connection;
mod price;

pub use connection::ConnectionState;
pub use price::{PriceEntry, PricePayload, PriceStore, PriceUpdate};
