//! Application Services
//!
//! - `listeners`: observer lists for price deltas and connection changes
//! - `state`: the observable state shared by the facade and the connection
//!   manager

mod listeners;
mod state;

pub use listeners::{Listener, ListenerId, ListenerRegistry};
pub use state::StreamState;
