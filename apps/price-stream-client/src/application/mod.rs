//! Application Layer - Port definitions and shared client state.
//!
//! This layer defines how the connection manager talks to a transport and
//! holds the state every consumer observes.

/// Port interfaces for the persistent transport.
pub mod ports;

/// Observer registries and the shared, observable client state.
pub mod services;
