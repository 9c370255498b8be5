//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer, plus the public client facade.

/// Public client facade.
pub mod client;

/// Configuration loading and endpoint derivation.
pub mod config;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Connection actor, wire protocol and WebSocket transport.
pub mod stream;

/// Tracing subscriber and OpenTelemetry integration.
pub mod telemetry;
