#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Price Stream Client - Live Price Subscriptions over WebSocket
//!
//! A client library that maintains one WebSocket connection to a backend's
//! price stream endpoint, multiplexes symbol subscriptions over it, and
//! keeps the latest price per symbol for synchronous lookup.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core data types with no I/O
//!   - `streaming`: Connection states, price payloads and the price store
//!   - `subscription`: Symbol normalization and the desired subscription set
//!
//! - **Application**: Port definitions and shared state
//!   - `ports`: Transport interfaces the connection actor drives
//!   - `services`: Shared stream state and listener registries
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `client`: The public [`PriceStreamClient`] facade
//!   - `stream`: Connection actor, JSON codec, heartbeat and reconnect policy
//!   - `config`: Settings loading and endpoint derivation
//!   - `metrics`: Prometheus instrumentation
//!   - `telemetry`: Tracing subscriber and OpenTelemetry export
//!
//! # Data Flow
//!
//! ```text
//!                      commands                 text frames
//! PriceStreamClient ──────────────► Connection ◄────────────► Backend
//!        ▲                           Actor        /ws/prices
//!        │ snapshots                   │
//!        └──────── StreamState ◄───────┘
//!                (prices, subscriptions, state, listeners)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core streaming types with no external dependencies.
pub mod domain;

/// Application layer - Port definitions and shared state.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::streaming::{ConnectionState, PriceEntry, PricePayload, PriceUpdate};
pub use domain::subscription::Symbol;

// Ports and listeners
pub use application::ports::{TransportConnector, TransportError, TransportSession};
pub use application::services::{Listener, ListenerId};

// Client facade
pub use infrastructure::client::{ClientError, ClientOptions, PriceStreamClient};

// Stream configuration
pub use infrastructure::stream::{HeartbeatConfig, ReconnectConfig};

// Infrastructure config
pub use infrastructure::config::{ClientSettings, ConfigError, derive_stream_url};

// Metrics
pub use infrastructure::metrics::{init_metrics, serve_metrics};

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
