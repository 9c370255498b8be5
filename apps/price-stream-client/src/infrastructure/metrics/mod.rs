//! Prometheus Metrics Module
//!
//! Exposes client metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Frames**: Server frames received by type, undecodable frames dropped
//! - **Commands**: Client commands sent by action
//! - **Connection**: Connected flag, reconnect attempts, transport errors
//! - **State**: Desired subscription count, cached symbol count
//!
//! Recording without an installed recorder is a no-op, so the library can
//! be embedded without ever calling [`init_metrics`].

use std::net::SocketAddr;
use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Failure installing the Prometheus exporter.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// The recorder or HTTP listener could not be installed.
    #[error("failed to install Prometheus exporter: {0}")]
    Install(#[from] BuildError),
}

/// Initialize the Prometheus metrics recorder.
///
/// Subsequent calls return the handle installed by the first one.
///
/// # Errors
///
/// Returns an error if another global recorder is already installed.
pub fn init_metrics() -> Result<PrometheusHandle, MetricsError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Install the recorder together with an HTTP listener serving `/metrics`.
///
/// Must be called from within a Tokio runtime.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or a recorder is
/// already installed.
pub fn serve_metrics(addr: SocketAddr) -> Result<(), MetricsError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    register_metrics();
    tracing::info!(%addr, "Prometheus metrics listener started");
    Ok(())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized via [`init_metrics`].
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "price_stream_frames_received_total",
        "Total server frames decoded, by frame type"
    );
    describe_counter!(
        "price_stream_frames_dropped_total",
        "Total server frames dropped because they could not be decoded"
    );
    describe_counter!(
        "price_stream_commands_sent_total",
        "Total client commands sent, by action"
    );

    describe_gauge!(
        "price_stream_connected",
        "Whether the price stream is connected (0 or 1)"
    );
    describe_counter!(
        "price_stream_reconnects_total",
        "Total reconnection attempts scheduled"
    );
    describe_counter!(
        "price_stream_transport_errors_total",
        "Total transport failures (open, send or receive)"
    );

    describe_gauge!(
        "price_stream_subscriptions",
        "Number of symbols in the desired subscription set"
    );
    describe_gauge!(
        "price_stream_cached_symbols",
        "Number of symbols with a cached price"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record a decoded server frame.
pub fn record_frame_received(frame_type: &'static str) {
    counter!("price_stream_frames_received_total", "type" => frame_type).increment(1);
}

/// Record a frame dropped by the codec.
pub fn record_frame_dropped() {
    counter!("price_stream_frames_dropped_total").increment(1);
}

/// Record a command written to the transport.
pub fn record_command_sent(action: &'static str) {
    counter!("price_stream_commands_sent_total", "action" => action).increment(1);
}

/// Record a scheduled reconnection attempt.
pub fn record_reconnect() {
    counter!("price_stream_reconnects_total").increment(1);
}

/// Record a transport failure.
pub fn record_transport_error() {
    counter!("price_stream_transport_errors_total").increment(1);
}

/// Update the connected flag.
pub fn set_connected(connected: bool) {
    gauge!("price_stream_connected").set(if connected { 1.0 } else { 0.0 });
}

/// Update the desired subscription count.
#[allow(clippy::cast_precision_loss)]
pub fn set_subscriptions(count: usize) {
    gauge!("price_stream_subscriptions").set(count as f64);
}

/// Update the cached symbol count.
#[allow(clippy::cast_precision_loss)]
pub fn set_cached_symbols(count: usize) {
    gauge!("price_stream_cached_symbols").set(count as f64);
}

// =============================================================================
// Tests
// =============================================================================
