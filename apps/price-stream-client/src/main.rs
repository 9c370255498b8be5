//! Price Stream Client Binary
//!
//! Connects to a backend price stream, subscribes to the configured symbols
//! and logs every price delta until interrupted.
//!
//! # Usage
//!
//! ```bash
//! PRICE_STREAM_SYMBOLS=TCS,INFY cargo run --bin price-stream-client
//! ```
//!
//! # Environment Variables
//!
//! - `PRICE_STREAM_BACKEND_URL`: Backend base URL (default: <http://localhost:8000>)
//! - `PRICE_STREAM_URL`: Explicit stream URL, overrides the backend derivation
//! - `PRICE_STREAM_RECONNECT_DELAY_MS`: Delay between reconnects (default: 3000)
//! - `PRICE_STREAM_MAX_RECONNECT_ATTEMPTS`: Reconnect cap (default: 5)
//! - `PRICE_STREAM_HEARTBEAT_INTERVAL_SECS`: Ping interval (default: 30)
//! - `PRICE_STREAM_AUTO_CONNECT`: Connect on startup (default: true)
//! - `PRICE_STREAM_SYMBOLS`: Comma-separated symbols to subscribe to
//! - `PRICE_STREAM_METRICS_PORT`: Prometheus metrics port (default: 0, disabled)
//! - `OTEL_ENABLED`: Export traces over OTLP (default: false)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `OTEL_SERVICE_NAME`: Service name (default: price-stream-client)
//! - `RUST_LOG`: Log filter (default: `price_stream_client=info`)

use std::net::SocketAddr;

use anyhow::Context;
use price_stream_client::infrastructure::telemetry;
use price_stream_client::{
    ClientOptions, ClientSettings, PriceStreamClient, PriceUpdate, serve_metrics,
};
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    load_dotenv();

    let _telemetry_guard = telemetry::init()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting price stream client"
    );

    let settings = ClientSettings::from_env()?;
    log_settings(&settings);

    if settings.metrics_port != 0 {
        serve_metrics(SocketAddr::from(([0, 0, 0, 0], settings.metrics_port)))?;
    }

    let options = ClientOptions::from_settings(&settings)
        .on_price_update(log_prices)
        .on_connection_change(|connected| {
            if *connected {
                tracing::info!("Price stream is live");
            } else {
                tracing::warn!("Price stream is down");
            }
        });

    let client = PriceStreamClient::create(options)?;
    if !settings.symbols.is_empty() {
        client.subscribe(&settings.symbols);
    }

    await_shutdown().await?;

    if let Some(error) = client.last_error() {
        tracing::info!(error = %error, "Last reported stream error");
    }
    client.close().await.context("connection task did not stop cleanly")?;

    tracing::info!("Price stream client stopped");
    Ok(())
}

fn log_prices(delta: &PriceUpdate) {
    for (symbol, payload) in delta {
        tracing::info!(
            symbol = %symbol,
            last = ?payload.last_price(),
            payload = %payload.as_value(),
            "Price update"
        );
    }
}

/// Log the parsed configuration.
fn log_settings(settings: &ClientSettings) {
    tracing::info!(
        url = settings.stream_url().as_deref().unwrap_or("<invalid>"),
        reconnect_delay_ms = settings.reconnect_delay.as_millis(),
        max_reconnect_attempts = settings.max_reconnect_attempts,
        heartbeat_interval_secs = settings.heartbeat_interval.as_secs(),
        auto_connect = settings.auto_connect,
        symbols = ?settings.symbols,
        metrics_port = settings.metrics_port,
        "Configuration loaded"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
async fn await_shutdown() -> anyhow::Result<()> {
    #[cfg(unix)]
    let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
        .context("failed to install SIGTERM handler")?;

    #[cfg(unix)]
    let terminate = terminate.recv();

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Option<()>>();

    tokio::select! {
        result = signal::ctrl_c() => {
            result.context("failed to listen for Ctrl+C")?;
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    Ok(())
}
