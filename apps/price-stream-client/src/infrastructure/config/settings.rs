//! Client Configuration Settings
//!
//! Configuration for the price stream client, loaded from environment
//! variables, an env file, or any key lookup.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::domain::subscription::{Symbol, normalize_batch};

/// Backend used when none is configured.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

/// Path of the price stream endpoint on the backend.
pub const STREAM_PATH: &str = "/ws/prices";

const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(3000);
const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Complete client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    /// HTTP(S) base URL of the backend.
    pub backend_url: String,
    /// Explicit stream URL; wins over derivation from `backend_url`.
    pub url: Option<String>,
    /// Fixed delay between reconnection attempts.
    pub reconnect_delay: Duration,
    /// Reconnection attempts before giving up (0 = never reconnect).
    pub max_reconnect_attempts: u32,
    /// Heartbeat ping interval.
    pub heartbeat_interval: Duration,
    /// Connect on construction.
    pub auto_connect: bool,
    /// Symbols the binary subscribes to at startup.
    pub symbols: Vec<Symbol>,
    /// Prometheus metrics port (0 = disabled).
    pub metrics_port: u16,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            url: None,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            auto_connect: true,
            symbols: Vec::new(),
            metrics_port: 0,
        }
    }
}

impl ClientSettings {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured URLs cannot be used.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from the variables of a single env file.
    ///
    /// The process environment is not consulted.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// configured URLs cannot be used.
    pub fn from_env_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let vars = dotenvy::from_path_iter(path.as_ref())?
            .collect::<Result<HashMap<String, String>, _>>()?;
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// Unset or unparsable values fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidUrl`] if the backend URL has an
    /// unsupported scheme and no explicit stream URL is set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let lookup = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let settings = Self {
            backend_url: lookup("PRICE_STREAM_BACKEND_URL").unwrap_or(defaults.backend_url),
            url: lookup("PRICE_STREAM_URL"),
            reconnect_delay: lookup("PRICE_STREAM_RECONNECT_DELAY_MS")
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|ms| *ms > 0)
                .map_or(defaults.reconnect_delay, Duration::from_millis),
            max_reconnect_attempts: lookup("PRICE_STREAM_MAX_RECONNECT_ATTEMPTS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_reconnect_attempts),
            heartbeat_interval: lookup("PRICE_STREAM_HEARTBEAT_INTERVAL_SECS")
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map_or(defaults.heartbeat_interval, Duration::from_secs),
            auto_connect: lookup("PRICE_STREAM_AUTO_CONNECT")
                .and_then(|v| parse_bool(&v))
                .unwrap_or(defaults.auto_connect),
            symbols: lookup("PRICE_STREAM_SYMBOLS")
                .map(|v| normalize_batch(v.split(',')))
                .unwrap_or_default(),
            metrics_port: lookup("PRICE_STREAM_METRICS_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.metrics_port),
        };

        settings.stream_url()?;
        Ok(settings)
    }

    /// The WebSocket endpoint the client connects to.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidUrl`] if no explicit URL is set and the
    /// backend URL cannot be converted.
    pub fn stream_url(&self) -> Result<String, ConfigError> {
        match &self.url {
            Some(url) => Ok(url.clone()),
            None => derive_stream_url(&self.backend_url),
        }
    }
}

/// Derive the price stream endpoint from an HTTP(S) backend base URL.
///
/// `http` becomes `ws`, `https` becomes `wss`, and [`STREAM_PATH`] is
/// appended. Bases that already use `ws`/`wss` keep their scheme.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidUrl`] for any other scheme or an empty host.
pub fn derive_stream_url(backend_url: &str) -> Result<String, ConfigError> {
    let base = backend_url.trim().trim_end_matches('/');

    let (scheme, rest) = if let Some(rest) = base.strip_prefix("https://") {
        ("wss://", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        ("ws://", rest)
    } else if let Some(rest) = base.strip_prefix("wss://") {
        ("wss://", rest)
    } else if let Some(rest) = base.strip_prefix("ws://") {
        ("ws://", rest)
    } else {
        return Err(ConfigError::InvalidUrl(backend_url.to_string()));
    };

    if rest.is_empty() {
        return Err(ConfigError::InvalidUrl(backend_url.to_string()));
    }

    Ok(format!("{scheme}{rest}{STREAM_PATH}"))
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The URL does not use an HTTP(S) or WS(S) scheme.
    #[error("invalid backend URL '{0}': expected http://, https://, ws:// or wss://")]
    InvalidUrl(String),
    /// The env file could not be read or parsed.
    #[error("failed to load env file: {0}")]
    EnvFile(#[from] dotenvy::Error),
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
