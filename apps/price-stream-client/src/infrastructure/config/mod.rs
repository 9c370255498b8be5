//! Configuration Module
//!
//! Settings loading and stream endpoint derivation for the price stream
//! client.

mod settings;

pub use settings::{
    ClientSettings, ConfigError, DEFAULT_BACKEND_URL, STREAM_PATH, derive_stream_url,
};
