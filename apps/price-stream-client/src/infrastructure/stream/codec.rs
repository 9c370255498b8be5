//! Stream Codec
//!
//! Encodes outbound commands and decodes inbound frames for the price
//! stream. Decoding is strict about shape but never fatal: callers log and
//! drop anything that fails here.

use serde_json::Value;

use super::messages::{
    AckMessage, ClientCommand, ErrorMessage, PriceUpdateMessage, ServerMessage, frame_type,
};

/// Longest frame prefix quoted in error messages.
const PREVIEW_LEN: usize = 50;

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding/decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Frame carried a `type` this client does not understand.
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),

    /// Frame had no string `type` field.
    #[error("missing message type")]
    MissingMessageType,

    /// Frame was valid JSON but not an object.
    #[error("invalid message format: {0}")]
    InvalidFormat(String),
}

/// JSON codec for the price stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode one inbound text frame.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed JSON, a non-object frame, a missing or
    /// unknown `type`, or a body that does not match its `type`.
    pub fn decode(&self, text: &str) -> Result<ServerMessage, CodecError> {
        let value: Value = serde_json::from_str(text.trim())?;

        if !value.is_object() {
            return Err(CodecError::InvalidFormat(format!(
                "expected JSON object, got: {}",
                preview(text)
            )));
        }

        let msg_type = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(CodecError::MissingMessageType)?;

        match msg_type {
            frame_type::PRICE_UPDATE => {
                let m: PriceUpdateMessage = serde_json::from_value(value)?;
                Ok(ServerMessage::PriceUpdate(m))
            }
            frame_type::SUBSCRIBED => {
                let m: AckMessage = serde_json::from_value(value)?;
                Ok(ServerMessage::Subscribed(m))
            }
            frame_type::UNSUBSCRIBED => {
                let m: AckMessage = serde_json::from_value(value)?;
                Ok(ServerMessage::Unsubscribed(m))
            }
            frame_type::PONG => Ok(ServerMessage::Pong),
            frame_type::ERROR => {
                let m: ErrorMessage = serde_json::from_value(value)?;
                Ok(ServerMessage::Error(m))
            }
            other => Err(CodecError::UnknownMessageType(other.to_string())),
        }
    }

    /// Encode an outbound command.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn encode(&self, command: &ClientCommand) -> Result<String, CodecError> {
        Ok(serde_json::to_string(command)?)
    }
}

fn preview(text: &str) -> &str {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(PREVIEW_LEN) {
        Some((idx, _)) => &trimmed[..idx],
        None => trimmed,
    }
}
