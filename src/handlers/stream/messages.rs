//! Streaming WebSocket message types
//!
//! This module defines the JSON messages exchanged on the `/ws` endpoint.
//! Every message is a tagged record with a `type` field.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// =============================================================================
// Incoming Messages (Client -> Server)
// =============================================================================

/// Incoming WebSocket messages from client
#[derive(Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type")]
pub enum IncomingMessage {
    /// Request speech for a block of text
    #[serde(rename = "generate_speech")]
    GenerateSpeech {
        /// Text to synthesize
        #[serde(default)]
        text: String,
        /// Speaker names; the first one drives synthesis
        #[serde(default)]
        speaker_names: Option<Vec<String>>,
    },

    /// Liveness probe
    #[serde(rename = "ping")]
    Ping {
        /// Opaque value echoed back in the pong
        #[serde(default)]
        timestamp: Option<Value>,
    },

    /// Stop the running generation
    #[serde(rename = "cancel")]
    Cancel,
}

// =============================================================================
// Outgoing Messages (Server -> Client)
// =============================================================================

/// Capability info sent once per connection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerInfo {
    pub model: String,
    pub device: String,
    pub sample_rate: u32,
    pub max_text_length: usize,
    pub chunk_words: usize,
}

/// Outgoing WebSocket messages to client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum OutgoingMessage {
    #[serde(rename = "connection_established")]
    ConnectionEstablished {
        session_id: String,
        server_info: ServerInfo,
    },

    /// One independently decodable WAV file, base64-encoded
    #[serde(rename = "audio_chunk")]
    AudioChunk {
        data: String,
        chunk_index: usize,
        text_chunk: String,
        generation_time_ms: f64,
        session_id: String,
        generation_id: u64,
    },

    #[serde(rename = "generation_complete")]
    GenerationComplete {
        session_id: String,
        total_chunks: usize,
        generation_id: u64,
    },

    /// Generation stopped by an explicit cancel or a newer request
    #[serde(rename = "cancelled")]
    Cancelled {
        session_id: String,
        generation_id: u64,
    },

    #[serde(rename = "pong")]
    Pong { timestamp: Value, session_id: String },

    #[serde(rename = "error")]
    Error { message: String, session_id: String },
}

// =============================================================================
// Message Routing
// =============================================================================

/// Work items for the per-connection writer task
#[derive(Debug)]
pub enum MessageRoute {
    /// JSON text message
    Outgoing(OutgoingMessage),
    /// Close connection
    Close,
}

// =============================================================================
// Validation
// =============================================================================

/// Error type for inbound message validation failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),
    #[error("Invalid message format: {0}")]
    InvalidFormat(String),
    #[error("Unknown message type: {0}")]
    UnknownType(String),
    #[error("Text cannot be empty")]
    EmptyText,
    #[error("Text too long (max {max} characters)")]
    TextTooLong { length: usize, max: usize },
    #[error("Binary messages are not supported")]
    UnsupportedFrame,
}

const KNOWN_TYPES: [&str; 3] = ["generate_speech", "ping", "cancel"];

/// Parse one text frame into an [`IncomingMessage`].
///
/// Distinguishes unparseable JSON, unknown or missing `type`, and
/// known types with malformed fields.
pub fn parse_incoming(text: &str) -> Result<IncomingMessage, ValidationError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ValidationError::InvalidJson(e.to_string()))?;

    let Some(object) = value.as_object() else {
        return Err(ValidationError::InvalidFormat(
            "expected a JSON object".to_string(),
        ));
    };

    match object.get("type") {
        Some(Value::String(kind)) if KNOWN_TYPES.contains(&kind.as_str()) => {}
        Some(Value::String(kind)) => return Err(ValidationError::UnknownType(kind.clone())),
        Some(other) => return Err(ValidationError::UnknownType(other.to_string())),
        None => return Err(ValidationError::UnknownType("null".to_string())),
    }

    serde_json::from_value(value).map_err(|e| ValidationError::InvalidFormat(e.to_string()))
}

/// A generation request that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Trimmed text
    pub text: String,
    /// Non-empty speaker list
    pub speakers: Vec<String>,
}

impl GenerationRequest {
    pub fn primary_speaker(&self) -> &str {
        self.speakers.first().map(String::as_str).unwrap_or_default()
    }
}

/// Trim and bound-check request text and resolve speakers.
///
/// The length bound counts characters of the trimmed text. Blank speaker
/// names are dropped; an empty list falls back to `default_speaker`.
pub fn validate_generation(
    text: &str,
    speaker_names: Option<Vec<String>>,
    max_text_length: usize,
    default_speaker: &str,
) -> Result<GenerationRequest, ValidationError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ValidationError::EmptyText);
    }

    let length = text.chars().count();
    if length > max_text_length {
        return Err(ValidationError::TextTooLong {
            length,
            max: max_text_length,
        });
    }

    let mut speakers: Vec<String> = speaker_names
        .unwrap_or_default()
        .into_iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();
    if speakers.is_empty() {
        speakers.push(default_speaker.to_string());
    }

    Ok(GenerationRequest {
        text: text.to_string(),
        speakers,
    })
}
