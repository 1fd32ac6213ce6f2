//! Streaming text-to-speech over WebSocket
//!
//! - `messages`: wire message types and inbound validation
//! - `dispatcher`: routes parsed messages to the session
//! - `handler`: connection lifecycle, read loop and writer task

pub mod dispatcher;
mod handler;
pub mod messages;

pub use handler::stream_handler;
pub use messages::{
    GenerationRequest, IncomingMessage, MessageRoute, OutgoingMessage, ServerInfo,
    ValidationError,
};
