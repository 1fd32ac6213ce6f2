//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `stream` - Streaming text-to-speech WebSocket

pub mod api;
pub mod stream;

// Re-export commonly used handlers for convenient access
pub use stream::stream_handler;
