//! Streaming WebSocket route configuration
//!
//! This module configures the WebSocket endpoint for streaming synthesized
//! speech as ordered, independently decodable WAV chunks.

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::stream::stream_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the streaming WebSocket router
///
/// # Endpoint
///
/// `GET /ws` - WebSocket upgrade for streaming text-to-speech
///
/// # Protocol
///
/// On connect the server sends `connection_established` with the session id
/// and model capabilities. Clients then send:
/// 1. `generate_speech` with the text and optional speaker names
/// 2. `cancel` to stop the running generation
/// 3. `ping` with an optional timestamp
///
/// Server responds with:
/// - `audio_chunk` per synthesis unit, in order
/// - `generation_complete` after the last chunk
/// - `cancelled` when a generation is cancelled or superseded
/// - `pong` echoing the ping timestamp
/// - `error` on invalid requests or synthesis failure
///
/// # Example
///
/// ```json
/// // Client requests speech
/// {"type": "generate_speech", "text": "Hello there, how are you today?", "speaker_names": ["Alice"]}
///
/// // Server streams chunks
/// {"type": "audio_chunk", "data": "UklGR...", "chunk_index": 0, "text_chunk": "Hello there, how are you", "generation_time_ms": 41.7, "session_id": "...", "generation_id": 1}
/// {"type": "audio_chunk", "data": "UklGR...", "chunk_index": 1, "text_chunk": "today?", "generation_time_ms": 12.3, "session_id": "...", "generation_id": 1}
/// {"type": "generation_complete", "session_id": "...", "total_chunks": 2, "generation_id": 1}
/// ```
pub fn create_stream_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ws", get(stream_handler))
        .layer(TraceLayer::new_for_http())
}
