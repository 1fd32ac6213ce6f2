//! Session capacity middleware for WebSocket connections
//!
//! Rejects WebSocket upgrades with 503 once the session registry holds
//! `max_sessions` live sessions, before any session is created.
//!
//! # Example
//!
//! ```ignore
//! use axum::Router;
//! use tts_stream_gateway::middleware::session_limit_middleware;
//!
//! let app = Router::new()
//!     .route("/ws", get(stream_handler))
//!     .layer(axum::middleware::from_fn_with_state(
//!         state.clone(),
//!         session_limit_middleware,
//!     ));
//! ```

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::state::AppState;

/// Middleware that enforces the global session limit.
///
/// Only WebSocket upgrade requests (detected by the Upgrade header) are
/// checked; everything else passes through.
pub async fn session_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !is_websocket_upgrade(&request) {
        return next.run(request).await;
    }

    if state.registry.is_at_capacity() {
        tracing::warn!(
            active_sessions = state.registry.len(),
            "Rejecting connection: session limit reached"
        );
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            "Server at capacity. Please try again later.",
        )
            .into_response();
    }

    next.run(request).await
}

fn is_websocket_upgrade(request: &Request<Body>) -> bool {
    request
        .headers()
        .get("upgrade")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false)
}
