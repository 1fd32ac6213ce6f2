//! Server assembly and process lifecycle
//!
//! Loads the speech model, builds the router, binds the listener and serves
//! until Ctrl+C or SIGTERM, closing every live session on the way out.

use std::future::Future;
use std::sync::Arc;

use axum::{
    Router,
    http::{HeaderValue, Method, header::CONTENT_TYPE},
    middleware,
};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::config::{ModelConfig, ServerConfig};
use crate::core::tts::{SharedSpeechModel, TTSError, load_speech_model};
use crate::errors::{StartupError, StartupResult};
use crate::middleware::session_limit_middleware;
use crate::routes;
use crate::state::AppState;

/// Load the configured speech model off the async runtime
pub async fn load_model(config: &ModelConfig) -> StartupResult<SharedSpeechModel> {
    let config = config.clone();
    let model = tokio::task::spawn_blocking(move || load_speech_model(&config))
        .await
        .map_err(|e| TTSError::ModelLoad(format!("model loader task failed: {e}")))??;

    let info = model.info();
    info!(
        "Loaded speech model {} on {} ({} Hz)",
        info.model, info.device, info.sample_rate
    );
    Ok(model)
}

/// Build the complete application router
///
/// Layer order (outer to inner): cors -> session_limit -> handler
pub fn build_router(state: Arc<AppState>) -> Router {
    let stream_routes = routes::stream::create_stream_router().layer(
        middleware::from_fn_with_state(state.clone(), session_limit_middleware),
    );

    let cors_layer = cors_layer(state.config.cors_allowed_origins.as_deref());

    routes::api::create_api_router()
        .merge(stream_routes)
        .with_state(state)
        .layer(tower::util::option_layer(cors_layer))
}

fn cors_layer(origins: Option<&str>) -> Option<CorsLayer> {
    let Some(origins) = origins else {
        info!(
            "CORS not configured, defaulting to same-origin only. \
             Set CORS_ALLOWED_ORIGINS to enable cross-origin access."
        );
        return None;
    };

    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]);

    if origins.trim() == "*" {
        Some(layer.allow_origin(Any))
    } else {
        // Parse comma-separated origins
        let origins: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        Some(layer.allow_origin(origins))
    }
}

/// Bind the listening socket
pub async fn bind(config: &ServerConfig) -> StartupResult<TcpListener> {
    let address = config.address();
    TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind { address, source })
}

/// Serve `state` on `listener` until `shutdown` resolves.
///
/// All live sessions are closed once `shutdown` fires so their connections
/// end and the graceful shutdown can complete.
pub async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> StartupResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let registry = state.registry.clone();
    let app = build_router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            registry.close_all();
        })
        .await
        .map_err(StartupError::Serve)
}

/// Run the server until a shutdown signal arrives
pub async fn run(config: ServerConfig) -> StartupResult<()> {
    config.validate()?;

    let model = load_model(&config.model).await?;
    let listener = bind(&config).await?;
    let state = AppState::new(config, model);

    match listener.local_addr() {
        Ok(addr) => info!("Server listening on ws://{}/ws", addr),
        Err(e) => warn!("Could not read local address: {}", e),
    }

    serve(listener, state, wait_for_shutdown()).await?;

    info!("Server stopped");
    Ok(())
}

async fn wait_for_shutdown() {
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate_signal() => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}

#[cfg(unix)]
async fn terminate_signal() {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            warn!("Failed to register SIGTERM handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate_signal() {
    std::future::pending::<()>().await;
}
