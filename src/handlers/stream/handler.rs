//! Streaming WebSocket handler
//!
//! One task per connection reads frames and dispatches them; a separate
//! writer task is the only thing that writes to the socket, draining the
//! session's bounded outbound queue in order. Each write has a deadline; a
//! peer that stops reading is dropped once it expires.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, timeout};
use tokio::select;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::core::session::Session;
use crate::state::AppState;

use super::dispatcher::handle_text_frame;
use super::messages::{MessageRoute, OutgoingMessage, ValidationError};

/// Outbound queue depth per connection
const CHANNEL_BUFFER_SIZE: usize = 64;

/// Maximum WebSocket frame size (1 MB)
const MAX_WS_FRAME_SIZE: usize = 1024 * 1024;

/// Maximum WebSocket message size (1 MB)
const MAX_WS_MESSAGE_SIZE: usize = 1024 * 1024;

/// Upper bound on how often the idle check runs
const MAX_IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Time the writer gets to flush queued messages after the session closes
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Streaming TTS WebSocket handler
///
/// # Arguments
/// * `ws` - The WebSocket upgrade request from Axum
/// * `state` - Application state containing configuration, worker and registry
///
/// # Returns
/// * `Response` - HTTP response that upgrades the connection to WebSocket
pub async fn stream_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    debug!("Streaming WebSocket connection upgrade requested");

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_stream_socket(socket, state))
}

async fn handle_stream_socket(socket: WebSocket, app_state: Arc<AppState>) {
    let session_id = Uuid::new_v4().to_string();

    let (sender, mut receiver) = socket.split();
    let (message_tx, message_rx) = mpsc::channel::<MessageRoute>(CHANNEL_BUFFER_SIZE);

    let session = Session::new(
        session_id.clone(),
        message_tx,
        app_state.worker.clone(),
        app_state.config.generation.clone(),
        &app_state.registry,
    );

    // Sender task for outgoing messages
    let mut sender_task = tokio::spawn(run_writer(
        session_id.clone(),
        sender,
        message_rx,
        Arc::downgrade(&session),
        app_state.config.write_timeout(),
    ));

    if let Err(e) = app_state.registry.register(session.clone()) {
        warn!(session_id = %session_id, "Rejecting connection: {}", e);
        let _ = session.send(session.error_message(e.to_string())).await;
        session.close();
        finish_writer(&mut sender_task).await;
        return;
    }

    info!(
        session_id = %session_id,
        active_sessions = app_state.registry.len(),
        "Streaming WebSocket connection established"
    );

    let established = OutgoingMessage::ConnectionEstablished {
        session_id: session_id.clone(),
        server_info: app_state.server_info.clone(),
    };
    if session.send(established).await.is_ok() {
        read_loop(&mut receiver, &mut sender_task, &session, &app_state).await;
    }

    // Cleanup
    session.close();
    drop(session);
    finish_writer(&mut sender_task).await;

    info!(session_id = %session_id, "Streaming WebSocket connection terminated");
}

/// Drain the outbound queue onto the socket.
///
/// A failed or timed out write means the peer is gone, so the session is
/// closed from here rather than waiting for the read side to notice.
async fn run_writer(
    session_id: String,
    mut sender: SplitSink<WebSocket, Message>,
    mut message_rx: mpsc::Receiver<MessageRoute>,
    session: Weak<Session>,
    write_timeout: Duration,
) {
    let mut connection_lost = false;

    while let Some(route) = message_rx.recv().await {
        let frame = match route {
            MessageRoute::Outgoing(message) => match serde_json::to_string(&message) {
                Ok(json_str) => Message::Text(json_str.into()),
                Err(e) => {
                    error!("Failed to serialize outgoing message: {}", e);
                    continue;
                }
            },
            MessageRoute::Close => {
                debug!(session_id = %session_id, "Closing WebSocket connection");
                let _ = timeout(write_timeout, sender.send(Message::Close(None))).await;
                break;
            }
        };

        match timeout(write_timeout, sender.send(frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(session_id = %session_id, "Failed to send WebSocket message: {}", e);
                connection_lost = true;
                break;
            }
            Err(_) => {
                warn!(
                    session_id = %session_id,
                    "WebSocket write stalled for {}ms, dropping connection",
                    write_timeout.as_millis()
                );
                connection_lost = true;
                break;
            }
        }
    }

    if connection_lost {
        if let Some(session) = session.upgrade() {
            session.close();
        }
    }
}

async fn read_loop(
    receiver: &mut SplitStream<WebSocket>,
    sender_task: &mut JoinHandle<()>,
    session: &Arc<Session>,
    app_state: &AppState,
) {
    let idle_timeout = app_state.config.idle_timeout();
    let check_interval = idle_timeout.min(MAX_IDLE_CHECK_INTERVAL);

    // Track last activity time for idle connection detection
    let mut last_activity = Instant::now();

    loop {
        select! {
            msg_result = receiver.next() => {
                last_activity = Instant::now();

                match msg_result {
                    Some(Ok(msg)) => {
                        if !process_stream_message(msg, session, app_state).await {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        warn!(session_id = %session.id(), "WebSocket error: {}", e);
                        break;
                    }
                    None => {
                        info!(session_id = %session.id(), "WebSocket connection closed by client");
                        break;
                    }
                }
            }
            _ = &mut *sender_task => {
                debug!(session_id = %session.id(), "Writer stopped, ending read loop");
                break;
            }
            _ = tokio::time::sleep(check_interval) => {
                // A running generation counts as activity
                if session.is_generating() {
                    last_activity = Instant::now();
                    continue;
                }
                if last_activity.elapsed() >= idle_timeout {
                    warn!(
                        session_id = %session.id(),
                        "WebSocket connection idle for {}s, closing stale connection",
                        last_activity.elapsed().as_secs()
                    );
                    let _ = session
                        .send(session.error_message("Connection closed due to inactivity"))
                        .await;
                    break;
                }
                debug!(session_id = %session.id(), "WebSocket connection idle check - still active");
            }
        }
    }
}

/// Process one WebSocket frame
///
/// # Returns
/// * `bool` - true to continue processing, false to terminate the connection
async fn process_stream_message(msg: Message, session: &Arc<Session>, app_state: &AppState) -> bool {
    match msg {
        Message::Text(text) => handle_text_frame(text.as_str(), session, app_state).await,
        Message::Binary(_) => {
            warn!(session_id = %session.id(), "Rejected binary frame");
            session
                .send(session.error_message(ValidationError::UnsupportedFrame.to_string()))
                .await
                .is_ok()
        }
        // Pings are answered by the transport
        Message::Ping(_) | Message::Pong(_) => true,
        Message::Close(_) => {
            info!(session_id = %session.id(), "WebSocket close received");
            false
        }
    }
}

async fn finish_writer(sender_task: &mut JoinHandle<()>) {
    // Already joined by the read loop
    if sender_task.is_finished() {
        return;
    }
    if timeout(WRITER_DRAIN_TIMEOUT, &mut *sender_task)
        .await
        .is_err()
    {
        sender_task.abort();
    }
}
