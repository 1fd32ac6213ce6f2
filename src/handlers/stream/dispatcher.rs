//! Inbound message dispatch
//!
//! Routes each parsed client message to the session. Protocol errors are
//! answered with an `error` message and never end the connection.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::core::session::{Session, SessionError};
use crate::state::AppState;

use super::messages::{IncomingMessage, OutgoingMessage, parse_incoming, validate_generation};

/// Parse and process one text frame
///
/// # Returns
/// * `bool` - true to continue processing, false once the connection is gone
pub async fn handle_text_frame(text: &str, session: &Arc<Session>, app_state: &AppState) -> bool {
    match parse_incoming(text) {
        Ok(msg) => handle_incoming_message(msg, session, app_state).await,
        Err(e) => {
            warn!(session_id = %session.id(), "Rejected message: {}", e);
            reply(session, session.error_message(e.to_string())).await
        }
    }
}

/// Process an incoming message based on its type
pub async fn handle_incoming_message(
    msg: IncomingMessage,
    session: &Arc<Session>,
    app_state: &AppState,
) -> bool {
    match msg {
        IncomingMessage::GenerateSpeech {
            text,
            speaker_names,
        } => {
            let generation = &app_state.config.generation;
            let request = match validate_generation(
                &text,
                speaker_names,
                generation.max_text_length,
                &generation.default_speaker,
            ) {
                Ok(request) => request,
                Err(e) => {
                    debug!(session_id = %session.id(), "Invalid generation request: {}", e);
                    return reply(session, session.error_message(e.to_string())).await;
                }
            };

            match session.start_generation(request).await {
                Ok(_) => true,
                Err(SessionError::ConnectionClosed) => false,
                Err(e) => reply(session, session.error_message(e.to_string())).await,
            }
        }
        IncomingMessage::Ping { timestamp } => {
            let pong = OutgoingMessage::Pong {
                timestamp: timestamp.unwrap_or(Value::Null),
                session_id: session.id().to_string(),
            };
            reply(session, pong).await
        }
        IncomingMessage::Cancel => {
            session.cancel().await;
            true
        }
    }
}

async fn reply(session: &Session, message: OutgoingMessage) -> bool {
    session.send(message).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::core::tts::load_speech_model;
    use crate::handlers::stream::messages::MessageRoute;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn setup(max_text_length: usize) -> (Arc<AppState>, Arc<Session>, mpsc::Receiver<MessageRoute>) {
        let mut config = ServerConfig::default();
        config.generation.max_text_length = max_text_length;
        config.generation.chunk_delay_ms = 0;

        let model = load_speech_model(&config.model).unwrap();
        let state = AppState::new(config, model);

        let (tx, rx) = mpsc::channel(32);
        let session = Session::new(
            "sess-d".to_string(),
            tx,
            state.worker.clone(),
            state.config.generation.clone(),
            &state.registry,
        );
        state.registry.register(session.clone()).unwrap();
        (state, session, rx)
    }

    async fn next(rx: &mut mpsc::Receiver<MessageRoute>) -> OutgoingMessage {
        match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
            Ok(Some(MessageRoute::Outgoing(message))) => message,
            other => panic!("Expected outgoing message, got {:?}", other),
        }
    }

    fn error_text(message: OutgoingMessage) -> String {
        match message {
            OutgoingMessage::Error {
                message,
                session_id,
            } => {
                assert_eq!(session_id, "sess-d");
                message
            }
            other => panic!("Expected error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_ping_echoes_timestamp() {
        let (state, session, mut rx) = setup(100);

        assert!(handle_text_frame(r#"{"type":"ping","timestamp":1234.5}"#, &session, &state).await);
        assert_eq!(
            next(&mut rx).await,
            OutgoingMessage::Pong {
                timestamp: json!(1234.5),
                session_id: "sess-d".to_string(),
            }
        );

        assert!(handle_text_frame(r#"{"type":"ping"}"#, &session, &state).await);
        assert_eq!(
            next(&mut rx).await,
            OutgoingMessage::Pong {
                timestamp: Value::Null,
                session_id: "sess-d".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_protocol_errors_keep_connection() {
        let (state, session, mut rx) = setup(10);

        assert!(handle_text_frame("not json", &session, &state).await);
        assert!(error_text(next(&mut rx).await).starts_with("Invalid JSON:"));

        assert!(handle_text_frame(r#"{"type":"sing"}"#, &session, &state).await);
        assert_eq!(error_text(next(&mut rx).await), "Unknown message type: sing");

        assert!(handle_text_frame(r#"{"type":"generate_speech","text":"  "}"#, &session, &state).await);
        assert_eq!(error_text(next(&mut rx).await), "Text cannot be empty");

        assert!(
            handle_text_frame(
                r#"{"type":"generate_speech","text":"this text is too long"}"#,
                &session,
                &state
            )
            .await
        );
        assert_eq!(
            error_text(next(&mut rx).await),
            "Text too long (max 10 characters)"
        );
    }

    #[tokio::test]
    async fn test_generate_speech_streams_chunks() {
        let (state, session, mut rx) = setup(100);

        assert!(
            handle_text_frame(
                r#"{"type":"generate_speech","text":"Hello streaming world","speaker_names":[]}"#,
                &session,
                &state
            )
            .await
        );

        match next(&mut rx).await {
            OutgoingMessage::AudioChunk {
                chunk_index,
                text_chunk,
                ..
            } => {
                assert_eq!(chunk_index, 0);
                assert_eq!(text_chunk, "Hello streaming world.");
            }
            other => panic!("Expected audio chunk, got {:?}", other),
        }
        assert!(matches!(
            next(&mut rx).await,
            OutgoingMessage::GenerationComplete { total_chunks: 1, .. }
        ));
    }

    #[tokio::test]
    async fn test_cancel_when_idle_is_silent() {
        let (state, session, mut rx) = setup(100);

        assert!(handle_text_frame(r#"{"type":"cancel"}"#, &session, &state).await);
        assert!(handle_text_frame(r#"{"type":"ping","timestamp":"after"}"#, &session, &state).await);

        // The pong is the first thing queued
        assert!(matches!(next(&mut rx).await, OutgoingMessage::Pong { .. }));
    }

    #[tokio::test]
    async fn test_returns_false_when_connection_gone() {
        let (state, session, rx) = setup(100);
        drop(rx);

        assert!(!handle_text_frame(r#"{"type":"ping"}"#, &session, &state).await);
    }
}
