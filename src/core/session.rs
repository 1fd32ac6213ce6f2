//! Per-connection session state machine
//!
//! A session owns at most one live generation. Every accepted request and
//! every cancellation advances the generation epoch; chunks produced under an
//! older epoch are dropped instead of sent. The epoch check and the enqueue
//! onto the connection's outbound queue happen under one lock, so a stale
//! chunk can never slip in behind a `cancelled` message.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::GenerationConfig;
use crate::core::chunker::{self, ChunkUnit};
use crate::core::registry::SessionRegistry;
use crate::core::worker::{SynthesisError, SynthesisWorker};
use crate::handlers::stream::messages::{GenerationRequest, MessageRoute, OutgoingMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Generating,
    Closing,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session is closed")]
    Closed,
    #[error("Text cannot be empty")]
    EmptyRequest,
    #[error("Connection closed")]
    ConnectionClosed,
}

/// Result of offering a generation message to the outbound queue
enum Delivery {
    Sent,
    Stale,
    Disconnected,
}

struct SessionInner {
    state: SessionState,
    epoch: u64,
    task: Option<JoinHandle<()>>,
}

pub struct Session {
    id: String,
    inner: Mutex<SessionInner>,
    closed: AtomicBool,
    outbound: mpsc::Sender<MessageRoute>,
    worker: SynthesisWorker,
    settings: GenerationConfig,
    registry: Weak<SessionRegistry>,
}

impl Session {
    pub fn new(
        id: String,
        outbound: mpsc::Sender<MessageRoute>,
        worker: SynthesisWorker,
        settings: GenerationConfig,
        registry: &Arc<SessionRegistry>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            inner: Mutex::new(SessionInner {
                state: SessionState::Idle,
                epoch: 0,
                task: None,
            }),
            closed: AtomicBool::new(false),
            outbound,
            worker,
            settings,
            registry: Arc::downgrade(registry),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    /// Current generation epoch
    pub fn epoch(&self) -> u64 {
        self.inner.lock().epoch
    }

    pub fn is_generating(&self) -> bool {
        self.state() == SessionState::Generating
    }

    /// Queue a message for the connection, waiting for queue capacity.
    pub async fn send(&self, message: OutgoingMessage) -> Result<(), SessionError> {
        self.outbound
            .send(MessageRoute::Outgoing(message))
            .await
            .map_err(|_| SessionError::ConnectionClosed)
    }

    /// Build an `error` message addressed from this session
    pub fn error_message(&self, message: impl Into<String>) -> OutgoingMessage {
        OutgoingMessage::Error {
            message: message.into(),
            session_id: self.id.clone(),
        }
    }

    /// Start a generation, superseding any running one.
    ///
    /// Returns the epoch that identifies the new generation. A superseded
    /// generation is reported to the client as `cancelled` before any chunk
    /// of the new one.
    pub async fn start_generation(
        self: &Arc<Self>,
        request: GenerationRequest,
    ) -> Result<u64, SessionError> {
        let units = chunker::split(&request.text, self.settings.max_unit_words);
        if units.is_empty() {
            return Err(SessionError::EmptyRequest);
        }
        let speaker = request.primary_speaker().to_string();

        let permit = self
            .outbound
            .reserve()
            .await
            .map_err(|_| SessionError::ConnectionClosed)?;

        let mut inner = self.inner.lock();
        if inner.state == SessionState::Closing {
            return Err(SessionError::Closed);
        }

        if let Some(task) = inner.task.take() {
            task.abort();
        }
        if inner.state == SessionState::Generating {
            info!(
                session_id = %self.id,
                generation_id = inner.epoch,
                "Generation superseded"
            );
            permit.send(MessageRoute::Outgoing(OutgoingMessage::Cancelled {
                session_id: self.id.clone(),
                generation_id: inner.epoch,
            }));
        }

        inner.epoch += 1;
        let epoch = inner.epoch;
        inner.state = SessionState::Generating;

        info!(
            session_id = %self.id,
            generation_id = epoch,
            units = units.len(),
            speaker = %speaker,
            "Generation started"
        );
        inner.task = Some(tokio::spawn(
            self.clone().run_generation(epoch, units, speaker),
        ));

        Ok(epoch)
    }

    /// Stop the running generation, if any.
    ///
    /// Always advances the epoch unless the session is closing. Returns true
    /// when a generation was actually stopped, in which case exactly one
    /// `cancelled` message is queued.
    pub async fn cancel(&self) -> bool {
        let permit = self.outbound.reserve().await.ok();

        let mut inner = self.inner.lock();
        if inner.state == SessionState::Closing {
            return false;
        }

        let previous = inner.epoch;
        inner.epoch += 1;
        if let Some(task) = inner.task.take() {
            task.abort();
        }

        if inner.state != SessionState::Generating {
            return false;
        }
        inner.state = SessionState::Idle;

        info!(session_id = %self.id, generation_id = previous, "Generation cancelled");
        if let Some(permit) = permit {
            permit.send(MessageRoute::Outgoing(OutgoingMessage::Cancelled {
                session_id: self.id.clone(),
                generation_id: previous,
            }));
        }
        true
    }

    /// Move to `Closing`, stop any generation, ask the writer to close the
    /// connection and leave the registry. Only the first call has effect.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        {
            let mut inner = self.inner.lock();
            inner.state = SessionState::Closing;
            inner.epoch += 1;
            if let Some(task) = inner.task.take() {
                task.abort();
            }
        }

        // The writer may already be gone or backed up; either way the socket is closing.
        let _ = self.outbound.try_send(MessageRoute::Close);

        if let Some(registry) = self.registry.upgrade() {
            registry.remove_session(self);
        }
        info!(session_id = %self.id, "Session closed");
    }

    async fn run_generation(self: Arc<Self>, epoch: u64, units: Vec<ChunkUnit>, speaker: String) {
        let total_chunks = units.len();
        let delay = self.settings.chunk_delay();

        for unit in units {
            let ChunkUnit {
                index,
                text_segment,
                is_final,
            } = unit;

            let audio = match self.worker.synthesize_unit(&text_segment, &speaker).await {
                Ok(audio) => audio,
                Err(e) => {
                    self.fail_generation(epoch, index, e).await;
                    return;
                }
            };

            debug!(
                session_id = %self.id,
                generation_id = epoch,
                chunk_index = index,
                generation_time_ms = audio.generation_time_ms,
                "Chunk synthesized"
            );

            let message = OutgoingMessage::AudioChunk {
                data: BASE64.encode(&audio.audio_bytes),
                chunk_index: index,
                text_chunk: text_segment,
                generation_time_ms: round_ms(audio.generation_time_ms),
                session_id: self.id.clone(),
                generation_id: epoch,
            };
            match self.emit_if_current(epoch, message).await {
                Delivery::Sent => {}
                Delivery::Stale => {
                    debug!(session_id = %self.id, generation_id = epoch, "Stale chunk dropped");
                    return;
                }
                Delivery::Disconnected => {
                    self.connection_lost(epoch);
                    return;
                }
            }

            if !is_final && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        self.complete_generation(epoch, total_chunks).await;
    }

    /// Enqueue `message` only if `epoch` is still the live generation.
    async fn emit_if_current(&self, epoch: u64, message: OutgoingMessage) -> Delivery {
        let Ok(permit) = self.outbound.reserve().await else {
            return Delivery::Disconnected;
        };

        let inner = self.inner.lock();
        if inner.epoch != epoch || inner.state != SessionState::Generating {
            return Delivery::Stale;
        }
        permit.send(MessageRoute::Outgoing(message));
        Delivery::Sent
    }

    /// The writer is gone, so nothing this generation produces can be delivered.
    fn connection_lost(&self, epoch: u64) {
        warn!(
            session_id = %self.id,
            generation_id = epoch,
            "Outbound queue closed during generation"
        );
        self.close();
    }

    async fn complete_generation(&self, epoch: u64, total_chunks: usize) {
        let Ok(permit) = self.outbound.reserve().await else {
            self.connection_lost(epoch);
            return;
        };

        let mut inner = self.inner.lock();
        if inner.epoch != epoch || inner.state != SessionState::Generating {
            return;
        }
        inner.state = SessionState::Idle;
        inner.task = None;

        permit.send(MessageRoute::Outgoing(OutgoingMessage::GenerationComplete {
            session_id: self.id.clone(),
            total_chunks,
            generation_id: epoch,
        }));
        info!(
            session_id = %self.id,
            generation_id = epoch,
            total_chunks,
            "Generation complete"
        );
    }

    async fn fail_generation(&self, epoch: u64, chunk_index: usize, error: SynthesisError) {
        let Ok(permit) = self.outbound.reserve().await else {
            self.connection_lost(epoch);
            return;
        };

        let mut inner = self.inner.lock();
        if inner.epoch != epoch || inner.state != SessionState::Generating {
            return;
        }
        inner.epoch += 1;
        inner.state = SessionState::Idle;
        inner.task = None;

        warn!(
            session_id = %self.id,
            generation_id = epoch,
            chunk_index,
            "Synthesis failed: {}",
            error
        );
        permit.send(MessageRoute::Outgoing(self.error_message(format!(
            "Synthesis failed for chunk {chunk_index}: {error}"
        ))));
    }
}

fn round_ms(ms: f64) -> f64 {
    (ms * 100.0).round() / 100.0
}
