use std::sync::Arc;

use thiserror::Error;

/// Errors produced by speech models and audio encoding
#[derive(Debug, Error)]
pub enum TTSError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Model load failed: {0}")]
    ModelLoad(String),
    #[error("Synthesis failed: {0}")]
    Synthesis(String),
    #[error("Audio encoding failed: {0}")]
    Encoding(String),
}

pub type TTSResult<T> = Result<T, TTSError>;

/// Static description of a loaded model, advertised to clients on connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub model: String,
    pub device: String,
    pub sample_rate: u32,
}

/// A loaded text-to-speech model.
///
/// `synthesize` is a blocking call and is only ever invoked from the synthesis
/// worker's blocking pool, never directly on the async runtime. Implementations
/// must be safe to call from several threads at once.
pub trait SpeechModel: Send + Sync {
    fn info(&self) -> &ModelInfo;

    /// Produce mono PCM samples in `[-1.0, 1.0]` at `info().sample_rate`
    fn synthesize(&self, text: &str, speaker: &str) -> TTSResult<Vec<f32>>;
}

/// Model handle shared by every session
pub type SharedSpeechModel = Arc<dyn SpeechModel>;
