pub mod chunker;
pub mod registry;
pub mod session;
pub mod tts;
pub mod worker;

// Re-export commonly used types for convenience
pub use chunker::{ChunkUnit, DEFAULT_MAX_UNIT_WORDS, split};
pub use registry::{RegistryError, SessionRegistry};
pub use session::{Session, SessionError, SessionState};
pub use tts::{
    ModelInfo, SharedSpeechModel, SpeechModel, TTSError, TTSResult, encode_wav,
    load_speech_model,
};
pub use worker::{SynthesisError, SynthesisWorker, SynthesizedAudio};
