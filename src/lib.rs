pub mod config;
pub mod core;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

// Re-export commonly used items for convenience
pub use config::ServerConfig;
pub use crate::core::{
    ModelInfo, Session, SessionRegistry, SessionState, SpeechModel, SynthesisError,
    SynthesisWorker, TTSError, load_speech_model,
};
pub use errors::{StartupError, StartupResult};
pub use state::AppState;
