//! Errors that stop the server from starting or serving

use thiserror::Error;

use crate::config::ConfigError;
use crate::core::tts::TTSError;

/// Fatal errors that prevent the server from starting or keep it from serving
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to load speech model: {0}")]
    ModelLoad(#[from] TTSError),

    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}

pub type StartupResult<T> = Result<T, StartupError>;
