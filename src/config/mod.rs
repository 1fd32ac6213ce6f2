//! Configuration module for the streaming TTS gateway
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `env`: Environment variable loading
//! - `yaml`: YAML configuration file loading and merging
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use tts_stream_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variables as the base
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

mod env;
mod validation;
mod yaml;

pub use yaml::YamlConfig;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8765;
pub const DEFAULT_MODEL_PROVIDER: &str = "tone";
pub const DEFAULT_MODEL_ID: &str = "tone-synth-v1";
pub const DEFAULT_DEVICE: &str = "cpu";
pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;
pub const DEFAULT_MAX_CONCURRENT_SYNTHESES: usize = 4;
pub const DEFAULT_SYNTHESIS_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_MAX_TEXT_LENGTH: usize = 10_000;
pub const DEFAULT_MAX_UNIT_WORDS: usize = crate::core::chunker::DEFAULT_MAX_UNIT_WORDS;
pub const DEFAULT_CHUNK_DELAY_MS: u64 = 50;
pub const DEFAULT_SPEAKER: &str = "Alice";
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_WRITE_TIMEOUT_MS: u64 = 10_000;

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML config: {0}")]
    ParseYaml(String),

    #[error("Invalid value for {key}: '{value}' ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Speech model selection and the capability info advertised to clients
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelConfig {
    /// Model backend (e.g. "tone")
    pub provider: String,
    /// Identifier reported in `server_info.model`
    pub model_id: String,
    /// Device reported in `server_info.device`
    pub device: String,
    /// Output sample rate in Hz
    pub sample_rate: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: DEFAULT_MODEL_PROVIDER.to_string(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            device: DEFAULT_DEVICE.to_string(),
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

/// Worker pool settings for model calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisConfig {
    /// Maximum number of model calls in flight across all sessions
    pub max_concurrent: usize,
    /// Upper bound for a single unit's synthesis, queueing included
    pub timeout_ms: u64,
}

impl SynthesisConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT_SYNTHESES,
            timeout_ms: DEFAULT_SYNTHESIS_TIMEOUT_MS,
        }
    }
}

/// Per-generation limits and pacing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationConfig {
    /// Maximum request text length in characters
    pub max_text_length: usize,
    /// Words per synthesis unit
    pub max_unit_words: usize,
    /// Soft pacing delay between emitted chunks
    pub chunk_delay_ms: u64,
    /// Speaker used when a request names none
    pub default_speaker: String,
}

impl GenerationConfig {
    pub fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_text_length: DEFAULT_MAX_TEXT_LENGTH,
            max_unit_words: DEFAULT_MAX_UNIT_WORDS,
            chunk_delay_ms: DEFAULT_CHUNK_DELAY_MS,
            default_speaker: DEFAULT_SPEAKER.to_string(),
        }
    }
}

/// Server configuration
///
/// Contains all configuration needed to run the gateway:
/// - Server settings (host, port)
/// - Speech model selection
/// - Synthesis worker pool limits
/// - Generation limits and pacing
/// - Session limits (capacity, idle timeout) and CORS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    pub model: ModelConfig,
    pub synthesis: SynthesisConfig,
    pub generation: GenerationConfig,

    /// Maximum concurrent sessions. Default: None (unlimited)
    pub max_sessions: Option<usize>,
    /// Seconds without inbound messages before an idle session is closed
    pub idle_timeout_secs: u64,
    /// Deadline for a single socket write before the peer is considered gone
    pub write_timeout_ms: u64,
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: None (same-origin only)
    pub cors_allowed_origins: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            model: ModelConfig::default(),
            synthesis: SynthesisConfig::default(),
            generation: GenerationConfig::default(),
            max_sessions: None,
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            write_timeout_ms: DEFAULT_WRITE_TIMEOUT_MS,
            cors_allowed_origins: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables on top of the defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = env::load_from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    ///
    /// Environment variables form the base and the YAML file overrides them.
    /// The .env file is loaded in main.rs at application startup, so its values
    /// arrive here as ordinary environment variables.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let yaml_config = YamlConfig::from_file(path)?;

        let mut config = env::load_from_env()?;
        yaml_config.apply(&mut config);

        config.validate()?;
        Ok(config)
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Check every setting that would make the server misbehave at runtime
    pub fn validate(&self) -> Result<(), ConfigError> {
        validation::validate_server(self)?;
        validation::validate_model(&self.model)?;
        validation::validate_synthesis(&self.synthesis)?;
        validation::validate_generation(&self.generation)?;
        Ok(())
    }
}
