use std::env;
use std::fmt::Display;
use std::str::FromStr;

use super::{ConfigError, ServerConfig};

/// Build a configuration from the defaults overlaid with environment variables
pub(super) fn load_from_env() -> Result<ServerConfig, ConfigError> {
    let mut config = ServerConfig::default();

    if let Some(host) = read_string("HOST") {
        config.host = host;
    }
    if let Some(port) = read_parsed("PORT")? {
        config.port = port;
    }

    if let Some(provider) = read_string("TTS_MODEL_PROVIDER") {
        config.model.provider = provider;
    }
    if let Some(model_id) = read_string("TTS_MODEL_ID") {
        config.model.model_id = model_id;
    }
    if let Some(device) = read_string("TTS_DEVICE") {
        config.model.device = device;
    }
    if let Some(sample_rate) = read_parsed("TTS_SAMPLE_RATE")? {
        config.model.sample_rate = sample_rate;
    }

    if let Some(max_concurrent) = read_parsed("SYNTHESIS_MAX_CONCURRENT")? {
        config.synthesis.max_concurrent = max_concurrent;
    }
    if let Some(timeout_ms) = read_parsed("SYNTHESIS_TIMEOUT_MS")? {
        config.synthesis.timeout_ms = timeout_ms;
    }

    if let Some(max_text_length) = read_parsed("MAX_TEXT_LENGTH")? {
        config.generation.max_text_length = max_text_length;
    }
    if let Some(max_unit_words) = read_parsed("CHUNK_MAX_WORDS")? {
        config.generation.max_unit_words = max_unit_words;
    }
    if let Some(chunk_delay_ms) = read_parsed("CHUNK_DELAY_MS")? {
        config.generation.chunk_delay_ms = chunk_delay_ms;
    }
    if let Some(speaker) = read_string("DEFAULT_SPEAKER") {
        config.generation.default_speaker = speaker;
    }

    if let Some(max_sessions) = read_parsed("MAX_SESSIONS")? {
        config.max_sessions = Some(max_sessions);
    }
    if let Some(idle_timeout_secs) = read_parsed("IDLE_TIMEOUT_SECS")? {
        config.idle_timeout_secs = idle_timeout_secs;
    }
    if let Some(write_timeout_ms) = read_parsed("WRITE_TIMEOUT_MS")? {
        config.write_timeout_ms = write_timeout_ms;
    }
    if let Some(origins) = read_string("CORS_ALLOWED_ORIGINS") {
        config.cors_allowed_origins = Some(origins);
    }

    Ok(config)
}

/// Read a variable, treating blank values as unset
fn read_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn read_parsed<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    let Some(raw) = read_string(key) else {
        return Ok(None);
    };

    raw.parse::<T>()
        .map(Some)
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw,
            reason: e.to_string(),
        })
}
