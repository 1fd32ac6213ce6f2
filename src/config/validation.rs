use super::{ConfigError, GenerationConfig, ModelConfig, ServerConfig, SynthesisConfig};

const MIN_SAMPLE_RATE: u32 = 8_000;
const MAX_SAMPLE_RATE: u32 = 192_000;

pub(super) fn validate_server(config: &ServerConfig) -> Result<(), ConfigError> {
    if config.host.trim().is_empty() {
        return Err(ConfigError::Invalid("host must not be empty".to_string()));
    }
    if config.port == 0 {
        return Err(ConfigError::Invalid("port must be non-zero".to_string()));
    }
    if config.max_sessions == Some(0) {
        return Err(ConfigError::Invalid(
            "max_sessions must be at least 1 when set".to_string(),
        ));
    }
    if config.idle_timeout_secs == 0 {
        return Err(ConfigError::Invalid(
            "idle_timeout_secs must be at least 1".to_string(),
        ));
    }
    if config.write_timeout_ms == 0 {
        return Err(ConfigError::Invalid(
            "write_timeout_ms must be at least 1".to_string(),
        ));
    }
    Ok(())
}

pub(super) fn validate_model(model: &ModelConfig) -> Result<(), ConfigError> {
    if model.provider.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "model provider must not be empty".to_string(),
        ));
    }
    if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&model.sample_rate) {
        return Err(ConfigError::Invalid(format!(
            "sample_rate {} outside supported range {}..={}",
            model.sample_rate, MIN_SAMPLE_RATE, MAX_SAMPLE_RATE
        )));
    }
    Ok(())
}

pub(super) fn validate_synthesis(synthesis: &SynthesisConfig) -> Result<(), ConfigError> {
    if synthesis.max_concurrent == 0 {
        return Err(ConfigError::Invalid(
            "synthesis max_concurrent must be at least 1".to_string(),
        ));
    }
    if synthesis.timeout_ms == 0 {
        return Err(ConfigError::Invalid(
            "synthesis timeout_ms must be at least 1".to_string(),
        ));
    }
    Ok(())
}

pub(super) fn validate_generation(generation: &GenerationConfig) -> Result<(), ConfigError> {
    if generation.max_text_length == 0 {
        return Err(ConfigError::Invalid(
            "max_text_length must be at least 1".to_string(),
        ));
    }
    if generation.max_unit_words == 0 {
        return Err(ConfigError::Invalid(
            "max_unit_words must be at least 1".to_string(),
        ));
    }
    if generation.default_speaker.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "default_speaker must not be empty".to_string(),
        ));
    }
    Ok(())
}
