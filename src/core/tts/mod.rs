mod base;
mod encoder;
pub mod tone;

pub use base::{ModelInfo, SharedSpeechModel, SpeechModel, TTSError, TTSResult};
pub use encoder::encode_wav;
pub use tone::ToneModel;

use std::sync::Arc;

use crate::config::ModelConfig;

/// Load the speech model named by `config.provider`.
///
/// # Supported Providers
///
/// - `"tone"` or `"sine"` - Built-in deterministic tonal synthesizer
///
/// Loading may be slow for real models; callers run it off the async runtime.
///
/// # Example
///
/// ```rust,ignore
/// use tts_stream_gateway::config::ModelConfig;
/// use tts_stream_gateway::core::tts::load_speech_model;
///
/// let model = load_speech_model(&ModelConfig::default())?;
/// let samples = model.synthesize("Hello there.", "Alice")?;
/// ```
pub fn load_speech_model(config: &ModelConfig) -> TTSResult<SharedSpeechModel> {
    let info = ModelInfo {
        model: config.model_id.clone(),
        device: config.device.clone(),
        sample_rate: config.sample_rate,
    };

    match config.provider.to_lowercase().as_str() {
        "tone" | "sine" => Ok(Arc::new(ToneModel::new(info)?)),
        _ => Err(TTSError::InvalidConfiguration(format!(
            "Unsupported speech model provider: {}. Supported providers: {}",
            config.provider,
            get_supported_model_providers().join(", ")
        ))),
    }
}

pub fn get_supported_model_providers() -> Vec<&'static str> {
    vec!["tone", "sine"]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_tone_model() {
        let config = ModelConfig {
            provider: "Tone".to_string(),
            ..Default::default()
        };
        let model = load_speech_model(&config).unwrap();
        assert_eq!(model.info().model, config.model_id);
        assert_eq!(model.info().sample_rate, config.sample_rate);
    }

    #[test]
    fn test_unknown_provider() {
        let config = ModelConfig {
            provider: "vibevoice".to_string(),
            ..Default::default()
        };
        let err = load_speech_model(&config).err().unwrap();
        let message = err.to_string();
        assert!(message.contains("Unsupported speech model provider: vibevoice"));
        assert!(message.contains("tone"));
        assert!(message.contains("sine"));
    }

    #[test]
    fn test_every_listed_provider_loads() {
        for provider in get_supported_model_providers() {
            let config = ModelConfig {
                provider: provider.to_string(),
                ..Default::default()
            };
            assert!(load_speech_model(&config).is_ok(), "{provider} failed to load");
        }
    }
}
