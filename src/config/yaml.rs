use serde::Deserialize;
use std::path::Path;

use super::{ConfigError, ServerConfig};

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present in
/// the file override whatever the environment provided.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 8765
///   max_sessions: 256
///   idle_timeout_secs: 300
///   write_timeout_ms: 10000
///   cors_allowed_origins: "*"
///
/// model:
///   provider: "tone"
///   model_id: "tone-synth-v1"
///   device: "cpu"
///   sample_rate: 24000
///
/// synthesis:
///   max_concurrent: 4
///   timeout_ms: 30000
///
/// generation:
///   max_text_length: 10000
///   max_unit_words: 5
///   chunk_delay_ms: 50
///   default_speaker: "Alice"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub model: Option<ModelYaml>,
    pub synthesis: Option<SynthesisYaml>,
    pub generation: Option<GenerationYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub max_sessions: Option<usize>,
    pub idle_timeout_secs: Option<u64>,
    pub write_timeout_ms: Option<u64>,
    pub cors_allowed_origins: Option<String>,
}

/// Speech model configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ModelYaml {
    pub provider: Option<String>,
    pub model_id: Option<String>,
    pub device: Option<String>,
    pub sample_rate: Option<u32>,
}

/// Synthesis worker pool configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SynthesisYaml {
    pub max_concurrent: Option<usize>,
    pub timeout_ms: Option<u64>,
}

/// Generation limits from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GenerationYaml {
    pub max_text_length: Option<usize>,
    pub max_unit_words: Option<usize>,
    pub chunk_delay_ms: Option<u64>,
    pub default_speaker: Option<String>,
}

impl YamlConfig {
    /// Load YAML configuration from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(contents).map_err(|e| ConfigError::ParseYaml(e.to_string()))
    }

    /// Overlay every value present in the YAML onto `config`
    pub fn apply(self, config: &mut ServerConfig) {
        if let Some(server) = self.server {
            if let Some(host) = server.host {
                config.host = host;
            }
            if let Some(port) = server.port {
                config.port = port;
            }
            if let Some(max_sessions) = server.max_sessions {
                config.max_sessions = Some(max_sessions);
            }
            if let Some(idle_timeout_secs) = server.idle_timeout_secs {
                config.idle_timeout_secs = idle_timeout_secs;
            }
            if let Some(write_timeout_ms) = server.write_timeout_ms {
                config.write_timeout_ms = write_timeout_ms;
            }
            if let Some(origins) = server.cors_allowed_origins {
                config.cors_allowed_origins = Some(origins);
            }
        }

        if let Some(model) = self.model {
            if let Some(provider) = model.provider {
                config.model.provider = provider;
            }
            if let Some(model_id) = model.model_id {
                config.model.model_id = model_id;
            }
            if let Some(device) = model.device {
                config.model.device = device;
            }
            if let Some(sample_rate) = model.sample_rate {
                config.model.sample_rate = sample_rate;
            }
        }

        if let Some(synthesis) = self.synthesis {
            if let Some(max_concurrent) = synthesis.max_concurrent {
                config.synthesis.max_concurrent = max_concurrent;
            }
            if let Some(timeout_ms) = synthesis.timeout_ms {
                config.synthesis.timeout_ms = timeout_ms;
            }
        }

        if let Some(generation) = self.generation {
            if let Some(max_text_length) = generation.max_text_length {
                config.generation.max_text_length = max_text_length;
            }
            if let Some(max_unit_words) = generation.max_unit_words {
                config.generation.max_unit_words = max_unit_words;
            }
            if let Some(chunk_delay_ms) = generation.chunk_delay_ms {
                config.generation.chunk_delay_ms = chunk_delay_ms;
            }
            if let Some(speaker) = generation.default_speaker {
                config.generation.default_speaker = speaker;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_changes_nothing() {
        let yaml = YamlConfig::from_yaml_str("{}").unwrap();
        let mut config = ServerConfig::default();
        yaml.apply(&mut config);
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_partial_section() {
        let yaml = YamlConfig::from_yaml_str("synthesis:\n  timeout_ms: 250\n").unwrap();
        let mut config = ServerConfig::default();
        yaml.apply(&mut config);

        assert_eq!(config.synthesis.timeout_ms, 250);
        assert_eq!(
            config.synthesis.max_concurrent,
            ServerConfig::default().synthesis.max_concurrent
        );
    }

    #[test]
    fn test_unknown_type_is_parse_error() {
        let result = YamlConfig::from_yaml_str("server:\n  port: \"eighty\"\n");
        assert!(matches!(result, Err(ConfigError::ParseYaml(_))));
    }
}
