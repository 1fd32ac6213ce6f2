//! Shared application state handed to every handler

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::core::registry::SessionRegistry;
use crate::core::tts::SharedSpeechModel;
use crate::core::worker::SynthesisWorker;
use crate::handlers::stream::messages::ServerInfo;

/// Application state shared by every request handler
pub struct AppState {
    pub config: ServerConfig,
    pub worker: SynthesisWorker,
    pub registry: Arc<SessionRegistry>,
    /// Capability info sent in `connection_established`
    pub server_info: ServerInfo,
}

impl AppState {
    /// Build state around an already loaded model
    pub fn new(config: ServerConfig, model: SharedSpeechModel) -> Arc<Self> {
        let info = model.info().clone();
        let server_info = ServerInfo {
            model: info.model,
            device: info.device,
            sample_rate: info.sample_rate,
            max_text_length: config.generation.max_text_length,
            chunk_words: config.generation.max_unit_words,
        };

        Arc::new(Self {
            worker: SynthesisWorker::new(model, &config.synthesis),
            registry: Arc::new(SessionRegistry::new(config.max_sessions)),
            server_info,
            config,
        })
    }

    pub fn active_sessions(&self) -> usize {
        self.registry.len()
    }
}
