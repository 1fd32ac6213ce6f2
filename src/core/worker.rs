//! Synthesis worker
//!
//! Runs model calls on the blocking thread pool behind a process-wide
//! concurrency bound so slow synthesis never stalls connection handling.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::config::SynthesisConfig;
use crate::core::tts::{ModelInfo, SharedSpeechModel, TTSError, encode_wav};

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("{0}")]
    Model(String),
    #[error("{0}")]
    Encoding(String),
    #[error("synthesis timed out after {0} ms")]
    Timeout(u64),
    #[error("synthesis pool is shut down")]
    PoolClosed,
}

impl From<TTSError> for SynthesisError {
    fn from(err: TTSError) -> Self {
        match err {
            TTSError::Encoding(msg) => SynthesisError::Encoding(msg),
            other => SynthesisError::Model(other.to_string()),
        }
    }
}

/// Encoded audio for one synthesis unit
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    /// Complete WAV file bytes
    pub audio_bytes: Vec<u8>,
    pub sample_count: usize,
    /// Wall time of the model call plus encoding
    pub generation_time_ms: f64,
}

/// Shared handle to the model plus the concurrency bound around it
#[derive(Clone)]
pub struct SynthesisWorker {
    model: SharedSpeechModel,
    permits: Arc<Semaphore>,
    timeout: Duration,
}

impl SynthesisWorker {
    pub fn new(model: SharedSpeechModel, config: &SynthesisConfig) -> Self {
        Self {
            model,
            permits: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            timeout: config.timeout(),
        }
    }

    pub fn model_info(&self) -> &ModelInfo {
        self.model.info()
    }

    /// Number of model calls that could start right now
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Synthesize one unit of text and encode it as WAV.
    ///
    /// The timeout covers waiting for a permit as well as the model call. A
    /// timed-out call keeps running on its blocking thread until the model
    /// returns; it keeps its permit until then and its result is discarded.
    pub async fn synthesize_unit(
        &self,
        text: &str,
        speaker: &str,
    ) -> Result<SynthesizedAudio, SynthesisError> {
        let job = run_on_pool(
            self.model.clone(),
            self.permits.clone(),
            text.to_string(),
            speaker.to_string(),
        );

        match tokio::time::timeout(self.timeout, job).await {
            Ok(result) => {
                if let Ok(audio) = &result {
                    debug!(
                        "Synthesized {} samples in {:.2} ms",
                        audio.sample_count, audio.generation_time_ms
                    );
                }
                result
            }
            Err(_) => Err(SynthesisError::Timeout(self.timeout.as_millis() as u64)),
        }
    }
}

async fn run_on_pool(
    model: SharedSpeechModel,
    permits: Arc<Semaphore>,
    text: String,
    speaker: String,
) -> Result<SynthesizedAudio, SynthesisError> {
    let permit = permits
        .acquire_owned()
        .await
        .map_err(|_| SynthesisError::PoolClosed)?;

    tokio::task::spawn_blocking(move || -> Result<SynthesizedAudio, SynthesisError> {
        let _permit = permit;
        let started = Instant::now();

        let samples = model.synthesize(&text, &speaker)?;
        let audio_bytes = encode_wav(&samples, model.info().sample_rate)?;

        Ok(SynthesizedAudio {
            sample_count: samples.len(),
            audio_bytes,
            generation_time_ms: started.elapsed().as_secs_f64() * 1000.0,
        })
    })
    .await
    .map_err(|e| {
        warn!("Synthesis task failed: {}", e);
        SynthesisError::Model(format!("synthesis task failed: {e}"))
    })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tts::{SpeechModel, TTSResult};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TestModel {
        info: ModelInfo,
        delay: Duration,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl TestModel {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                info: ModelInfo {
                    model: "test".to_string(),
                    device: "cpu".to_string(),
                    sample_rate: 8_000,
                },
                delay,
                active: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            })
        }
    }

    impl SpeechModel for TestModel {
        fn info(&self) -> &ModelInfo {
            &self.info
        }

        fn synthesize(&self, text: &str, _speaker: &str) -> TTSResult<Vec<f32>> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            self.active.fetch_sub(1, Ordering::SeqCst);

            if text.contains("explode") {
                return Err(TTSError::Synthesis("model exploded".to_string()));
            }
            if text.contains("panic") {
                panic!("model panicked");
            }
            Ok(vec![0.5; 80])
        }
    }

    fn config(max_concurrent: usize, timeout_ms: u64) -> SynthesisConfig {
        SynthesisConfig {
            max_concurrent,
            timeout_ms,
        }
    }

    #[tokio::test]
    async fn test_synthesize_unit_returns_wav() {
        let worker = SynthesisWorker::new(TestModel::new(Duration::ZERO), &config(2, 1000));
        let audio = worker.synthesize_unit("hello.", "Alice").await.unwrap();

        assert_eq!(&audio.audio_bytes[0..4], b"RIFF");
        assert_eq!(audio.sample_count, 80);
        assert!(audio.generation_time_ms >= 0.0);
        assert_eq!(worker.available_permits(), 2);
    }

    #[tokio::test]
    async fn test_model_error_is_reported() {
        let worker = SynthesisWorker::new(TestModel::new(Duration::ZERO), &config(1, 1000));
        let err = worker.synthesize_unit("explode", "Alice").await.unwrap_err();

        assert!(matches!(err, SynthesisError::Model(_)));
        assert!(err.to_string().contains("model exploded"));
    }

    #[tokio::test]
    async fn test_model_panic_is_contained() {
        let worker = SynthesisWorker::new(TestModel::new(Duration::ZERO), &config(1, 1000));
        let err = worker.synthesize_unit("panic", "Alice").await.unwrap_err();
        assert!(matches!(err, SynthesisError::Model(_)));

        // Permit was released and the worker is still usable
        assert!(worker.synthesize_unit("fine", "Alice").await.is_ok());
    }

    #[tokio::test]
    async fn test_timeout() {
        let worker = SynthesisWorker::new(TestModel::new(Duration::from_millis(300)), &config(1, 50));
        let err = worker.synthesize_unit("slow", "Alice").await.unwrap_err();
        assert!(matches!(err, SynthesisError::Timeout(50)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_bound() {
        let model = TestModel::new(Duration::from_millis(40));
        let worker = SynthesisWorker::new(model.clone(), &config(2, 5000));

        let tasks: Vec<_> = (0..6)
            .map(|i| {
                let worker = worker.clone();
                tokio::spawn(async move { worker.synthesize_unit(&format!("unit {i}"), "Alice").await })
            })
            .collect();

        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }

        assert!(model.peak.load(Ordering::SeqCst) <= 2);
    }
}
