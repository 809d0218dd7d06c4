//! Cache-first synthesis with a single fallback to the default backend.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::backends::Synthesizer;
use crate::cache::AudioCache;
use crate::fingerprint::CacheKey;
use crate::registry::BackendRegistry;
use crate::request::{SynthesisRequest, SynthesisResult};

/// Default upper bound on utterance length, in characters.
pub const DEFAULT_MAX_TEXT_LENGTH: usize = 5000;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("TTS processing failed: {0}")]
    SynthesisFailed(String),
}

pub struct SynthesisDispatcher {
    registry: Arc<BackendRegistry>,
    cache: Arc<AudioCache>,
    audio_dir: PathBuf,
    max_text_length: usize,
}

impl SynthesisDispatcher {
    pub fn new(registry: Arc<BackendRegistry>, cache: Arc<AudioCache>, audio_dir: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            cache,
            audio_dir: audio_dir.into(),
            max_text_length: DEFAULT_MAX_TEXT_LENGTH,
        }
    }

    pub fn with_max_text_length(mut self, max_text_length: usize) -> Self {
        self.max_text_length = max_text_length;
        self
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &AudioCache {
        &self.cache
    }

    pub fn audio_dir(&self) -> &Path {
        &self.audio_dir
    }

    pub fn max_text_length(&self) -> usize {
        self.max_text_length
    }

    pub fn validate(&self, request: &SynthesisRequest) -> Result<(), DispatchError> {
        if request.text.trim().is_empty() {
            return Err(DispatchError::InvalidRequest(
                "Utterance cannot be empty".to_string(),
            ));
        }
        let length = request.text.chars().count();
        if length > self.max_text_length {
            return Err(DispatchError::InvalidRequest(format!(
                "Text too long. Maximum {} characters allowed",
                self.max_text_length
            )));
        }
        Ok(())
    }

    pub async fn handle(&self, request: &SynthesisRequest) -> Result<SynthesisResult, DispatchError> {
        self.validate(request)?;

        let key = request.fingerprint();
        if let Some(entry) = self.cache.get(&key) {
            info!(cache_key = ?key, agent = %request.agent, "Cache hit for utterance");
            return Ok(SynthesisResult {
                audio_file: entry.file_path,
                engine_used: entry.engine,
                cache_hit: true,
                fallback_used: false,
            });
        }
        debug!(cache_key = ?key, "Cache miss");

        tokio::fs::create_dir_all(&self.audio_dir).await.map_err(|e| {
            DispatchError::SynthesisFailed(format!(
                "cannot create audio directory {}: {e}",
                self.audio_dir.display()
            ))
        })?;

        let options = request.options(&self.audio_dir);
        let backend = self.registry.get(&request.backend);

        let primary_err = match backend.synthesize(&request.text, &options).await {
            Ok(path) => return Ok(self.store(key, path, backend.as_ref(), false)),
            Err(e) => e,
        };

        let fallback = self.registry.default_backend();
        if backend.name() == fallback.name() {
            error!(engine = %backend.name(), error = %format!("{primary_err:#}"), "Default engine failed");
            return Err(DispatchError::SynthesisFailed(format!(
                "{} engine failed: {primary_err:#}",
                backend.name()
            )));
        }

        warn!(
            engine = %backend.name(),
            fallback = %fallback.name(),
            error = %format!("{primary_err:#}"),
            "Primary engine failed, trying fallback"
        );
        match fallback.synthesize(&request.text, &options).await {
            Ok(path) => Ok(self.store(key, path, fallback.as_ref(), true)),
            Err(fallback_err) => {
                error!(
                    engine = %fallback.name(),
                    error = %format!("{fallback_err:#}"),
                    "Fallback engine failed"
                );
                Err(DispatchError::SynthesisFailed(format!(
                    "{} engine failed: {primary_err:#}; {} fallback failed: {fallback_err:#}",
                    backend.name(),
                    fallback.name()
                )))
            }
        }
    }

    fn store(
        &self,
        key: CacheKey,
        path: PathBuf,
        engine: &dyn Synthesizer,
        fallback_used: bool,
    ) -> SynthesisResult {
        self.cache.put(key, path.clone(), engine.name());
        SynthesisResult {
            audio_file: path,
            engine_used: engine.name().to_string(),
            cache_hit: false,
            fallback_used,
        }
    }
}
