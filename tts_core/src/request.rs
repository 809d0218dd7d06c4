use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fingerprint::CacheKey;

/// Voice family requested by the caller. Backends map it to their own voices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceType {
    Male,
    Female,
    #[default]
    Neutral,
}

impl VoiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceType::Male => "male",
            VoiceType::Female => "female",
            VoiceType::Neutral => "neutral",
        }
    }
}

/// A validated-at-ingress synthesis request.
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    pub agent: String,
    pub text: String,
    pub backend: String,
    pub voice_type: VoiceType,
    pub language: String,
    pub speed: f32,
    pub timestamp: DateTime<Utc>,
    pub avatar_id: Option<String>,
    pub voice_id: Option<String>,
    pub background: Option<String>,
}

impl SynthesisRequest {
    pub fn new(
        agent: impl Into<String>,
        text: impl Into<String>,
        backend: impl Into<String>,
    ) -> Self {
        Self {
            agent: agent.into(),
            text: text.into(),
            backend: backend.into(),
            voice_type: VoiceType::Neutral,
            language: "en".to_string(),
            speed: 1.0,
            timestamp: Utc::now(),
            avatar_id: None,
            voice_id: None,
            background: None,
        }
    }

    pub fn with_voice_type(mut self, voice_type: VoiceType) -> Self {
        self.voice_type = voice_type;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Cache key over the cacheable fields only (agent and timestamp excluded).
    pub fn fingerprint(&self) -> CacheKey {
        CacheKey::compute(
            &self.text,
            &self.backend,
            self.voice_type,
            &self.language,
            self.speed,
        )
    }

    /// Options handed to a backend. Output files land in `output_dir`.
    pub fn options(&self, output_dir: &Path) -> SynthesisOptions {
        SynthesisOptions {
            agent: self.agent.clone(),
            timestamp: self.timestamp,
            voice_type: self.voice_type,
            language: self.language.clone(),
            speed: self.speed,
            output_dir: output_dir.to_path_buf(),
            file_stem: crate::output::file_stem(&self.agent, &self.timestamp, &self.fingerprint()),
        }
    }
}

/// Per-invocation parameters passed to a [`Synthesizer`](crate::Synthesizer).
#[derive(Debug, Clone)]
pub struct SynthesisOptions {
    pub agent: String,
    pub timestamp: DateTime<Utc>,
    pub voice_type: VoiceType,
    pub language: String,
    pub speed: f32,
    pub output_dir: PathBuf,
    pub file_stem: String,
}

impl SynthesisOptions {
    /// Path of the audio file for this request with the backend's extension.
    pub fn output_path(&self, extension: &str) -> PathBuf {
        self.output_dir.join(format!("{}.{}", self.file_stem, extension))
    }

    pub fn output_path_with_suffix(&self, suffix: &str, extension: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_{}.{}", self.file_stem, suffix, extension))
    }
}

/// Outcome of a dispatched request.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisResult {
    pub audio_file: PathBuf,
    pub engine_used: String,
    pub cache_hit: bool,
    /// Set when the requested backend failed and the default produced the audio.
    pub fallback_used: bool,
}
