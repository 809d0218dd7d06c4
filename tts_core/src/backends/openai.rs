use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use super::Synthesizer;
use crate::request::{SynthesisOptions, VoiceType};

pub const OPENAI_DEFAULT_BASE_URL: &str = "https://api.openai.com";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "tts-1".to_string(),
            base_url: OPENAI_DEFAULT_BASE_URL.to_string(),
        }
    }
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    response_format: &'a str,
    speed: f32,
}

/// Cloud backend calling `POST /v1/audio/speech`. Writes mp3.
pub struct OpenAiSynthesizer {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiSynthesizer {
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn voice_for(voice_type: VoiceType) -> &'static str {
        match voice_type {
            VoiceType::Male => "onyx",
            VoiceType::Female => "nova",
            VoiceType::Neutral => "alloy",
        }
    }
}

#[async_trait]
impl Synthesizer for OpenAiSynthesizer {
    fn name(&self) -> &str {
        "openai"
    }

    fn is_available(&self) -> bool {
        self.config
            .api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }

    async fn synthesize(&self, text: &str, options: &SynthesisOptions) -> anyhow::Result<PathBuf> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("OpenAI TTS engine not available"))?;

        let url = format!(
            "{}/v1/audio/speech",
            self.config.base_url.trim_end_matches('/')
        );
        let body = SpeechRequest {
            model: &self.config.model,
            voice: Self::voice_for(options.voice_type),
            input: text,
            response_format: "mp3",
            speed: options.speed,
        };

        let audio = self
            .client
            .post(url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .context("OpenAI TTS request failed")?
            .error_for_status()
            .context("OpenAI TTS generation failed")?
            .bytes()
            .await
            .context("Failed to read OpenAI TTS response body")?;

        let path = options.output_path("mp3");
        tokio::fs::write(&path, &audio)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        info!(file = %path.display(), bytes = audio.len(), "Generated audio with OpenAI TTS");
        Ok(path)
    }
}
