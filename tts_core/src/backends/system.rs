use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use super::Synthesizer;
use crate::output::write_silence;
use crate::request::SynthesisOptions;

/// Base speaking rate in words per minute at speed 1.0.
const BASE_WPM: f32 = 150.0;

/// Command-line synthesizer backed by `espeak`.
///
/// If the binary cannot be spawned or exits non-zero, a silent clip is
/// written instead.
pub struct SystemSynthesizer {
    espeak_bin: String,
}

impl SystemSynthesizer {
    pub fn new(espeak_bin: impl Into<String>) -> Self {
        Self {
            espeak_bin: espeak_bin.into(),
        }
    }

    async fn run_espeak(&self, text: &str, options: &SynthesisOptions) -> anyhow::Result<PathBuf> {
        let path = options.output_path("wav");
        let wpm = ((BASE_WPM * options.speed) as i64).max(1);

        let output = Command::new(&self.espeak_bin)
            .arg("-s")
            .arg(wpm.to_string())
            .arg("-w")
            .arg(&path)
            .arg("--")
            .arg(text)
            .output()
            .await
            .with_context(|| format!("failed to spawn {}", self.espeak_bin))?;

        if !output.status.success() {
            anyhow::bail!(
                "espeak failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(path)
    }

    async fn write_silent_clip(&self, options: &SynthesisOptions) -> anyhow::Result<PathBuf> {
        let path = options.output_path_with_suffix("silent", "wav");
        let target = path.clone();
        tokio::task::spawn_blocking(move || write_silence(&target))
            .await
            .map_err(|e| anyhow::anyhow!("Task join error: {e}"))??;
        info!(file = %path.display(), "Generated silent audio fallback");
        Ok(path)
    }
}

impl Default for SystemSynthesizer {
    fn default() -> Self {
        Self::new("espeak")
    }
}

#[async_trait]
impl Synthesizer for SystemSynthesizer {
    fn name(&self) -> &str {
        "system"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn synthesize(&self, text: &str, options: &SynthesisOptions) -> anyhow::Result<PathBuf> {
        match self.run_espeak(text, options).await {
            Ok(path) => {
                info!(file = %path.display(), "Generated audio with system TTS");
                Ok(path)
            }
            Err(e) => {
                warn!(error = %format!("{e:#}"), "System TTS generation failed");
                self.write_silent_clip(options).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::SynthesisRequest;

    #[tokio::test]
    async fn missing_binary_writes_silence() {
        let dir = tempfile::tempdir().unwrap();
        let synth = SystemSynthesizer::new("/nonexistent/espeak-binary");
        let req = SynthesisRequest::new("bot1", "hello", "system");

        let path = synth
            .synthesize(&req.text, &req.options(dir.path()))
            .await
            .unwrap();

        assert!(path.starts_with(dir.path()));
        assert!(path.to_string_lossy().ends_with("_silent.wav"));
        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 1);
    }

    #[tokio::test]
    async fn unwritable_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does/not/exist");
        let synth = SystemSynthesizer::new("/nonexistent/espeak-binary");
        let req = SynthesisRequest::new("bot1", "hello", "system");

        assert!(synth.synthesize(&req.text, &req.options(&missing)).await.is_err());
    }

    #[test]
    fn always_available() {
        let synth = SystemSynthesizer::default();
        assert!(synth.is_available());
        assert_eq!(synth.description(), "System Text-to-Speech Engine");
    }
}
