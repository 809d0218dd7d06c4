use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use anyhow::Context;
use async_trait::async_trait;
use dashmap::DashMap;
use piper_rs::synth::{PiperSpeechStreamParallel, PiperSpeechSynthesizer};
use tracing::info;

use super::Synthesizer;
use crate::output::write_wav;
use crate::request::SynthesisOptions;

// Loaded synthesizer and its output sample rate
struct LoadedVoice {
    synth: Arc<RwLock<PiperSpeechSynthesizer>>,
    sample_rate: u32,
}

/// Local Piper voices keyed by language.
///
/// The map file is a JSON object from language key to model config path,
/// either as a bare string or as `{ "config": "..." }`:
///
/// ```json
/// { "en_US": "models/en_US-lessac-medium.onnx.json",
///   "de_DE": { "config": "models/de_DE-thorsten-medium.onnx.json" } }
/// ```
///
/// Piper has no speaking-rate control here, so `speed` is ignored.
pub struct PiperSynthesizer {
    voices: HashMap<String, PathBuf>,
    loaded: Arc<DashMap<PathBuf, LoadedVoice>>,
    available: bool,
}

impl PiperSynthesizer {
    pub fn new(voices: HashMap<String, PathBuf>) -> Self {
        let available = voices.values().any(|cfg| cfg.is_file());
        Self {
            voices,
            loaded: Arc::new(DashMap::new()),
            available,
        }
    }

    pub fn empty() -> Self {
        Self::new(HashMap::new())
    }

    /// Load from a map file such as `models/map.json`.
    pub fn from_mapfile<P: AsRef<Path>>(p: P) -> anyhow::Result<Self> {
        let text = fs::read_to_string(p.as_ref())
            .with_context(|| format!("Failed to load {}", p.as_ref().display()))?;
        let json: serde_json::Value =
            serde_json::from_str(&text).with_context(|| "map.json is not valid JSON")?;
        let obj = json
            .as_object()
            .ok_or_else(|| anyhow::anyhow!("map.json must be a JSON object"))?;

        let mut voices = HashMap::new();
        for (lang, v) in obj {
            let config = match v {
                serde_json::Value::String(path) => path.clone(),
                serde_json::Value::Object(o) => o
                    .get("config")
                    .and_then(|x| x.as_str())
                    .ok_or_else(|| anyhow::anyhow!("missing 'config' for key {}", lang))?
                    .to_string(),
                _ => {
                    return Err(anyhow::anyhow!(
                        "invalid entry for key {} (expected string or object)",
                        lang
                    ))
                }
            };
            voices.insert(lang.clone(), PathBuf::from(config));
        }
        Ok(Self::new(voices))
    }

    pub fn languages(&self) -> Vec<String> {
        let mut langs: Vec<String> = self.voices.keys().cloned().collect();
        langs.sort();
        langs
    }

    /// Exact key first, then any voice sharing the primary language subtag
    /// (`en` matches `en_US`, `en-GB` matches `en_US`).
    pub fn config_for(&self, language: &str) -> Option<&PathBuf> {
        if let Some(cfg) = self.voices.get(language) {
            return Some(cfg);
        }
        let primary = primary_subtag(language);
        let mut candidates: Vec<(&String, &PathBuf)> = self
            .voices
            .iter()
            .filter(|(key, _)| primary_subtag(key).eq_ignore_ascii_case(primary))
            .collect();
        candidates.sort_by(|a, b| a.0.cmp(b.0));
        candidates.first().map(|(_, cfg)| *cfg)
    }

    fn read_sample_rate(cfg_path: &Path) -> anyhow::Result<u32> {
        let text = fs::read_to_string(cfg_path)
            .with_context(|| format!("Failed to read config file: {}", cfg_path.display()))?;
        let json: serde_json::Value =
            serde_json::from_str(&text).with_context(|| "Config file is not valid JSON")?;
        let sample_rate = json
            .get("audio")
            .and_then(|a| a.get("sample_rate"))
            .and_then(|sr| sr.as_u64())
            .ok_or_else(|| anyhow::anyhow!("Missing or invalid 'audio.sample_rate' in config"))?;
        Ok(sample_rate as u32)
    }

    fn get_or_load(
        loaded: &DashMap<PathBuf, LoadedVoice>,
        cfg_path: &Path,
    ) -> anyhow::Result<(Arc<RwLock<PiperSpeechSynthesizer>>, u32)> {
        if let Some(voice) = loaded.get(cfg_path) {
            return Ok((voice.synth.clone(), voice.sample_rate));
        }

        let sample_rate = Self::read_sample_rate(cfg_path)?;
        let model = piper_rs::from_config_path(cfg_path)
            .map_err(|e| anyhow::anyhow!("piper load error: {e}"))?;
        let synth = Arc::new(RwLock::new(PiperSpeechSynthesizer::new(model)?));
        loaded.insert(
            cfg_path.to_path_buf(),
            LoadedVoice {
                synth: synth.clone(),
                sample_rate,
            },
        );
        info!(config = %cfg_path.display(), sample_rate, "Loaded Piper voice");
        Ok((synth, sample_rate))
    }

    fn synthesize_blocking(
        loaded: &DashMap<PathBuf, LoadedVoice>,
        cfg_path: &Path,
        text: String,
        out: &Path,
    ) -> anyhow::Result<()> {
        let (synth_arc, sample_rate) = Self::get_or_load(loaded, cfg_path)?;
        let synth = synth_arc
            .read()
            .map_err(|_| anyhow::anyhow!("Piper synthesizer lock poisoned"))?;

        let iter: PiperSpeechStreamParallel = synth
            .synthesize_parallel(text, None)
            .map_err(|e| anyhow::anyhow!("piper synth error: {e}"))?;

        let mut samples: Vec<f32> = Vec::new();
        for part in iter {
            samples.extend(
                part.map_err(|e| anyhow::anyhow!("chunk error: {e}"))?
                    .into_vec(),
            );
        }
        write_wav(out, &samples, sample_rate)
    }
}

fn primary_subtag(language: &str) -> &str {
    language.split(['_', '-']).next().unwrap_or(language)
}

#[async_trait]
impl Synthesizer for PiperSynthesizer {
    fn name(&self) -> &str {
        "piper"
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn synthesize(&self, text: &str, options: &SynthesisOptions) -> anyhow::Result<PathBuf> {
        let cfg_path = self
            .config_for(&options.language)
            .cloned()
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "No Piper voice for language '{}'. Available: {}",
                    options.language,
                    self.languages().join(", ")
                )
            })?;

        let path = options.output_path("wav");
        let out = path.clone();
        let loaded = Arc::clone(&self.loaded);
        let text = text.to_string();

        tokio::task::spawn_blocking(move || Self::synthesize_blocking(&loaded, &cfg_path, text, &out))
            .await
            .map_err(|e| anyhow::anyhow!("Task join error: {e}"))??;

        info!(file = %path.display(), "Generated audio with Piper");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::SynthesisRequest;

    fn write_map(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("map.json");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn parses_string_and_object_entries() {
        let dir = tempfile::tempdir().unwrap();
        let map = write_map(
            dir.path(),
            r#"{ "en_US": "a.onnx.json", "de_DE": { "config": "b.onnx.json" } }"#,
        );
        let piper = PiperSynthesizer::from_mapfile(map).unwrap();
        assert_eq!(piper.languages(), vec!["de_DE", "en_US"]);
        assert_eq!(piper.config_for("de_DE").unwrap(), Path::new("b.onnx.json"));
    }

    #[test]
    fn rejects_malformed_map() {
        let dir = tempfile::tempdir().unwrap();
        assert!(PiperSynthesizer::from_mapfile(write_map(dir.path(), "[1, 2]")).is_err());
        assert!(PiperSynthesizer::from_mapfile(write_map(dir.path(), r#"{"en": 5}"#)).is_err());
        assert!(PiperSynthesizer::from_mapfile(write_map(dir.path(), r#"{"en": {}}"#)).is_err());
        assert!(PiperSynthesizer::from_mapfile(dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn language_falls_back_to_primary_subtag() {
        let mut voices = HashMap::new();
        voices.insert("en_US".to_string(), PathBuf::from("us.json"));
        voices.insert("en_GB".to_string(), PathBuf::from("gb.json"));
        let piper = PiperSynthesizer::new(voices);

        assert_eq!(piper.config_for("en_GB").unwrap(), Path::new("gb.json"));
        assert_eq!(piper.config_for("en").unwrap(), Path::new("gb.json"));
        assert_eq!(piper.config_for("en-AU").unwrap(), Path::new("gb.json"));
        assert!(piper.config_for("fr").is_none());
    }

    #[test]
    fn availability_requires_an_existing_config() {
        assert!(!PiperSynthesizer::empty().is_available());

        let dir = tempfile::tempdir().unwrap();
        let mut voices = HashMap::new();
        voices.insert("en".to_string(), dir.path().join("missing.onnx.json"));
        assert!(!PiperSynthesizer::new(voices.clone()).is_available());

        let cfg = dir.path().join("present.onnx.json");
        fs::write(&cfg, "{}").unwrap();
        voices.insert("de".to_string(), cfg);
        assert!(PiperSynthesizer::new(voices).is_available());
    }

    #[tokio::test]
    async fn unknown_language_fails() {
        let dir = tempfile::tempdir().unwrap();
        let req = SynthesisRequest::new("bot1", "hallo", "piper").with_language("de");
        let err = PiperSynthesizer::empty()
            .synthesize(&req.text, &req.options(dir.path()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No Piper voice"));
    }

    #[tokio::test]
    async fn unreadable_model_config_fails() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = dir.path().join("broken.onnx.json");
        fs::write(&cfg, r#"{"audio": {}}"#).unwrap();
        let mut voices = HashMap::new();
        voices.insert("en".to_string(), cfg);

        let req = SynthesisRequest::new("bot1", "hello", "piper");
        let err = PiperSynthesizer::new(voices)
            .synthesize(&req.text, &req.options(dir.path()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("sample_rate"));
    }
}
