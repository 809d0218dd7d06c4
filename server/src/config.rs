// Configuration for the webhook server, read from the environment

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use avatar_core::HEYGEN_DEFAULT_BASE_URL;
use tts_core::{BackendsConfig, OpenAiConfig, DEFAULT_CACHE_CAPACITY, DEFAULT_MAX_TEXT_LENGTH};

use crate::gate::KeyMetadata;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub request_timeout_secs: u64,
    pub cors_allowed_origins: Option<Vec<String>>,
    pub audio_dir: PathBuf,
    pub max_text_length: usize,
    pub cache_capacity: usize,
    pub rate_limit_max_requests: usize,
    pub rate_limit_window_secs: u64,
    pub rate_limit_sweep_secs: u64,
    pub require_api_key: bool,
    pub api_keys: HashMap<String, KeyMetadata>,
    /// Engine used when a webhook payload names none.
    pub default_engine: String,
    pub backends: BackendsConfig,
    pub heygen_api_key: Option<String>,
    pub heygen_base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            request_timeout_secs: 60,
            cors_allowed_origins: None,
            audio_dir: PathBuf::from("audio_files"),
            max_text_length: DEFAULT_MAX_TEXT_LENGTH,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            rate_limit_max_requests: 100,
            rate_limit_window_secs: 3600,
            rate_limit_sweep_secs: 300,
            require_api_key: false,
            api_keys: HashMap::new(),
            default_engine: "piper".to_string(),
            backends: BackendsConfig::default(),
            heygen_api_key: None,
            heygen_base_url: HEYGEN_DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source. Unset or unparsable values keep their default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let cors_allowed_origins = var("CORS_ALLOWED_ORIGINS").map(|origins| {
            origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        let backends = BackendsConfig {
            openai: OpenAiConfig {
                api_key: var("OPENAI_API_KEY"),
                model: var("OPENAI_TTS_MODEL").unwrap_or(defaults.backends.openai.model),
                base_url: var("OPENAI_BASE_URL").unwrap_or(defaults.backends.openai.base_url),
            },
            piper_map_path: var("PIPER_MAP_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.backends.piper_map_path),
            espeak_bin: var("ESPEAK_BIN").unwrap_or(defaults.backends.espeak_bin),
        };

        Self {
            port: parsed(&var, "PORT", defaults.port),
            request_timeout_secs: parsed(&var, "REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs),
            cors_allowed_origins,
            audio_dir: var("AUDIO_DIR").map(PathBuf::from).unwrap_or(defaults.audio_dir),
            max_text_length: parsed(&var, "MAX_TEXT_LENGTH", defaults.max_text_length),
            cache_capacity: parsed(&var, "CACHE_CAPACITY", defaults.cache_capacity),
            rate_limit_max_requests: parsed(&var, "RATE_LIMIT_MAX_REQUESTS", defaults.rate_limit_max_requests),
            rate_limit_window_secs: parsed(&var, "RATE_LIMIT_WINDOW_SECS", defaults.rate_limit_window_secs),
            rate_limit_sweep_secs: parsed(&var, "RATE_LIMIT_SWEEP_SECS", defaults.rate_limit_sweep_secs),
            require_api_key: var("REQUIRE_API_KEY")
                .and_then(|v| parse_bool(&v))
                .unwrap_or(defaults.require_api_key),
            api_keys: var("API_KEYS").map(|v| parse_api_keys(&v)).unwrap_or_default(),
            default_engine: var("DEFAULT_ENGINE").unwrap_or(defaults.default_engine),
            backends,
            heygen_api_key: var("HEYGEN_API_KEY"),
            heygen_base_url: var("HEYGEN_BASE_URL").unwrap_or(defaults.heygen_base_url),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn rate_limit_sweep(&self) -> Duration {
        Duration::from_secs(self.rate_limit_sweep_secs.max(1))
    }
}

fn parsed<T, F>(var: &F, name: &str, default: T) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    var(name).and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse `key[=label],key2[=label]`. A label becomes the `name` metadata entry.
pub fn parse_api_keys(value: &str) -> HashMap<String, KeyMetadata> {
    value
        .split(',')
        .filter_map(|item| {
            let item = item.trim();
            if item.is_empty() {
                return None;
            }
            let (key, label) = match item.split_once('=') {
                Some((key, label)) => (key.trim(), Some(label.trim())),
                None => (item, None),
            };
            if key.is_empty() {
                return None;
            }
            let mut metadata = KeyMetadata::new();
            if let Some(label) = label.filter(|l| !l.is_empty()) {
                metadata.insert("name".to_string(), label.to_string());
            }
            Some((key.to_string(), metadata))
        })
        .collect()
}
