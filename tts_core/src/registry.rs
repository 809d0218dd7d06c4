use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::backends::{OpenAiConfig, OpenAiSynthesizer, PiperSynthesizer, Synthesizer, SystemSynthesizer};

/// Settings needed to build the standard backend set.
#[derive(Debug, Clone)]
pub struct BackendsConfig {
    pub openai: OpenAiConfig,
    pub piper_map_path: PathBuf,
    pub espeak_bin: String,
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            openai: OpenAiConfig::default(),
            piper_map_path: PathBuf::from("models/map.json"),
            espeak_bin: "espeak".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendDescriptor {
    pub name: String,
    pub available: bool,
    pub description: String,
}

struct Registered {
    backend: Arc<dyn Synthesizer>,
    available: bool,
}

/// Named synthesis backends plus the always-available default.
pub struct BackendRegistry {
    backends: HashMap<String, Registered>,
    default_name: String,
}

impl BackendRegistry {
    pub fn new(default_backend: Arc<dyn Synthesizer>) -> Self {
        let default_name = default_backend.name().to_string();
        let mut registry = Self {
            backends: HashMap::new(),
            default_name,
        };
        registry.register(default_backend);
        registry
    }

    /// `system` as default, plus `openai` and `piper`.
    pub fn from_config(config: &BackendsConfig) -> Self {
        let piper = PiperSynthesizer::from_mapfile(&config.piper_map_path).unwrap_or_else(|e| {
            warn!("Could not load Piper voices: {e:#}, local engine disabled.");
            PiperSynthesizer::empty()
        });

        let mut registry = Self::new(Arc::new(SystemSynthesizer::new(config.espeak_bin.clone())));
        registry
            .register(Arc::new(OpenAiSynthesizer::new(config.openai.clone())))
            .register(Arc::new(piper));
        registry
    }

    /// Add or replace a backend. Availability is sampled here, once.
    pub fn register(&mut self, backend: Arc<dyn Synthesizer>) -> &mut Self {
        let available = backend.is_available();
        let name = backend.name().to_string();
        info!(engine = %name, available, "Registered TTS engine");
        self.backends.insert(name, Registered { backend, available });
        self
    }

    /// Backend registered under `name`, or the default for unknown names.
    pub fn get(&self, name: &str) -> Arc<dyn Synthesizer> {
        match self.backends.get(name) {
            Some(registered) => registered.backend.clone(),
            None => self.default_backend(),
        }
    }

    pub fn default_backend(&self) -> Arc<dyn Synthesizer> {
        self.backends[&self.default_name].backend.clone()
    }

    pub fn default_name(&self) -> &str {
        &self.default_name
    }

    pub fn contains(&self, name: &str) -> bool {
        self.backends.contains_key(name)
    }

    /// Unknown names are not available.
    pub fn is_available(&self, name: &str) -> bool {
        self.backends.get(name).is_some_and(|r| r.available)
    }

    /// Descriptors sorted by name.
    pub fn list(&self) -> Vec<BackendDescriptor> {
        let mut out: Vec<BackendDescriptor> = self
            .backends
            .iter()
            .map(|(name, r)| BackendDescriptor {
                name: name.clone(),
                available: r.available,
                description: r.backend.description(),
            })
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }
}
