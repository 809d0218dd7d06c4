use std::collections::HashMap;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use dashmap::DashMap;
use rand::RngCore;
use tracing::{info, warn};

/// Free-form labels attached to a key, e.g. `name`.
pub type KeyMetadata = HashMap<String, String>;

/// Static key set, mutable at runtime. Keys never expire.
#[derive(Debug, Default)]
pub struct ApiKeyValidator {
    keys: DashMap<String, KeyMetadata>,
}

impl ApiKeyValidator {
    pub fn new(keys: HashMap<String, KeyMetadata>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }

    pub fn validate_key(&self, api_key: &str) -> Option<KeyMetadata> {
        match self.keys.get(api_key) {
            Some(metadata) => Some(metadata.clone()),
            None => {
                warn!(key_prefix = %key_prefix(api_key), "Invalid API key attempted");
                None
            }
        }
    }

    pub fn add_key(&self, api_key: impl Into<String>, metadata: KeyMetadata) {
        let api_key = api_key.into();
        info!(key_prefix = %key_prefix(&api_key), "Added API key");
        self.keys.insert(api_key, metadata);
    }

    pub fn remove_key(&self, api_key: &str) -> bool {
        let removed = self.keys.remove(api_key).is_some();
        if removed {
            info!(key_prefix = %key_prefix(api_key), "Removed API key");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

fn key_prefix(api_key: &str) -> String {
    api_key.chars().take(8).collect()
}

/// `{prefix}_` followed by 32 random bytes in unpadded url-safe base64.
pub fn generate_api_key(prefix: &str) -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{prefix}_{}", URL_SAFE_NO_PAD.encode(bytes))
}
