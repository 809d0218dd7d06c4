//! Deterministic cache keys for synthesis requests.
//!
//! The key is a SHA-256 digest over `text`, `backend`, `voice_type`,
//! `language` and `speed`. Every string field is length-prefixed so that
//! adjacent fields cannot bleed into each other, and `speed` is hashed by its
//! bit pattern. Strings are hashed byte for byte with no normalization.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::request::VoiceType;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    pub fn compute(
        text: &str,
        backend: &str,
        voice_type: VoiceType,
        language: &str,
        speed: f32,
    ) -> Self {
        let mut hasher = Sha256::new();
        for field in [text, backend, voice_type.as_str(), language] {
            hasher.update((field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
        hasher.update(speed.to_bits().to_le_bytes());
        Self(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First eight hex characters, used in file names and log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey({})", self.short())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::SynthesisRequest;

    fn base() -> CacheKey {
        CacheKey::compute("hello world", "openai", VoiceType::Neutral, "en", 1.0)
    }

    #[test]
    fn same_inputs_same_key() {
        assert_eq!(base(), base());
        assert_eq!(base().to_hex().len(), 64);
    }

    #[test]
    fn each_field_changes_the_key() {
        let variants = [
            CacheKey::compute("hello world!", "openai", VoiceType::Neutral, "en", 1.0),
            CacheKey::compute("hello world", "system", VoiceType::Neutral, "en", 1.0),
            CacheKey::compute("hello world", "openai", VoiceType::Male, "en", 1.0),
            CacheKey::compute("hello world", "openai", VoiceType::Neutral, "de", 1.0),
            CacheKey::compute("hello world", "openai", VoiceType::Neutral, "en", 1.25),
        ];
        for (i, v) in variants.iter().enumerate() {
            assert_ne!(*v, base(), "variant {i} collided with base");
            for other in &variants[i + 1..] {
                assert_ne!(v, other);
            }
        }
    }

    #[test]
    fn no_normalization_of_text() {
        let padded = CacheKey::compute(" hello world", "openai", VoiceType::Neutral, "en", 1.0);
        let upper = CacheKey::compute("Hello world", "openai", VoiceType::Neutral, "en", 1.0);
        assert_ne!(padded, base());
        assert_ne!(upper, base());
    }

    #[test]
    fn field_boundaries_do_not_shift() {
        let a = CacheKey::compute("ab", "c", VoiceType::Neutral, "en", 1.0);
        let b = CacheKey::compute("a", "bc", VoiceType::Neutral, "en", 1.0);
        assert_ne!(a, b);
    }

    #[test]
    fn agent_and_timestamp_do_not_participate() {
        let a = SynthesisRequest::new("bot1", "hi", "system");
        let mut b = SynthesisRequest::new("bot2", "hi", "system");
        b.timestamp = a.timestamp + chrono::Duration::hours(3);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }
}
