//! Request-dispatch and caching core for the TTS webhook service.
//!
//! A [`SynthesisRequest`] is fingerprinted into a [`CacheKey`], looked up in
//! the [`AudioCache`], and on a miss handed to a [`Synthesizer`] resolved from
//! the [`BackendRegistry`]. [`SynthesisDispatcher`] ties these together and
//! retries once on the registry's default backend when the requested one fails.

mod backends;
mod cache;
mod dispatcher;
mod fingerprint;
mod output;
mod registry;
mod request;

pub use backends::{
    OpenAiConfig, OpenAiSynthesizer, PiperSynthesizer, Synthesizer, SystemSynthesizer,
    OPENAI_DEFAULT_BASE_URL,
};
pub use cache::{AudioCache, CacheEntry, DEFAULT_CACHE_CAPACITY};
pub use dispatcher::{DispatchError, SynthesisDispatcher, DEFAULT_MAX_TEXT_LENGTH};
pub use fingerprint::CacheKey;
pub use output::{write_silence, SILENCE_SAMPLE_RATE};
pub use registry::{BackendDescriptor, BackendRegistry, BackendsConfig};
pub use request::{SynthesisOptions, SynthesisRequest, SynthesisResult, VoiceType};
