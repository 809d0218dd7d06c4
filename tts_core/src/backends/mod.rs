//! Speech synthesis backends.
//!
//! Every backend turns text into an audio file under
//! [`SynthesisOptions::output_dir`] and returns its path:
//! - [`OpenAiSynthesizer`]: cloud API, needs an API key
//! - [`PiperSynthesizer`]: local Piper voices loaded from a map file
//! - [`SystemSynthesizer`]: the `espeak` command line, with a silent clip when
//!   the binary is missing or fails, so it is always available

mod openai;
mod piper;
mod system;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::request::SynthesisOptions;

pub use openai::{OpenAiConfig, OpenAiSynthesizer, OPENAI_DEFAULT_BASE_URL};
pub use piper::PiperSynthesizer;
pub use system::SystemSynthesizer;

#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Registry name, e.g. `"openai"`.
    fn name(&self) -> &str;

    fn description(&self) -> String {
        let mut name = self.name().to_string();
        if let Some(first) = name.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        format!("{name} Text-to-Speech Engine")
    }

    /// Whether the backend's dependencies (credentials, models, binaries)
    /// were found. The registry reads this once at registration.
    fn is_available(&self) -> bool;

    async fn synthesize(&self, text: &str, options: &SynthesisOptions) -> anyhow::Result<PathBuf>;
}
