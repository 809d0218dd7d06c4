//! Audio file naming and the silent placeholder writer.

use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};

use crate::fingerprint::CacheKey;

/// Sample rate of the silent placeholder clip.
pub const SILENCE_SAMPLE_RATE: u32 = 22_050;

/// `{agent}_{timestamp}_{fingerprint prefix}`. The agent is reduced to a
/// filesystem-safe form so it cannot escape the audio directory.
pub fn file_stem(agent: &str, timestamp: &DateTime<Utc>, key: &CacheKey) -> String {
    format!(
        "{}_{}_{}",
        sanitize_agent(agent),
        timestamp.format("%Y-%m-%dT%H-%M-%S%.6f"),
        key.short()
    )
}

fn sanitize_agent(agent: &str) -> String {
    let cleaned: String = agent
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .take(64)
        .collect();
    if cleaned.is_empty() {
        "unknown".to_string()
    } else {
        cleaned
    }
}

/// Write one second of 16-bit mono silence.
pub fn write_silence(path: &Path) -> anyhow::Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SILENCE_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for _ in 0..SILENCE_SAMPLE_RATE {
        writer.write_sample(0i16)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Write f32 samples in [-1.0, 1.0] as a 16-bit mono WAV file.
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> anyhow::Result<()> {
    const I16_MAX_F32: f32 = i16::MAX as f32;

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for &s in samples {
        writer.write_sample((s.clamp(-1.0, 1.0) * I16_MAX_F32) as i16)?;
    }
    writer.finalize()?;
    Ok(())
}
