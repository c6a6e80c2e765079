use crate::types::AudioData;
use anyhow::{Context, Result};
use std::path::Path;

/// Sample encoding used when writing a mono WAV file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WavEncoding {
    #[default]
    Pcm16,
    Float32,
}

/// Encode AudioData to a mono WAV file
pub fn encode_audio<P: AsRef<Path>>(audio: &AudioData, path: P, encoding: WavEncoding) -> Result<()> {
    let path = path.as_ref();

    let spec = match encoding {
        WavEncoding::Pcm16 => hound::WavSpec {
            channels: 1,
            sample_rate: audio.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        },
        WavEncoding::Float32 => hound::WavSpec {
            channels: 1,
            sample_rate: audio.sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        },
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create WAV file: {}", path.display()))?;

    for &sample in &audio.samples {
        let clamped = sample.clamp(-1.0, 1.0);
        let written = match encoding {
            WavEncoding::Pcm16 => writer.write_sample((clamped * i16::MAX as f32) as i16),
            WavEncoding::Float32 => writer.write_sample(clamped),
        };
        written.context("Failed to write audio sample")?;
    }

    writer.finalize().context("Failed to finalize WAV file")?;

    Ok(())
}
