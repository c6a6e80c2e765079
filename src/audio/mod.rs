pub mod decoder;
pub mod encoder;
pub mod resample;
pub mod transcode;
pub mod wav;

use std::path::Path;

use anyhow::{Context, Result};
use tracing::warn;

use crate::types::AudioData;
use transcode::PreparedWav;

/// Decode any supported file and bring it to `target_rate` mono.
pub fn load_waveform(path: &Path, target_rate: u32) -> Result<AudioData> {
    let decoded = decoder::decode_audio(path)?;
    resample::resample_to(decoded, target_rate).with_context(|| {
        format!(
            "failed to resample {} to {} Hz",
            path.display(),
            target_rate
        )
    })
}

/// [`load_waveform`], falling back to `transcoded` for formats symphonia cannot read (Opus in WebM).
pub fn load_recording(
    path: &Path,
    target_rate: u32,
    transcoded: Option<&PreparedWav>,
) -> Result<AudioData> {
    load_waveform(path, target_rate)
        .or_else(|decode_error| read_transcoded(decode_error, transcoded, target_rate))
}

/// Read the transcoder's WAV after a decode failure; without one the decode error stands.
pub fn read_transcoded(
    decode_error: anyhow::Error,
    transcoded: Option<&PreparedWav>,
    target_rate: u32,
) -> Result<AudioData> {
    let Some(prepared) = transcoded else {
        return Err(decode_error);
    };
    warn!(
        error = %format!("{decode_error:#}"),
        wav = %prepared.path().display(),
        "decoder could not read input, using transcoded WAV"
    );
    let audio = wav::read_wav(prepared.path())
        .with_context(|| format!("{decode_error:#}; transcoded WAV unreadable"))?;
    resample::resample_to(audio, target_rate).with_context(|| {
        format!(
            "failed to resample {} to {} Hz",
            prepared.path().display(),
            target_rate
        )
    })
}
