use anyhow::Result;
use approx::assert_relative_eq;
use tempfile::TempDir;
use vocal_analyzer::audio::decoder::decode_audio;
use vocal_analyzer::audio::encoder::{encode_audio, WavEncoding};
use vocal_analyzer::audio::load_waveform;
use vocal_analyzer::types::AudioData;

fn tone(sample_rate: u32, seconds: f64) -> AudioData {
    let total = (sample_rate as f64 * seconds) as usize;
    AudioData {
        samples: (0..total)
            .map(|i| {
                let t = i as f64 / sample_rate as f64;
                ((2.0 * std::f64::consts::PI * 440.0 * t).sin() * 0.5) as f32
            })
            .collect(),
        sample_rate,
    }
}

#[test]
fn decodes_encoded_wav() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("tone.wav");
    let original = tone(16_000, 0.5);
    encode_audio(&original, &path, WavEncoding::Pcm16)?;

    let decoded = decode_audio(&path)?;
    assert_eq!(decoded.sample_rate, 16_000);
    assert_eq!(decoded.samples.len(), original.samples.len());
    let max_error = decoded
        .samples
        .iter()
        .zip(&original.samples)
        .map(|(a, b)| (a - b).abs())
        .fold(0.0_f32, f32::max);
    assert!(max_error < 1e-3, "max_error={max_error}");
    Ok(())
}

#[test]
fn load_waveform_brings_audio_to_analysis_rate() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("tone_44k.wav");
    encode_audio(&tone(44_100, 1.0), &path, WavEncoding::Float32)?;

    let loaded = load_waveform(&path, 22_050)?;
    assert_eq!(loaded.sample_rate, 22_050);
    assert_eq!(loaded.samples.len(), 22_050);
    assert_relative_eq!(loaded.duration_secs(), 1.0, epsilon = 1e-3);
    Ok(())
}

#[test]
fn undecodable_file_is_an_error() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("broken.mp3");
    std::fs::write(&path, b"not an mp3 at all")?;
    assert!(load_waveform(&path, 22_050).is_err());
    Ok(())
}
