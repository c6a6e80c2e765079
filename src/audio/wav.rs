use std::path::Path;

use anyhow::{ensure, Context, Result};
use hound::{SampleFormat, WavReader};

use crate::audio::decoder::downmix_interleaved;
use crate::types::AudioData;

/// Read a PCM or float WAV file as mono f32 at its native sample rate.
pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<AudioData> {
    let path = path.as_ref();
    let reader = WavReader::open(path)
        .with_context(|| format!("Failed to open WAV file: {}", path.display()))?;
    let spec = reader.spec();
    ensure!(spec.channels > 0, "WAV file declares zero channels");

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .context("Failed to read float WAV samples")?,
        SampleFormat::Int => {
            let scale = 1.0 / (1_i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|sample| sample.map(|s| s as f32 * scale))
                .collect::<std::result::Result<_, _>>()
                .context("Failed to read integer WAV samples")?
        }
    };

    Ok(AudioData {
        samples: downmix_interleaved(&interleaved, spec.channels as usize),
        sample_rate: spec.sample_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::read_wav;
    use crate::audio::encoder::{encode_audio, WavEncoding};
    use crate::types::AudioData;

    fn ramp() -> AudioData {
        AudioData {
            samples: (0..200).map(|i| (i as f32 / 100.0) - 1.0).collect(),
            sample_rate: 22_050,
        }
    }

    #[test]
    fn reads_pcm16_written_by_encoder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ramp.wav");
        let audio = ramp();
        encode_audio(&audio, &path, WavEncoding::Pcm16).unwrap();

        let read = read_wav(&path).unwrap();
        assert_eq!(read.sample_rate, 22_050);
        assert_eq!(read.samples.len(), audio.samples.len());
        assert!(read
            .samples
            .iter()
            .zip(&audio.samples)
            .all(|(a, b)| (a - b).abs() < 1e-3));
    }

    #[test]
    fn reads_float_samples_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ramp_f32.wav");
        let audio = ramp();
        encode_audio(&audio, &path, WavEncoding::Float32).unwrap();

        let read = read_wav(&path).unwrap();
        assert_eq!(read.samples, audio.samples);
    }

    #[test]
    fn stereo_files_are_downmixed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..10 {
            writer.write_sample(16_384_i16).unwrap();
            writer.write_sample(0_i16).unwrap();
        }
        writer.finalize().unwrap();

        let read = read_wav(&path).unwrap();
        assert_eq!(read.samples.len(), 10);
        assert!(read.samples.iter().all(|s| (s - 0.25).abs() < 1e-4));
    }
}
