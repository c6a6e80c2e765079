use anyhow::{ensure, Result};

use crate::types::AudioData;

/// Linearly resample `samples` from `source_rate` to `target_rate`.
///
/// Positions are tracked in f64 so long recordings do not drift.
pub fn linear_resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Result<Vec<f32>> {
    ensure!(source_rate > 0, "source sample rate must be positive");
    ensure!(target_rate > 0, "target sample rate must be positive");
    if samples.is_empty() || source_rate == target_rate {
        return Ok(samples.to_vec());
    }
    let step = source_rate as f64 / target_rate as f64;
    let scaled = samples.len() as u64 * target_rate as u64;
    let output_len = scaled.div_ceil(source_rate as u64).max(1) as usize;
    let last_index = samples.len() - 1;
    let output = (0..output_len)
        .map(|i| {
            let position = i as f64 * step;
            let left = (position.floor() as usize).min(last_index);
            let right = (left + 1).min(last_index);
            let t = (position - left as f64) as f32;
            samples[left] * (1.0 - t) + samples[right] * t
        })
        .collect();
    Ok(output)
}

/// Bring a decoded waveform to the analysis rate.
pub fn resample_to(audio: AudioData, target_rate: u32) -> Result<AudioData> {
    if audio.sample_rate == target_rate {
        return Ok(audio);
    }
    let samples = linear_resample(&audio.samples, audio.sample_rate, target_rate)?;
    Ok(AudioData {
        samples,
        sample_rate: target_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::{linear_resample, resample_to};
    use crate::types::AudioData;

    #[test]
    fn preserves_constant_signal_after_downsample() {
        let input = vec![0.5; 441];
        let resampled = linear_resample(&input, 44_100, 22_050).unwrap();
        assert_eq!(resampled.len(), 221);
        assert!(resampled.iter().all(|&sample| (sample - 0.5).abs() < 1e-6));
    }

    #[test]
    fn upsampling_interpolates_between_neighbours() {
        let resampled = linear_resample(&[0.0, 1.0], 11_025, 22_050).unwrap();
        assert_eq!(resampled.len(), 4);
        assert!((resampled[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn resample_to_updates_rate() {
        let audio = AudioData {
            samples: vec![0.1; 48_000],
            sample_rate: 48_000,
        };
        let converted = resample_to(audio, 22_050).unwrap();
        assert_eq!(converted.sample_rate, 22_050);
        assert_eq!(converted.samples.len(), 22_050);
    }

    #[test]
    fn rejects_zero_rate() {
        assert!(linear_resample(&[0.0], 0, 22_050).is_err());
    }
}
