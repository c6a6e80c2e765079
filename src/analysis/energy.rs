use anyhow::{ensure, Result};

use crate::analysis::spectral::{FFT_SIZE, HOP_SIZE};
use crate::analysis::stats;
use crate::scoring::clamp_score;
use crate::types::{AudioData, EnergyFeatures};

pub fn extract(audio: &AudioData) -> Result<EnergyFeatures> {
    ensure!(!audio.samples.is_empty(), "audio contains no samples");
    let rms = frame_rms(&audio.samples, FFT_SIZE, HOP_SIZE);
    let energy_mean = stats::mean(&rms).unwrap_or(0.0);
    let (lowest, highest) = stats::min_max(&rms).unwrap_or((0.0, 0.0));
    let energy_stability = clamp_score(stats::stability_percent(&rms));
    Ok(EnergyFeatures {
        energy_mean,
        energy_stability,
        dynamic_range: highest - lowest,
        breath_control_score: energy_stability,
    })
}

/// Root-mean-square of each frame. A clip shorter than one frame is zero-padded.
pub(crate) fn frame_rms(samples: &[f32], frame: usize, hop: usize) -> Vec<f64> {
    let frame_energy = |window: &[f32]| {
        let sum: f64 = window.iter().map(|&s| (s as f64).powi(2)).sum();
        (sum / frame as f64).sqrt()
    };
    if samples.len() <= frame {
        return vec![frame_energy(samples)];
    }
    (0..=samples.len() - frame)
        .step_by(hop)
        .map(|start| frame_energy(&samples[start..start + frame]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn audio(samples: Vec<f32>) -> AudioData {
        AudioData {
            samples,
            sample_rate: 22_050,
        }
    }

    #[test]
    fn constant_signal_is_perfectly_stable() {
        let features = extract(&audio(vec![0.5; 22_050])).unwrap();
        assert_relative_eq!(features.energy_mean, 0.5, epsilon = 1e-9);
        assert_relative_eq!(features.energy_stability, 100.0, epsilon = 1e-6);
        assert_relative_eq!(features.dynamic_range, 0.0, epsilon = 1e-9);
        assert_eq!(features.breath_control_score, features.energy_stability);
    }

    #[test]
    fn silence_has_zero_stability() {
        let features = extract(&audio(vec![0.0; 10_000])).unwrap();
        assert_eq!(features.energy_mean, 0.0);
        assert_eq!(features.energy_stability, 0.0);
        assert_eq!(features.breath_control_score, 0.0);
    }

    #[test]
    fn swelling_signal_loses_stability() {
        let samples: Vec<f32> = (0..22_050).map(|i| i as f32 / 22_050.0).collect();
        let features = extract(&audio(samples)).unwrap();
        assert!(features.energy_stability < 90.0, "{features:?}");
        assert!(features.dynamic_range > 0.5, "{features:?}");
    }

    #[test]
    fn frames_advance_by_hop() {
        assert_eq!(frame_rms(&[0.0; 4096], 2048, 512).len(), 5);
        assert_eq!(frame_rms(&[1.0; 100], 2048, 512).len(), 1);
    }

    #[test]
    fn empty_audio_is_rejected() {
        assert!(extract(&audio(Vec::new())).is_err());
    }
}
