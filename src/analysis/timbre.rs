use anyhow::{ensure, Result};
use ndarray::Axis;

use crate::analysis::spectral::Spectrogram;
use crate::analysis::stats;
use crate::config::TimbreTiers;
use crate::types::{BrightnessLevel, TimbreFeatures};

const ROLLOFF_FRACTION: f64 = 0.85;

pub fn extract(spectrogram: &Spectrogram, tiers: &TimbreTiers) -> Result<TimbreFeatures> {
    ensure!(spectrogram.frame_count() > 0, "no spectral frames for timbre");
    let mfcc = spectrogram
        .mfcc
        .mean_axis(Axis(0))
        .map(|means| means.to_vec())
        .unwrap_or_default();

    let centroids: Vec<f64> = spectrogram
        .magnitude
        .iter()
        .map(|frame| spectral_centroid(frame, &spectrogram.freqs))
        .collect();
    let rolloffs: Vec<f64> = spectrogram
        .magnitude
        .iter()
        .map(|frame| spectral_rolloff(frame, &spectrogram.freqs, ROLLOFF_FRACTION))
        .collect();
    let brightness = stats::mean(&centroids).unwrap_or(0.0);
    let warmth = stats::mean(&rolloffs).unwrap_or(0.0);

    Ok(TimbreFeatures {
        mfcc,
        brightness,
        warmth,
        brightness_level: BrightnessLevel::classify(brightness, tiers),
    })
}

/// Magnitude-weighted mean frequency of one frame; 0 for a silent frame.
pub(crate) fn spectral_centroid(magnitude: &[f64], freqs: &[f64]) -> f64 {
    let total: f64 = magnitude.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    magnitude.iter().zip(freqs).map(|(m, f)| m * f).sum::<f64>() / total
}

/// Lowest bin frequency below which `fraction` of the frame's magnitude lies.
pub(crate) fn spectral_rolloff(magnitude: &[f64], freqs: &[f64], fraction: f64) -> f64 {
    let total: f64 = magnitude.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    let threshold = fraction * total;
    let mut cumulative = 0.0;
    for (m, f) in magnitude.iter().zip(freqs) {
        cumulative += m;
        if cumulative >= threshold {
            return *f;
        }
    }
    freqs.last().copied().unwrap_or(0.0)
}
