//! Tempo estimation and dynamic-programming beat tracking over an onset envelope.

use anyhow::{ensure, Result};

use crate::analysis::spectral::Spectrogram;
use crate::analysis::stats;
use crate::scoring::clamp_score;
use crate::types::RhythmFeatures;

const MIN_BPM: f64 = 30.0;
const MAX_BPM: f64 = 300.0;
const PRIOR_BPM: f64 = 120.0;
/// Width of the log-normal tempo prior, in octaves.
const PRIOR_OCTAVES: f64 = 1.0;
const AUTOCORRELATION_SECONDS: f64 = 8.0;
const TIGHTNESS: f64 = 100.0;
const TOP_DB: f64 = 80.0;
const POWER_FLOOR: f64 = 1e-10;
/// Score given when fewer than two beats are found.
const SPARSE_BEAT_SCORE: f64 = 50.0;

pub fn extract(spectrogram: &Spectrogram) -> Result<RhythmFeatures> {
    ensure!(spectrogram.frame_count() > 0, "no spectral frames to track");
    let envelope = onset_envelope(&spectrogram.mel);
    let frame_rate = spectrogram.frame_rate();
    let tempo = estimate_tempo(&envelope, frame_rate);
    let beats = track_beats(&envelope, tempo, frame_rate);
    Ok(summarize(tempo, &beats, frame_rate))
}

fn summarize(tempo: f64, beats: &[usize], frame_rate: f64) -> RhythmFeatures {
    if beats.len() < 2 {
        return RhythmFeatures {
            tempo,
            beat_regularity: 0.0,
            rhythm_score: SPARSE_BEAT_SCORE,
        };
    }
    let intervals: Vec<f64> = beats
        .windows(2)
        .map(|pair| (pair[1] - pair[0]) as f64 / frame_rate)
        .collect();
    let beat_regularity = stats::stability_percent(&intervals);
    RhythmFeatures {
        tempo,
        beat_regularity,
        rhythm_score: clamp_score(beat_regularity),
    }
}

/// Half-wave rectified spectral flux of the log-power mel spectrogram, averaged over bands.
pub(crate) fn onset_envelope(mel: &[Vec<f64>]) -> Vec<f64> {
    let db: Vec<Vec<f64>> = mel
        .iter()
        .map(|frame| {
            frame
                .iter()
                .map(|&p| 10.0 * p.max(POWER_FLOOR).log10())
                .collect()
        })
        .collect();
    let peak = db
        .iter()
        .flatten()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    let floor = peak - TOP_DB;

    let mut envelope = Vec::with_capacity(db.len());
    if db.is_empty() {
        return envelope;
    }
    envelope.push(0.0);
    for pair in db.windows(2) {
        let (previous, current) = (&pair[0], &pair[1]);
        let bands = current.len().max(1) as f64;
        let flux: f64 = current
            .iter()
            .zip(previous)
            .map(|(&c, &p)| (c.max(floor) - p.max(floor)).max(0.0))
            .sum();
        envelope.push(flux / bands);
    }
    envelope
}

/// Autocorrelation peak weighted by a log-normal prior around 120 BPM. 0 when the envelope is flat.
pub(crate) fn estimate_tempo(envelope: &[f64], frame_rate: f64) -> f64 {
    if envelope.len() < 2 || envelope.iter().all(|&v| v <= 0.0) {
        return 0.0;
    }
    let window = ((AUTOCORRELATION_SECONDS * frame_rate) as usize).min(envelope.len() - 1);
    let min_lag = ((60.0 * frame_rate / MAX_BPM).floor() as usize).max(1);
    let max_lag = ((60.0 * frame_rate / MIN_BPM).ceil() as usize).min(window);

    let mut best: Option<(f64, f64)> = None;
    for lag in min_lag..=max_lag {
        let correlation: f64 = envelope
            .iter()
            .zip(&envelope[lag..])
            .map(|(a, b)| a * b)
            .sum();
        let bpm = 60.0 * frame_rate / lag as f64;
        let weight = (-0.5 * ((bpm / PRIOR_BPM).log2() / PRIOR_OCTAVES).powi(2)).exp();
        let score = correlation * weight;
        if score > 0.0 && best.map_or(true, |(top, _)| score > top) {
            best = Some((score, bpm));
        }
    }
    best.map(|(_, bpm)| bpm).unwrap_or(0.0)
}

/// Beat frame indices chosen by dynamic programming (Ellis, 2007).
pub(crate) fn track_beats(envelope: &[f64], tempo: f64, frame_rate: f64) -> Vec<usize> {
    if tempo <= 0.0 || envelope.is_empty() {
        return Vec::new();
    }
    let Some(deviation) = sample_std(envelope).filter(|std| *std > 0.0) else {
        return Vec::new();
    };
    let period = 60.0 * frame_rate / tempo;
    let normalized: Vec<f64> = envelope.iter().map(|v| v / deviation).collect();
    let local = local_score(&normalized, period);

    let (cumulative, backlinks) = accumulate(&local, period);
    let Some(last) = last_beat(&cumulative) else {
        return Vec::new();
    };

    let mut beats = vec![last];
    let mut cursor = last;
    while let Some(previous) = backlinks[cursor] {
        beats.push(previous);
        cursor = previous;
    }
    beats.reverse();
    trim_weak_edges(beats, &local)
}

fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = stats::mean(values)?;
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

/// Onset envelope smoothed with a Gaussian whose width tracks the beat period.
fn local_score(envelope: &[f64], period: f64) -> Vec<f64> {
    let radius = period.round().max(1.0) as isize;
    let kernel: Vec<f64> = (-radius..=radius)
        .map(|k| (-0.5 * (k as f64 * 32.0 / period).powi(2)).exp())
        .collect();
    let len = envelope.len() as isize;
    (0..len)
        .map(|i| {
            kernel
                .iter()
                .zip(-radius..=radius)
                .filter_map(|(w, k)| {
                    let j = i + k;
                    (0..len).contains(&j).then(|| w * envelope[j as usize])
                })
                .sum()
        })
        .collect()
}

fn accumulate(local: &[f64], period: f64) -> (Vec<f64>, Vec<Option<usize>>) {
    let far = (2.0 * period).round() as usize;
    let near = (period / 2.0).round().max(1.0) as usize;
    let mut cumulative = vec![0.0; local.len()];
    let mut backlinks = vec![None; local.len()];

    for i in 0..local.len() {
        let mut best: Option<(f64, usize)> = None;
        if i >= near {
            for previous in i.saturating_sub(far)..=(i - near) {
                let gap = (i - previous) as f64;
                let penalty = TIGHTNESS * (gap / period).ln().powi(2);
                let candidate = cumulative[previous] - penalty;
                if best.map_or(true, |(top, _)| candidate > top) {
                    best = Some((candidate, previous));
                }
            }
        }
        match best {
            Some((score, previous)) if score > 0.0 => {
                cumulative[i] = local[i] + score;
                backlinks[i] = Some(previous);
            }
            _ => cumulative[i] = local[i],
        }
    }
    (cumulative, backlinks)
}

/// Last local maximum of the cumulative score that reaches half the median peak.
fn last_beat(cumulative: &[f64]) -> Option<usize> {
    let peaks: Vec<usize> = (0..cumulative.len())
        .filter(|&i| {
            let left = i == 0 || cumulative[i] > cumulative[i - 1];
            let right = i + 1 == cumulative.len() || cumulative[i] >= cumulative[i + 1];
            left && right
        })
        .collect();
    let mut heights: Vec<f64> = peaks.iter().map(|&i| cumulative[i]).collect();
    if heights.is_empty() {
        return None;
    }
    heights.sort_by(|a, b| a.total_cmp(b));
    let median = heights[heights.len() / 2];
    peaks
        .into_iter()
        .rev()
        .find(|&i| cumulative[i] >= 0.5 * median)
}

/// Drop leading and trailing beats whose onset strength is below half the RMS of all beats.
fn trim_weak_edges(beats: Vec<usize>, local: &[f64]) -> Vec<usize> {
    if beats.is_empty() {
        return beats;
    }
    let strengths: Vec<f64> = beats.iter().map(|&b| local[b]).collect();
    let rms = (strengths.iter().map(|s| s * s).sum::<f64>() / strengths.len() as f64).sqrt();
    let threshold = 0.5 * rms;
    let first = strengths.iter().position(|&s| s >= threshold);
    let last = strengths.iter().rposition(|&s| s >= threshold);
    match (first, last) {
        (Some(first), Some(last)) => beats[first..=last].to_vec(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const FRAME_RATE: f64 = 22_050.0 / 512.0;

    /// Impulse envelope with one onset every `period` frames.
    fn pulse_envelope(period: usize, seconds: f64) -> Vec<f64> {
        let frames = (seconds * FRAME_RATE) as usize;
        (0..frames)
            .map(|i| if i % period == 0 { 1.0 } else { 0.0 })
            .collect()
    }

    #[test]
    fn tempo_of_regular_pulses() {
        let envelope = pulse_envelope(21, 12.0);
        let tempo = estimate_tempo(&envelope, FRAME_RATE);
        let expected = 60.0 * FRAME_RATE / 21.0;
        assert_relative_eq!(tempo, expected, max_relative = 0.02);
    }

    #[test]
    fn flat_envelope_has_no_tempo_or_beats() {
        let envelope = vec![0.0; 400];
        assert_eq!(estimate_tempo(&envelope, FRAME_RATE), 0.0);
        assert!(track_beats(&envelope, 120.0, FRAME_RATE).is_empty());
    }

    #[test]
    fn beats_follow_regular_pulses() {
        let envelope = pulse_envelope(26, 12.0);
        let tempo = estimate_tempo(&envelope, FRAME_RATE);
        let beats = track_beats(&envelope, tempo, FRAME_RATE);
        assert!(beats.len() >= 10, "beats={beats:?}");
        let features = summarize(tempo, &beats, FRAME_RATE);
        assert!(features.beat_regularity > 90.0, "{features:?}");
        assert!(features.rhythm_score <= 100.0);
    }

    #[test]
    fn sparse_beats_score_fifty() {
        let features = summarize(96.0, &[10], FRAME_RATE);
        assert_eq!(features.beat_regularity, 0.0);
        assert_eq!(features.rhythm_score, 50.0);
        assert_eq!(features.tempo, 96.0);
    }

    #[test]
    fn irregular_beats_are_clamped_to_zero() {
        // intervals 1, 10, 1, 10 frames -> cv above 1
        let features = summarize(120.0, &[0, 1, 11, 12, 22, 23, 123], FRAME_RATE);
        assert!(features.beat_regularity < 0.0);
        assert_eq!(features.rhythm_score, 0.0);
    }

    #[test]
    fn onset_envelope_rises_on_energy_increase() {
        let quiet = vec![1e-6; 4];
        let loud = vec![1.0; 4];
        let envelope = onset_envelope(&[quiet.clone(), loud.clone(), loud, quiet]);
        assert_eq!(envelope.len(), 4);
        assert_eq!(envelope[0], 0.0);
        assert_relative_eq!(envelope[1], 60.0, epsilon = 1e-9);
        assert_eq!(envelope[2], 0.0);
        assert_eq!(envelope[3], 0.0);
    }
}
