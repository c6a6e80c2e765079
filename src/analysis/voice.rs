//! Perturbation (jitter, shimmer) and harmonics-to-noise measures of the voice.

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::analysis::pitch::{self, PitchTrack};
use crate::analysis::stats;
use crate::audio::transcode::PreparedWav;
use crate::audio::wav;
use crate::config::VoiceTiers;
use crate::scoring::clamp_score;
use crate::types::{AudioData, VoiceFeatures, VoiceQuality};

const FREQ_MIN: f64 = 75.0;
const FREQ_MAX: f64 = 600.0;

const DEFAULT_JITTER: f64 = 0.02;
const DEFAULT_SHIMMER: f64 = 0.05;
const DEFAULT_HNR: f64 = 15.0;

const MIN_PERIOD_SECS: f64 = 0.0001;
const MAX_PERIOD_SECS: f64 = 0.02;
const MAX_PERIOD_FACTOR: f64 = 1.3;
const MAX_AMPLITUDE_FACTOR: f64 = 1.6;

const HNR_STEP_SECS: f64 = 0.01;
const HNR_SILENCE_RATIO: f32 = 0.1;
const HNR_PERIODS_PER_WINDOW: f64 = 3.0;
const MAX_CORRELATION: f64 = 1.0 - 1e-6;

const UNCONVERTED_NOTE: &str = "无法转换音频格式（需要安装 ffmpeg），使用默认值";

/// Measure the converted recording. Without a converted WAV the fixed fallback record is used.
///
/// `shared` is the run's pitch track; it is narrowed to the voice range and
/// reused when it covers the same audio, otherwise pYIN runs on the WAV.
pub(crate) fn extract(
    prepared: Option<&PreparedWav>,
    shared: Option<&PitchTrack>,
    tiers: &VoiceTiers,
) -> Result<VoiceFeatures> {
    let Some(prepared) = prepared else {
        info!("voice analysis using fallback values");
        return Ok(fallback());
    };
    let audio = wav::read_wav(prepared.path()).with_context(|| {
        format!(
            "failed to read WAV for voice analysis: {}",
            prepared.path().display()
        )
    })?;
    match shared.filter(|track| track.covers(&audio)) {
        Some(track) => {
            debug!("voice analysis reusing the shared pitch track");
            Ok(measure(&audio, &track.within(FREQ_MIN, FREQ_MAX), tiers))
        }
        None => Ok(analyze_waveform(&audio, tiers)),
    }
}

pub fn fallback() -> VoiceFeatures {
    VoiceFeatures {
        jitter: DEFAULT_JITTER,
        shimmer: DEFAULT_SHIMMER,
        hnr: DEFAULT_HNR,
        jitter_score: 60.0,
        shimmer_score: 75.0,
        hnr_score: 60.0,
        voice_score: 65.0,
        voice_quality: VoiceQuality::Good,
        note: Some(UNCONVERTED_NOTE.to_string()),
    }
}

pub fn analyze_waveform(audio: &AudioData, tiers: &VoiceTiers) -> VoiceFeatures {
    let track = pitch::track_pitch(audio, FREQ_MIN, FREQ_MAX);
    measure(audio, &track, tiers)
}

fn measure(audio: &AudioData, track: &PitchTrack, tiers: &VoiceTiers) -> VoiceFeatures {
    let runs = pick_pulses(&audio.samples, audio.sample_rate, track);
    let jitter = local_jitter(&runs, audio.sample_rate).unwrap_or(DEFAULT_JITTER);
    let shimmer = local_shimmer(&runs, audio.sample_rate).unwrap_or(DEFAULT_SHIMMER);
    let hnr = harmonics_to_noise(audio, track)
        .filter(|hnr| hnr.is_finite())
        .unwrap_or(DEFAULT_HNR);
    debug!(
        runs = runs.len(),
        pulses = runs.iter().map(Vec::len).sum::<usize>(),
        jitter,
        shimmer,
        hnr,
        "voice perturbation measured"
    );
    score(jitter, shimmer, hnr, tiers)
}

fn score(jitter: f64, shimmer: f64, hnr: f64, tiers: &VoiceTiers) -> VoiceFeatures {
    let jitter_score = clamp_score(100.0 - jitter * 2000.0);
    let shimmer_score = clamp_score(100.0 - shimmer * 500.0);
    let hnr_score = clamp_score(hnr * 4.0);
    let voice_score = 0.3 * jitter_score + 0.3 * shimmer_score + 0.4 * hnr_score;
    VoiceFeatures {
        jitter,
        shimmer,
        hnr,
        jitter_score,
        shimmer_score,
        hnr_score,
        voice_score,
        voice_quality: VoiceQuality::classify(voice_score, tiers),
        note: None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Pulse {
    position: usize,
    amplitude: f64,
}

/// One peak per local pitch period; unvoiced stretches split the pulses into runs.
fn pick_pulses(samples: &[f32], sample_rate: u32, track: &PitchTrack) -> Vec<Vec<Pulse>> {
    let len = samples.len();
    let unvoiced_step = (sample_rate as usize / 200).max(1);
    let mut runs = Vec::new();
    let mut run: Vec<Pulse> = Vec::new();
    let mut cursor = 0;

    while cursor < len {
        let Some(f0) = track.at_sample(cursor, len) else {
            if !run.is_empty() {
                runs.push(std::mem::take(&mut run));
            }
            cursor += unvoiced_step;
            continue;
        };
        let period = sample_rate as f64 / f0;
        let (start, end) = match run.last() {
            Some(previous) => (
                previous.position + ((0.8 * period).round() as usize).max(1),
                previous.position + (1.2 * period).round() as usize + 1,
            ),
            None => (cursor, cursor + (period.ceil() as usize).max(1)),
        };
        if start >= len {
            break;
        }
        let pulse = peak_in(samples, start, end.min(len));
        run.push(pulse);
        cursor = pulse.position + 1;
    }
    if !run.is_empty() {
        runs.push(run);
    }
    runs
}

fn peak_in(samples: &[f32], start: usize, end: usize) -> Pulse {
    samples[start..end]
        .iter()
        .enumerate()
        .fold(
            Pulse {
                position: start,
                amplitude: 0.0,
            },
            |best, (offset, &sample)| {
                let amplitude = sample.abs() as f64;
                if amplitude > best.amplitude {
                    Pulse {
                        position: start + offset,
                        amplitude,
                    }
                } else {
                    best
                }
            },
        )
}

fn periods(run: &[Pulse], sample_rate: u32) -> Vec<f64> {
    run.windows(2)
        .map(|pair| (pair[1].position - pair[0].position) as f64 / sample_rate as f64)
        .collect()
}

fn valid_period(period: f64) -> bool {
    (MIN_PERIOD_SECS..=MAX_PERIOD_SECS).contains(&period)
}

fn within_factor(a: f64, b: f64, factor: f64) -> bool {
    let (low, high) = if a < b { (a, b) } else { (b, a) };
    low > 0.0 && high / low <= factor
}

/// Mean absolute difference of consecutive periods over the mean period.
fn local_jitter(runs: &[Vec<Pulse>], sample_rate: u32) -> Option<f64> {
    let mut differences = Vec::new();
    let mut used = Vec::new();
    for run in runs {
        for pair in periods(run, sample_rate).windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if valid_period(a) && valid_period(b) && within_factor(a, b, MAX_PERIOD_FACTOR) {
                differences.push((b - a).abs());
                used.push(b);
            }
        }
    }
    ratio_of_means(&differences, &used)
}

/// Mean absolute difference of consecutive peak amplitudes over the mean amplitude.
fn local_shimmer(runs: &[Vec<Pulse>], sample_rate: u32) -> Option<f64> {
    let mut differences = Vec::new();
    let mut used = Vec::new();
    for run in runs {
        for pair in run.windows(2) {
            let period = (pair[1].position - pair[0].position) as f64 / sample_rate as f64;
            let (a, b) = (pair[0].amplitude, pair[1].amplitude);
            if valid_period(period) && within_factor(a, b, MAX_AMPLITUDE_FACTOR) {
                differences.push((b - a).abs());
                used.push(b);
            }
        }
    }
    ratio_of_means(&differences, &used)
}

fn ratio_of_means(numerator: &[f64], denominator: &[f64]) -> Option<f64> {
    let top = stats::mean(numerator)?;
    let bottom = stats::mean(denominator)?;
    (bottom > 0.0).then(|| top / bottom)
}

/// Mean autocorrelation HNR (dB) over voiced 10 ms steps, searching lags near the local period.
fn harmonics_to_noise(audio: &AudioData, track: &PitchTrack) -> Option<f64> {
    let samples = &audio.samples;
    let sample_rate = audio.sample_rate as f64;
    let len = samples.len();
    let global_peak = samples.iter().fold(0.0_f32, |peak, s| peak.max(s.abs()));
    if global_peak <= 0.0 {
        return None;
    }
    let step = ((HNR_STEP_SECS * sample_rate) as usize).max(1);
    let min_lag = (sample_rate / FREQ_MAX).floor().max(1.0) as usize;
    let max_lag = (sample_rate / FREQ_MIN).ceil() as usize;

    let mut values = Vec::new();
    let mut start = 0;
    while start < len {
        if let Some(f0) = track.at_sample(start, len) {
            let period = sample_rate / f0;
            let window = (HNR_PERIODS_PER_WINDOW * period).ceil() as usize;
            let lags = ((0.8 * period).floor() as usize).max(min_lag)
                ..=((1.2 * period).ceil() as usize).min(max_lag);
            if start + window <= len {
                let frame = &samples[start..start + window];
                let frame_peak = frame.iter().fold(0.0_f32, |peak, s| peak.max(s.abs()));
                if frame_peak >= HNR_SILENCE_RATIO * global_peak {
                    if let Some(r) = peak_correlation(frame, lags) {
                        let r = r.min(MAX_CORRELATION);
                        values.push(10.0 * (r / (1.0 - r)).log10());
                    }
                }
            }
        }
        start += step;
    }
    stats::mean(&values)
}

/// Highest normalised autocorrelation over `lags`; `None` when no lag correlates positively.
fn peak_correlation(frame: &[f32], lags: std::ops::RangeInclusive<usize>) -> Option<f64> {
    let mean = frame.iter().map(|&s| s as f64).sum::<f64>() / frame.len() as f64;
    let centered: Vec<f64> = frame.iter().map(|&s| s as f64 - mean).collect();
    lags.filter(|&lag| lag < centered.len())
        .filter_map(|lag| {
            let (head, tail) = (&centered[..centered.len() - lag], &centered[lag..]);
            let cross: f64 = head.iter().zip(tail).map(|(a, b)| a * b).sum();
            let energy_head: f64 = head.iter().map(|a| a * a).sum();
            let energy_tail: f64 = tail.iter().map(|b| b * b).sum();
            let norm = (energy_head * energy_tail).sqrt();
            (norm > 0.0).then(|| cross / norm)
        })
        .filter(|&r| r > 0.0)
        .max_by(|a, b| a.total_cmp(b))
}
