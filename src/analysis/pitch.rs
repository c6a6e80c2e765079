use anyhow::Result;
use aus::analysis;

use crate::analysis::stats;
use crate::types::{AudioData, PitchFeatures};

const FREQ_MIN: f64 = 50.0;
const FREQ_MAX: f64 = 2000.0;
/// Rate pYIN runs at; input is decimated by an integer factor down towards it.
const TRACKING_RATE: u32 = 11_025;
/// 93 ms at the tracking rate, room for two 50 Hz periods.
pub(crate) const FRAME_LENGTH: usize = 1024;
const REPORTED_VALUES: usize = 100;
/// Tracks are shared between recordings whose lengths differ by at most this.
const SHARED_DURATION_TOLERANCE_SECS: f64 = 0.05;

/// f0 per analysis frame; `None` where the frame is unvoiced.
#[derive(Debug, Clone, Default)]
pub(crate) struct PitchTrack {
    pub frames: Vec<Option<f64>>,
    pub duration_secs: f64,
}

impl PitchTrack {
    pub fn voiced(&self) -> impl Iterator<Item = f64> + '_ {
        self.frames.iter().filter_map(|f0| *f0)
    }

    /// f0 of the frame covering `sample` out of `total` samples.
    pub fn at_sample(&self, sample: usize, total: usize) -> Option<f64> {
        if self.frames.is_empty() || total == 0 {
            return None;
        }
        let index = (sample as u128 * self.frames.len() as u128 / total as u128) as usize;
        self.frames[index.min(self.frames.len() - 1)]
    }

    /// Same track with frames outside `fmin..=fmax` marked unvoiced.
    pub fn within(&self, fmin: f64, fmax: f64) -> PitchTrack {
        PitchTrack {
            frames: self
                .frames
                .iter()
                .map(|f0| f0.filter(|f0| (fmin..=fmax).contains(f0)))
                .collect(),
            duration_secs: self.duration_secs,
        }
    }

    /// Frame positions are proportional, so a track fits any rendering of the same length.
    pub fn covers(&self, audio: &AudioData) -> bool {
        (self.duration_secs - audio.duration_secs()).abs() <= SHARED_DURATION_TOLERANCE_SECS
    }
}

/// pYIN over the decimated recording. Clips shorter than one frame yield an empty track.
pub(crate) fn track_pitch(audio: &AudioData, fmin: f64, fmax: f64) -> PitchTrack {
    let duration_secs = audio.duration_secs();
    let (samples, rate) = decimate(audio);
    if samples.len() < FRAME_LENGTH {
        return PitchTrack {
            frames: Vec::new(),
            duration_secs,
        };
    }
    let (_timestamps, pitches, voiced_flags, _confidence) =
        analysis::pyin_pitch_estimator(&samples, rate, fmin, fmax, FRAME_LENGTH);
    let frames = pitches
        .iter()
        .zip(voiced_flags.iter())
        .map(|(&pitch, &voiced)| (voiced && pitch.is_finite() && pitch > 0.0).then_some(pitch))
        .collect();
    PitchTrack {
        frames,
        duration_secs,
    }
}

/// Box-filter and keep one sample per block so pYIN sees roughly `TRACKING_RATE`.
fn decimate(audio: &AudioData) -> (Vec<f64>, u32) {
    let factor = (audio.sample_rate / TRACKING_RATE).max(1);
    let samples = audio
        .samples
        .chunks(factor as usize)
        .map(|block| block.iter().map(|&s| s as f64).sum::<f64>() / block.len() as f64)
        .collect();
    (samples, audio.sample_rate / factor)
}

/// The track pitch features are summarised from.
pub(crate) fn track(audio: &AudioData) -> PitchTrack {
    track_pitch(audio, FREQ_MIN, FREQ_MAX)
}

pub fn extract(audio: &AudioData) -> Result<PitchFeatures> {
    Ok(features_of(&track(audio)))
}

pub(crate) fn features_of(track: &PitchTrack) -> PitchFeatures {
    summarize(&track.voiced().collect::<Vec<_>>())
}

pub(crate) fn summarize(voiced: &[f64]) -> PitchFeatures {
    let (Some(mean_pitch), Some((lowest, highest))) = (stats::mean(voiced), stats::min_max(voiced))
    else {
        return PitchFeatures::unvoiced();
    };
    PitchFeatures {
        mean_pitch,
        pitch_range: highest - lowest,
        pitch_stability: stats::stability_percent(voiced),
        pitch_values: voiced.iter().take(REPORTED_VALUES).copied().collect(),
    }
}
