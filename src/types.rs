//! Core types for the vocal analysis pipeline

use serde::Serialize;
use tracing::warn;

use crate::config::{TimbreTiers, VoiceTiers};

/// Raw audio data representation (mono, f32 samples)
#[derive(Debug, Clone)]
pub struct AudioData {
    /// Audio samples, normalized to [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Sample rate in Hz (e.g., 22050)
    pub sample_rate: u32,
}

impl AudioData {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Result of one feature category: either the measured record or an error marker.
///
/// Serializes untagged, so a failure renders as `{"error": "..."}` in place of the record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CategoryOutcome<T> {
    Measured(T),
    Failed { error: String },
}

impl<T> CategoryOutcome<T> {
    /// Run one extraction step, turning any error into a `Failed` marker for this category only.
    pub fn capture<F>(category: &str, extract: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<T>,
    {
        match extract() {
            Ok(record) => CategoryOutcome::Measured(record),
            Err(err) => {
                let error = format!("{err:#}");
                warn!(category, %error, "feature extraction failed");
                CategoryOutcome::Failed { error }
            }
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        CategoryOutcome::Failed {
            error: error.into(),
        }
    }

    pub fn measured(&self) -> Option<&T> {
        match self {
            CategoryOutcome::Measured(record) => Some(record),
            CategoryOutcome::Failed { .. } => None,
        }
    }
}

/// Pitch statistics over voiced frames.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PitchFeatures {
    pub mean_pitch: f64,
    pub pitch_range: f64,
    pub pitch_stability: f64,
    /// First voiced f0 values in frame order (Hz)
    pub pitch_values: Vec<f64>,
}

impl PitchFeatures {
    /// Record used when no frame is voiced.
    pub fn unvoiced() -> Self {
        Self {
            mean_pitch: 0.0,
            pitch_range: 0.0,
            pitch_stability: 0.0,
            pitch_values: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RhythmFeatures {
    /// Estimated tempo in BPM
    pub tempo: f64,
    pub beat_regularity: f64,
    pub rhythm_score: f64,
}

/// Four-tier voice quality label. Wire values are the labels the caller displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VoiceQuality {
    #[serde(rename = "需要改进")]
    NeedsImprovement,
    #[serde(rename = "良好")]
    Good,
    #[serde(rename = "很好")]
    VeryGood,
    #[serde(rename = "优秀")]
    Excellent,
}

impl VoiceQuality {
    pub fn classify(voice_score: f64, tiers: &VoiceTiers) -> Self {
        if voice_score < tiers.needs_improvement_below {
            VoiceQuality::NeedsImprovement
        } else if voice_score < tiers.good_below {
            VoiceQuality::Good
        } else if voice_score < tiers.very_good_below {
            VoiceQuality::VeryGood
        } else {
            VoiceQuality::Excellent
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoiceFeatures {
    pub jitter: f64,
    pub shimmer: f64,
    /// Harmonics-to-noise ratio in dB
    pub hnr: f64,
    pub jitter_score: f64,
    pub shimmer_score: f64,
    pub hnr_score: f64,
    pub voice_score: f64,
    pub voice_quality: VoiceQuality,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Three-tier brightness label derived from the spectral centroid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BrightnessLevel {
    #[serde(rename = "明亮")]
    Bright,
    #[serde(rename = "柔和")]
    Soft,
    #[serde(rename = "低沉")]
    Deep,
}

impl BrightnessLevel {
    pub fn classify(brightness: f64, tiers: &TimbreTiers) -> Self {
        if brightness > tiers.bright_above {
            BrightnessLevel::Bright
        } else if brightness > tiers.soft_above {
            BrightnessLevel::Soft
        } else {
            BrightnessLevel::Deep
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimbreFeatures {
    /// Per-coefficient mean of 13 MFCCs
    pub mfcc: Vec<f64>,
    /// Mean spectral centroid (Hz)
    pub brightness: f64,
    /// Mean spectral roll-off (Hz)
    pub warmth: f64,
    pub brightness_level: BrightnessLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnergyFeatures {
    pub energy_mean: f64,
    pub energy_stability: f64,
    pub dynamic_range: f64,
    pub breath_control_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonFeatures {
    pub dtw_distance: f64,
    pub similarity_score: f64,
    pub has_reference: bool,
}

/// Reference comparison outcome; unlike the other categories it always carries `has_reference`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Comparison {
    Compared(ComparisonFeatures),
    Failed { error: String, has_reference: bool },
    NoReference { has_reference: bool },
}

impl Comparison {
    pub fn no_reference() -> Self {
        Comparison::NoReference {
            has_reference: false,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Comparison::Failed {
            error: error.into(),
            has_reference: false,
        }
    }
}

/// Every feature category produced by one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureBundle {
    pub pitch: CategoryOutcome<PitchFeatures>,
    pub rhythm: CategoryOutcome<RhythmFeatures>,
    pub voice: CategoryOutcome<VoiceFeatures>,
    pub timbre: CategoryOutcome<TimbreFeatures>,
    pub energy: CategoryOutcome<EnergyFeatures>,
    pub comparison: Comparison,
}

impl FeatureBundle {
    /// Bundle in which every category failed with the same message.
    pub fn all_failed(error: &str) -> Self {
        Self {
            pitch: CategoryOutcome::failed(error),
            rhythm: CategoryOutcome::failed(error),
            voice: CategoryOutcome::failed(error),
            timbre: CategoryOutcome::failed(error),
            energy: CategoryOutcome::failed(error),
            comparison: Comparison::no_reference(),
        }
    }
}

/// Aggregate score and sub-scores, each in [0, 100] with one decimal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreRecord {
    pub overall: f64,
    pub pitch: f64,
    pub rhythm: f64,
    pub voice: f64,
    pub breath: f64,
}
