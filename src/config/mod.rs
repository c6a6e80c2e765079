use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, ensure, Context, Result};
use serde::Deserialize;

use crate::scoring;

/// Sample rate every waveform is brought to before analysis.
pub const ANALYSIS_SAMPLE_RATE: u32 = 22_050;

/// Runtime configuration. Every field has a built-in default, so an override
/// file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    pub sample_rate: u32,
    pub scoring: ScoringConfig,
    pub voice_tiers: VoiceTiers,
    pub timbre_tiers: TimbreTiers,
    pub transcoder: TranscoderConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sample_rate: ANALYSIS_SAMPLE_RATE,
            scoring: ScoringConfig::default(),
            voice_tiers: VoiceTiers::default(),
            timbre_tiers: TimbreTiers::default(),
            transcoder: TranscoderConfig::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn from_override(path: Option<PathBuf>) -> Result<Self> {
        let config = match path {
            Some(custom) => load_file(&canonicalize_file(&custom)?)?,
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.sample_rate > 0, "sample_rate must be positive");
        self.scoring.validate()?;
        self.voice_tiers.validate()?;
        self.timbre_tiers.validate()?;
        ensure!(
            self.transcoder.timeout_secs > 0,
            "transcoder timeout_secs must be positive"
        );
        Ok(())
    }
}

/// Versioned weighting contract for the aggregate score.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScoringConfig {
    pub version: u32,
    pub pitch_weight: f64,
    pub rhythm_weight: f64,
    pub voice_weight: f64,
    pub breath_weight: f64,
    /// Sub-score used when a category is missing or failed
    pub neutral_score: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            version: scoring::SCORING_VERSION,
            pitch_weight: scoring::PITCH_WEIGHT,
            rhythm_weight: scoring::RHYTHM_WEIGHT,
            voice_weight: scoring::VOICE_WEIGHT,
            breath_weight: scoring::BREATH_WEIGHT,
            neutral_score: scoring::NEUTRAL_SCORE,
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.version == scoring::SCORING_VERSION,
            "unsupported scoring version {} (expected {})",
            self.version,
            scoring::SCORING_VERSION
        );
        let weights = [
            ("pitch_weight", self.pitch_weight),
            ("rhythm_weight", self.rhythm_weight),
            ("voice_weight", self.voice_weight),
            ("breath_weight", self.breath_weight),
        ];
        for (name, weight) in weights {
            ensure!(
                weight.is_finite() && weight >= 0.0,
                "{name} must be a non-negative number, got {weight}"
            );
        }
        let total: f64 = weights.iter().map(|(_, weight)| weight).sum();
        ensure!(
            (total - 1.0).abs() <= 1e-6,
            "scoring weights must sum to 1.0, got {total}"
        );
        ensure!(
            (0.0..=100.0).contains(&self.neutral_score),
            "neutral_score must lie in [0, 100], got {}",
            self.neutral_score
        );
        Ok(())
    }
}

/// Upper bounds (exclusive) of the lower three voice quality tiers.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VoiceTiers {
    pub needs_improvement_below: f64,
    pub good_below: f64,
    pub very_good_below: f64,
}

impl Default for VoiceTiers {
    fn default() -> Self {
        Self {
            needs_improvement_below: 60.0,
            good_below: 75.0,
            very_good_below: 90.0,
        }
    }
}

impl VoiceTiers {
    fn validate(&self) -> Result<()> {
        ensure!(
            self.needs_improvement_below <= self.good_below
                && self.good_below <= self.very_good_below,
            "voice tier thresholds must be ascending"
        );
        Ok(())
    }
}

/// Spectral centroid thresholds (Hz) for the brightness label.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimbreTiers {
    pub bright_above: f64,
    pub soft_above: f64,
}

impl Default for TimbreTiers {
    fn default() -> Self {
        Self {
            bright_above: 2000.0,
            soft_above: 1500.0,
        }
    }
}

impl TimbreTiers {
    fn validate(&self) -> Result<()> {
        ensure!(
            self.soft_above <= self.bright_above,
            "timbre tier thresholds must be ascending"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TranscoderConfig {
    /// Program invoked to downmix/resample non-WAV input
    pub program: PathBuf,
    pub timeout_secs: u64,
    /// Directory for the temporary WAV; the system temp dir when unset
    pub temp_dir: Option<PathBuf>,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
            timeout_secs: 60,
            temp_dir: None,
        }
    }
}

impl TranscoderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn load_file(path: &Path) -> Result<AnalysisConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {:?}", path))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse config file {:?}", path))
}

fn canonicalize_file(path: &Path) -> Result<PathBuf> {
    let canonical = path
        .canonicalize()
        .with_context(|| format!("failed to resolve config file at {:?}", path))?;
    if canonical.is_file() {
        Ok(canonical)
    } else {
        Err(anyhow!("config path {:?} is not a file", canonical))
    }
}
