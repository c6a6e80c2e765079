//! Weighted aggregation of the per-category sub-scores.

use crate::config::ScoringConfig;
use crate::types::{FeatureBundle, ScoreRecord};

/// Bumped whenever the weights or the default policy change meaning.
pub const SCORING_VERSION: u32 = 1;
pub const PITCH_WEIGHT: f64 = 0.30;
pub const RHYTHM_WEIGHT: f64 = 0.25;
pub const VOICE_WEIGHT: f64 = 0.25;
pub const BREATH_WEIGHT: f64 = 0.20;
pub const NEUTRAL_SCORE: f64 = 70.0;

const SCORE_MIN: f64 = 0.0;
const SCORE_MAX: f64 = 100.0;

#[derive(Debug, Default)]
pub struct ScoreAggregator {
    config: ScoringConfig,
}

impl ScoreAggregator {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Total over any bundle: missing or failed categories take the neutral score.
    pub fn score(&self, bundle: &FeatureBundle) -> ScoreRecord {
        let neutral = self.config.neutral_score;
        let pitch = sub_score(bundle.pitch.measured().map(|p| p.pitch_stability), neutral);
        let rhythm = sub_score(bundle.rhythm.measured().map(|r| r.rhythm_score), neutral);
        let voice = sub_score(bundle.voice.measured().map(|v| v.voice_score), neutral);
        let breath = sub_score(
            bundle.energy.measured().map(|e| e.breath_control_score),
            neutral,
        );

        let overall = pitch * self.config.pitch_weight
            + rhythm * self.config.rhythm_weight
            + voice * self.config.voice_weight
            + breath * self.config.breath_weight;

        ScoreRecord {
            overall: round_one_decimal(overall),
            pitch: round_one_decimal(pitch),
            rhythm: round_one_decimal(rhythm),
            voice: round_one_decimal(voice),
            breath: round_one_decimal(breath),
        }
    }
}

fn sub_score(value: Option<f64>, neutral: f64) -> f64 {
    clamp_score(value.unwrap_or(neutral))
}

/// Clamp into [0, 100]; NaN lands on the lower bound.
pub fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        return SCORE_MIN;
    }
    value.clamp(SCORE_MIN, SCORE_MAX)
}

/// Round the exact binary value to one decimal place, as `round(x, 1)` would.
///
/// Scaling by ten first rounds twice (`0.15 * 10.0 == 1.5`), so the decimal
/// formatter does the rounding instead.
pub fn round_one_decimal(value: f64) -> f64 {
    format!("{value:.1}").parse().unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_handles_out_of_range_and_nan() {
        assert_eq!(clamp_score(150.0), 100.0);
        assert_eq!(clamp_score(-10.0), 0.0);
        assert_eq!(clamp_score(f64::NAN), 0.0);
        assert_eq!(clamp_score(f64::INFINITY), 100.0);
    }

    #[test]
    fn rounds_to_one_decimal() {
        assert_eq!(round_one_decimal(71.54), 71.5);
        assert_eq!(round_one_decimal(71.56), 71.6);
        assert_eq!(round_one_decimal(70.0), 70.0);
    }

    #[test]
    fn rounding_uses_the_stored_binary_value() {
        // each literal sits just below the halfway point once stored as f64
        assert_eq!(round_one_decimal(0.15), 0.1);
        assert_eq!(round_one_decimal(1.15), 1.1);
        assert_eq!(round_one_decimal(71.55), 71.5);
        assert_eq!(round_one_decimal(71.500_000_000_000_01), 71.5);
    }

    #[test]
    fn all_failed_bundle_scores_neutral() {
        let bundle = FeatureBundle::all_failed("no audio");
        let scores = ScoreAggregator::default().score(&bundle);
        assert_eq!(
            scores,
            ScoreRecord {
                overall: 70.0,
                pitch: 70.0,
                rhythm: 70.0,
                voice: 70.0,
                breath: 70.0,
            }
        );
    }
}
