use anyhow::{Context, Result};
use tracing::debug;

use crate::analysis::dtw;
use crate::analysis::spectral::Spectrogram;
use crate::scoring::clamp_score;
use crate::types::ComparisonFeatures;

/// Similarity points lost per unit of per-step DTW distance.
const DISTANCE_PENALTY: f64 = 0.5;

/// Align the user's MFCC sequence inside the reference's and score the match.
pub fn compare(user: &Spectrogram, reference: &Spectrogram) -> Result<ComparisonFeatures> {
    let alignment = dtw::subsequence_dtw(user.mfcc.view(), reference.mfcc.view())
        .context("failed to align recording with reference")?;
    let dtw_distance = alignment.corner_cost / alignment.path.len().max(1) as f64;
    debug!(
        user_frames = user.mfcc.nrows(),
        reference_frames = reference.mfcc.nrows(),
        path_len = alignment.path.len(),
        path_cost = alignment.path_cost,
        dtw_distance,
        "reference alignment"
    );
    Ok(ComparisonFeatures {
        dtw_distance,
        similarity_score: clamp_score(100.0 - dtw_distance * DISTANCE_PENALTY),
        has_reference: true,
    })
}
