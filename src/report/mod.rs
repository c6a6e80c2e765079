//! Output records and the one-line JSON rendering the caller parses from stdout.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::types::{FeatureBundle, ScoreRecord};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub success: bool,
    pub audio_path: String,
    pub features: FeatureBundle,
    pub scores: ScoreRecord,
}

impl AnalysisReport {
    pub fn new(audio_path: &Path, features: FeatureBundle, scores: ScoreRecord) -> Self {
        Self {
            success: true,
            audio_path: audio_path.to_string_lossy().into_owned(),
            features,
            scores,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureReport {
    pub success: bool,
    pub error: String,
}

impl FailureReport {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

/// Compact single-line JSON; non-ASCII text is written as UTF-8, not escaped.
pub fn render_line<T: Serialize>(record: &T) -> Result<String> {
    serde_json::to_string(record).context("failed to serialise report")
}

/// Failure line that cannot itself fail to render.
pub fn failure_line(error: &str) -> String {
    render_line(&FailureReport::new(error))
        .unwrap_or_else(|_| serde_json::json!({ "success": false, "error": error }).to_string())
}
