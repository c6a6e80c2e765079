//! Acoustic quality analysis of vocal recordings.
//!
//! [`analysis::AudioAnalyzer`] extracts per-category features into a
//! [`types::FeatureBundle`], and [`scoring::ScoreAggregator`] turns the bundle
//! into weighted scores.

pub mod analysis;
pub mod audio;
pub mod cli;
pub mod config;
pub mod report;
pub mod scoring;
pub mod types;
