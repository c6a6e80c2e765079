//! Feature extraction pipeline: one recording in, one scored report out.

pub mod comparison;
pub mod dtw;
pub mod energy;
pub mod pitch;
pub mod rhythm;
pub mod spectral;
pub mod stats;
pub mod timbre;
pub mod voice;

use std::path::Path;
use std::time::Instant;

use anyhow::{anyhow, Result};
use tracing::{debug, info, warn};

use crate::audio::{self, transcode::Transcoder};
use crate::config::AnalysisConfig;
use crate::report::AnalysisReport;
use crate::scoring::ScoreAggregator;
use crate::types::{AudioData, CategoryOutcome, Comparison, FeatureBundle};
use spectral::Spectrogram;

/// Runs every extractor over a recording and scores the result.
///
/// Each category is isolated: a failure is recorded in its own slot of the
/// bundle and never aborts the run.
#[derive(Debug)]
pub struct AudioAnalyzer {
    config: AnalysisConfig,
    transcoder: Transcoder,
    aggregator: ScoreAggregator,
}

impl AudioAnalyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        let transcoder = Transcoder::new(&config.transcoder, config.sample_rate);
        let aggregator = ScoreAggregator::new(config.scoring.clone());
        Self {
            config,
            transcoder,
            aggregator,
        }
    }

    pub fn analyze(&self, audio_path: &Path, reference_path: Option<&Path>) -> AnalysisReport {
        let started = Instant::now();
        let features = self.extract_features(audio_path, reference_path);
        let scores = self.aggregator.score(&features);
        info!(
            path = %audio_path.display(),
            overall = scores.overall,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "analysis complete"
        );
        AnalysisReport::new(audio_path, features, scores)
    }

    pub fn extract_features(
        &self,
        audio_path: &Path,
        reference_path: Option<&Path>,
    ) -> FeatureBundle {
        // one conversion serves both the decode fallback and voice analysis
        let transcoded = self.transcoder.prepare(audio_path);
        let waveform =
            audio::load_recording(audio_path, self.config.sample_rate, transcoded.as_ref())
                .map_err(|err| format!("{err:#}"));
        if let Ok(audio) = &waveform {
            debug!(
                samples = audio.samples.len(),
                seconds = audio.duration_secs(),
                "waveform loaded"
            );
        }
        let spectrogram = from_waveform(&waveform, spectral::compute);
        let pitch_track = from_waveform(&waveform, |audio| {
            let started = Instant::now();
            let track = pitch::track(audio);
            debug!(
                frames = track.frames.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "pitch tracked"
            );
            Ok(track)
        });

        let pitch = CategoryOutcome::capture("pitch", || {
            Ok(pitch::features_of(shared(&pitch_track)?))
        });
        let rhythm =
            CategoryOutcome::capture("rhythm", || rhythm::extract(shared(&spectrogram)?));
        let voice = CategoryOutcome::capture("voice", || {
            voice::extract(
                transcoded.as_ref(),
                pitch_track.as_ref().ok(),
                &self.config.voice_tiers,
            )
        });
        let timbre = CategoryOutcome::capture("timbre", || {
            timbre::extract(shared(&spectrogram)?, &self.config.timbre_tiers)
        });
        let energy = CategoryOutcome::capture("energy", || energy::extract(shared(&waveform)?));
        let comparison = match reference_path {
            Some(reference) => self.compare_with(&spectrogram, reference),
            None => Comparison::no_reference(),
        };

        FeatureBundle {
            pitch,
            rhythm,
            voice,
            timbre,
            energy,
            comparison,
        }
    }

    fn compare_with(
        &self,
        spectrogram: &std::result::Result<Spectrogram, String>,
        reference: &Path,
    ) -> Comparison {
        let outcome = shared(spectrogram).and_then(|user| {
            let reference_audio = self.load_reference(reference)?;
            let reference_spectrogram = spectral::compute(&reference_audio)?;
            comparison::compare(user, &reference_spectrogram)
        });
        match outcome {
            Ok(features) => Comparison::Compared(features),
            Err(err) => {
                let error = format!("{err:#}");
                warn!(category = "comparison", %error, "feature extraction failed");
                Comparison::failed(error)
            }
        }
    }

    /// The reference is only transcoded when symphonia cannot decode it.
    fn load_reference(&self, reference: &Path) -> Result<AudioData> {
        let rate = self.config.sample_rate;
        audio::load_waveform(reference, rate).or_else(|decode_error| {
            let transcoded = self.transcoder.prepare(reference);
            audio::read_transcoded(decode_error, transcoded.as_ref(), rate)
        })
    }
}

/// Compute a value from the shared waveform, carrying a load failure forward.
fn from_waveform<T>(
    waveform: &std::result::Result<AudioData, String>,
    compute: impl FnOnce(&AudioData) -> Result<T>,
) -> std::result::Result<T, String> {
    match waveform {
        Ok(audio) => compute(audio).map_err(|err| format!("{err:#}")),
        Err(error) => Err(error.clone()),
    }
}

/// Borrow a value computed once for several categories, or replay its error.
fn shared<T>(computed: &std::result::Result<T, String>) -> Result<&T> {
    computed.as_ref().map_err(|error| anyhow!("{error}"))
}
