use anyhow::{ensure, Context, Result};
use aus::analysis;
use aus::analysis::mel::MelFilterbank;
use aus::spectrum;
use aus::WindowType;
use ndarray::Array2;

use crate::types::AudioData;

pub(crate) const FFT_SIZE: usize = 2048;
pub(crate) const HOP_SIZE: usize = 512;
pub(crate) const MEL_BANDS: usize = 128;
pub(crate) const MFCC_COUNT: usize = 13;
const MIN_FREQ: f64 = 20.0;

/// Short-time spectra of one waveform, shared by the rhythm, timbre and comparison extractors.
pub struct Spectrogram {
    pub sample_rate: u32,
    pub hop_size: usize,
    /// Bin centre frequencies (Hz)
    pub freqs: Vec<f64>,
    /// frames x bins
    pub magnitude: Vec<Vec<f64>>,
    /// frames x mel bands, power scale
    pub mel: Vec<Vec<f64>>,
    /// frames x MFCC_COUNT
    pub mfcc: Array2<f64>,
}

impl Spectrogram {
    pub fn frame_count(&self) -> usize {
        self.magnitude.len()
    }

    /// Frames per second.
    pub fn frame_rate(&self) -> f64 {
        self.sample_rate as f64 / self.hop_size as f64
    }
}

pub fn compute(audio: &AudioData) -> Result<Spectrogram> {
    ensure!(!audio.samples.is_empty(), "audio contains no samples");
    ensure!(audio.sample_rate > 0, "audio has no sample rate");

    let mut samples: Vec<f64> = audio.samples.iter().map(|&s| s as f64).collect();
    if samples.len() < FFT_SIZE {
        samples.resize(FFT_SIZE, 0.0);
    }

    let stft = spectrum::rstft(&samples, FFT_SIZE, HOP_SIZE, WindowType::Hanning);
    let (magnitude, _) = spectrum::complex_to_polar_rstft(&stft);
    ensure!(!magnitude.is_empty(), "short-time transform produced no frames");
    let power = analysis::make_power_spectrogram(&magnitude);

    let freqs = spectrum::rfftfreq(FFT_SIZE, audio.sample_rate);
    let filterbank = MelFilterbank::new(
        MIN_FREQ,
        (audio.sample_rate as f64) / 2.0,
        MEL_BANDS,
        &freqs,
        true,
    );
    let mel = analysis::mel::make_mel_spectrogram(&power, &filterbank);
    let mfcc_rows = analysis::mel::mfcc_spectrogram(&mel, MFCC_COUNT, None);
    let mfcc = array_from_rows(&mfcc_rows).context("MFCC frames have uneven width")?;

    Ok(Spectrogram {
        sample_rate: audio.sample_rate,
        hop_size: HOP_SIZE,
        freqs,
        magnitude,
        mel,
        mfcc,
    })
}

pub(crate) fn array_from_rows(rows: &[Vec<f64>]) -> Result<Array2<f64>> {
    let cols = rows.first().map(|row| row.len()).unwrap_or(0);
    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    Ok(Array2::from_shape_vec((rows.len(), cols), flat)?)
}
