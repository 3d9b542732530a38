// FrameFeatureExtractor - turns raw audio into FeatureRecords
//
// This is the in-crate feature source for the decision engine: it splits an
// audio stream into fixed frames and measures every scalar and vector
// feature a FeatureRecord carries, except the ratios that come from HPSS or
// external models (voice, percussive, harmonic).
//
// Module organization:
// - fft: windowed FFT magnitude spectrum
// - spectral: centroid, shape, flatness, rolloff, flux, contrast, chroma
// - temporal: ZCR, RMS
// - perceptual: Bark loudness, MFCC
// - mod.rs: Coordinator (FrameFeatureExtractor)
//
// References:
// - Peeters, G. (2004). A large set of audio features for sound description
// - Lerch, A. (2012). An Introduction to Audio Content Analysis

mod fft;
mod perceptual;
mod spectral;
mod temporal;

pub use fft::{hann_window, FftProcessor, FFT_SIZE};
pub use perceptual::{Loudness, PerceptualFeatures};
pub use spectral::{SpectralFeatures, SpectralShape};
pub use temporal::{compute_rms, compute_zcr};

use crate::analysis::record::{FeatureRecord, ScalarFeature};

/// FrameFeatureExtractor coordinates the per-frame DSP pipeline
///
/// Frames are non-overlapping and `FFT_SIZE` samples long, which gives the
/// 23.2 ms frame period the aggregator assumes at 44.1 kHz. Samples may be
/// pushed in chunks of any size; partial frames are buffered.
pub struct FrameFeatureExtractor {
    sample_rate: u32,
    fft_processor: FftProcessor,
    spectral_features: SpectralFeatures,
    perceptual_features: PerceptualFeatures,
    previous_spectrum: Option<Vec<f32>>,
    pending: Vec<f32>,
    samples_consumed: u64,
}

impl FrameFeatureExtractor {
    /// Create a new extractor
    ///
    /// # Arguments
    /// * `sample_rate` - Audio sample rate in Hz (e.g., 44100)
    pub fn new(sample_rate: u32) -> Self {
        let sample_rate = sample_rate.max(1);
        Self {
            sample_rate,
            fft_processor: FftProcessor::new(FFT_SIZE),
            spectral_features: SpectralFeatures::new(sample_rate, FFT_SIZE),
            perceptual_features: PerceptualFeatures::new(sample_rate, FFT_SIZE),
            previous_spectrum: None,
            pending: Vec::with_capacity(FFT_SIZE),
            samples_consumed: 0,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frame_size(&self) -> usize {
        FFT_SIZE
    }

    /// Duration of one frame in milliseconds
    pub fn frame_period_ms(&self) -> f64 {
        FFT_SIZE as f64 * 1000.0 / self.sample_rate as f64
    }

    /// Forget buffered audio and the flux reference frame
    pub fn reset(&mut self) {
        self.previous_spectrum = None;
        self.pending.clear();
        self.samples_consumed = 0;
    }

    /// Measure one frame
    ///
    /// # Arguments
    /// * `frame` - Audio frame (zero-padded if shorter than `FFT_SIZE`)
    /// * `timestamp_ms` - Timestamp recorded on the resulting record
    pub fn extract(&mut self, frame: &[f32], timestamp_ms: f64) -> FeatureRecord {
        let frame = &frame[..frame.len().min(FFT_SIZE)];
        let spectrum = self.fft_processor.compute_magnitude_spectrum(frame);

        let centroid = self.spectral_features.compute_centroid(&spectrum);
        let shape = self.spectral_features.compute_shape(&spectrum, centroid);
        let flux = self
            .spectral_features
            .compute_flux(self.previous_spectrum.as_deref(), &spectrum);
        let loudness = self.perceptual_features.compute_loudness(&spectrum);

        let record = FeatureRecord::new(timestamp_ms)
            .with_scalar(ScalarFeature::Rms, compute_rms(frame))
            .with_scalar(ScalarFeature::ZeroCrossingRate, compute_zcr(frame))
            .with_scalar(ScalarFeature::SpectralCentroid, centroid)
            .with_scalar(
                ScalarFeature::SpectralFlatness,
                self.spectral_features.compute_flatness(&spectrum),
            )
            .with_scalar(ScalarFeature::SpectralFlux, flux)
            .with_scalar(
                ScalarFeature::SpectralRolloff,
                self.spectral_features.compute_rolloff(&spectrum),
            )
            .with_scalar(ScalarFeature::SpectralBandwidth, shape.bandwidth)
            .with_scalar(ScalarFeature::SpectralSpread, shape.spread)
            .with_scalar(ScalarFeature::SpectralSkewness, shape.skewness)
            .with_scalar(ScalarFeature::SpectralKurtosis, shape.kurtosis)
            .with_scalar(ScalarFeature::Loudness, loudness.total)
            .with_scalar(ScalarFeature::PerceptualSpread, loudness.spread)
            .with_scalar(ScalarFeature::PerceptualSharpness, loudness.sharpness)
            .with_mfcc(&self.perceptual_features.compute_mfcc(&spectrum))
            .with_chroma(&self.spectral_features.compute_chroma(&spectrum))
            .with_spectral_contrast(&self.spectral_features.compute_contrast(&spectrum));

        self.previous_spectrum = Some(spectrum);
        record
    }

    /// Push a chunk of samples and extract every frame it completes
    ///
    /// Timestamps are derived from the running sample count, so successive
    /// calls produce a continuous, non-decreasing timeline.
    pub fn process_samples(&mut self, samples: &[f32]) -> Vec<FeatureRecord> {
        self.process_samples_with(samples, |_, _| {})
    }

    /// Like `process_samples`, calling `visit` with each completed frame and
    /// its record so callers can enrich records from the raw audio
    pub fn process_samples_with<F>(&mut self, samples: &[f32], mut visit: F) -> Vec<FeatureRecord>
    where
        F: FnMut(&[f32], &mut FeatureRecord),
    {
        self.pending.extend_from_slice(samples);
        let mut records = Vec::with_capacity(self.pending.len() / FFT_SIZE);

        let mut offset = 0;
        while self.pending.len() - offset >= FFT_SIZE {
            let timestamp_ms = self.samples_consumed as f64 * 1000.0 / self.sample_rate as f64;
            let frame: Vec<f32> = self.pending[offset..offset + FFT_SIZE].to_vec();
            let mut record = self.extract(&frame, timestamp_ms);
            visit(&frame, &mut record);
            records.push(record);
            offset += FFT_SIZE;
            self.samples_consumed += FFT_SIZE as u64;
        }
        self.pending.drain(..offset);

        records
    }
}
