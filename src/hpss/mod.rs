// HPSS module - harmonic/percussive source separation
//
// Median-filtering HPSS (Fitzgerald 2010) with iterative soft-mask refinement:
//
//   peak-normalize → STFT → for each iteration:
//       H' = median_time(H), P' = median_freq(P)
//       M  = H'^p / (H'^p + P'^p)
//       H  = |X|·M, P = |X|·(1 − M)
//   → ISTFT(H, ∠X), ISTFT(P, ∠X) → rescale by peak
//
// `HpssEngine` holds only immutable configuration and planned FFTs, so one
// engine can serve many threads. Per-call state lives in a `Workspace` arena
// whose buffers are reused across iterations.

mod median;
mod stft;

pub use stft::{Spectrogram, Stft};

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::config::HpssConfig;
use crate::error::{log_hpss_error, ConfigError, HpssError};

use median::{median_filter_freq, median_filter_time};

/// Longest buffer accepted for separation (two minutes at 48 kHz)
pub const MAX_INPUT_SAMPLES: usize = 48_000 * 120;

const MASK_EPSILON: f32 = 1e-10;
const ENERGY_EPSILON: f64 = 1e-12;

/// Ratios and quality reported when separation fails
pub const FALLBACK_HARMONIC_RATIO: f32 = 0.8;
pub const FALLBACK_PERCUSSIVE_RATIO: f32 = 0.2;
pub const FALLBACK_QUALITY: f32 = 0.5;

/// Separated signals and energy metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HpssResult {
    pub harmonic: Vec<f32>,
    pub percussive: Vec<f32>,
    pub residual: Vec<f32>,
    /// Harmonic energy / original energy
    pub harmonic_ratio: f32,
    /// Percussive energy / original energy
    pub percussive_ratio: f32,
    /// Blend of energy preservation and component decorrelation, in [0, 1]
    pub separation_quality: f32,
    /// True when the separation failed and this is the substitute result
    pub is_fallback: bool,
}

/// The scalar part of an `HpssResult`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HpssSummary {
    pub harmonic_ratio: f32,
    pub percussive_ratio: f32,
    pub separation_quality: f32,
    pub is_fallback: bool,
}

impl HpssResult {
    /// Substitute result: harmonic = input, percussive and residual silent
    pub fn fallback(input: &[f32]) -> Self {
        Self {
            harmonic: input.to_vec(),
            percussive: vec![0.0; input.len()],
            residual: vec![0.0; input.len()],
            harmonic_ratio: FALLBACK_HARMONIC_RATIO,
            percussive_ratio: FALLBACK_PERCUSSIVE_RATIO,
            separation_quality: FALLBACK_QUALITY,
            is_fallback: true,
        }
    }

    fn silent(len: usize) -> Self {
        Self {
            harmonic: vec![0.0; len],
            percussive: vec![0.0; len],
            residual: vec![0.0; len],
            harmonic_ratio: 0.0,
            percussive_ratio: 0.0,
            separation_quality: 0.0,
            is_fallback: false,
        }
    }

    pub fn summary(&self) -> HpssSummary {
        HpssSummary {
            harmonic_ratio: self.harmonic_ratio,
            percussive_ratio: self.percussive_ratio,
            separation_quality: self.separation_quality,
            is_fallback: self.is_fallback,
        }
    }

    pub fn len(&self) -> usize {
        self.harmonic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.harmonic.is_empty()
    }
}

/// Same-shaped magnitude matrices reused across iterations
struct Workspace {
    harmonic: Vec<f32>,
    percussive: Vec<f32>,
    filtered_harmonic: Vec<f32>,
    filtered_percussive: Vec<f32>,
    scratch: Vec<f32>,
}

impl Workspace {
    fn new(magnitude: &[f32], kernel_size: usize) -> Self {
        Self {
            harmonic: magnitude.to_vec(),
            percussive: magnitude.to_vec(),
            filtered_harmonic: vec![0.0; magnitude.len()],
            filtered_percussive: vec![0.0; magnitude.len()],
            scratch: Vec::with_capacity(kernel_size),
        }
    }
}

pub struct HpssEngine {
    config: HpssConfig,
    stft: Stft,
}

impl HpssEngine {
    /// Create an engine after validating the STFT geometry
    ///
    /// # Errors
    /// `ConfigError::InvalidHpssGeometry` when window, hop or kernel are unusable
    pub fn new(config: HpssConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let stft = Stft::new(config.window_size, config.hop_size);
        Ok(Self { config, stft })
    }

    pub fn config(&self) -> &HpssConfig {
        &self.config
    }

    /// Length of every output signal for an input of `input_len` samples
    pub fn output_len(&self, input_len: usize) -> usize {
        self.stft.padded_len(input_len)
    }

    /// Separate `input`, substituting the fallback result on any failure
    pub fn separate(&self, input: &[f32]) -> HpssResult {
        let never = AtomicBool::new(false);
        match self.separate_cancellable(input, &never) {
            Ok(result) => result,
            Err(err) => {
                log_hpss_error(&err, "HpssEngine::separate");
                HpssResult::fallback(input)
            }
        }
    }

    /// Separate `input`, checking `cancel` before every iteration
    ///
    /// # Arguments
    /// * `input` - Mono waveform
    /// * `cancel` - Set by another thread to abandon the job
    ///
    /// # Returns
    /// The separation, or the reason it could not be produced
    pub fn separate_cancellable(
        &self,
        input: &[f32],
        cancel: &AtomicBool,
    ) -> Result<HpssResult, HpssError> {
        if input.is_empty() {
            return Err(HpssError::EmptyInput);
        }
        if input.len() > MAX_INPUT_SAMPLES {
            return Err(HpssError::InvalidGeometry {
                reason: format!(
                    "buffer of {} samples exceeds the {} sample limit",
                    input.len(),
                    MAX_INPUT_SAMPLES
                ),
            });
        }
        if let Some(index) = input.iter().position(|s| !s.is_finite()) {
            return Err(HpssError::NonFiniteInput { index });
        }

        let output_len = self.output_len(input.len());
        let peak = input.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
        if peak <= f32::MIN_POSITIVE {
            log::debug!("[HpssEngine] Silent input ({} samples)", input.len());
            return Ok(HpssResult::silent(output_len));
        }

        let started = Instant::now();
        let normalized: Vec<f32> = input.iter().map(|s| s / peak).collect();
        let spectrogram = self.stft.forward(&normalized);
        let (bins, frames) = (spectrogram.bins, spectrogram.frames);

        let mut ws = Workspace::new(&spectrogram.magnitude, self.config.kernel_size);
        for iteration in 0..self.config.iterations {
            if cancel.load(Ordering::SeqCst) {
                return Err(HpssError::Cancelled {
                    completed_iterations: iteration,
                });
            }
            self.refine(&spectrogram.magnitude, &mut ws, bins, frames);
        }

        let mut harmonic = self
            .stft
            .inverse(&ws.harmonic, &spectrogram.phase, frames);
        let mut percussive = self
            .stft
            .inverse(&ws.percussive, &spectrogram.phase, frames);
        for s in harmonic.iter_mut().chain(percussive.iter_mut()) {
            *s *= peak;
        }

        let residual: Vec<f32> = (0..output_len)
            .map(|i| input.get(i).copied().unwrap_or(0.0) - harmonic[i] - percussive[i])
            .collect();

        let original_energy = energy(&spectrogram.magnitude);
        let harmonic_energy = energy(&ws.harmonic);
        let percussive_energy = energy(&ws.percussive);
        let (harmonic_ratio, percussive_ratio, preservation) = if original_energy > ENERGY_EPSILON
        {
            (
                harmonic_energy / original_energy,
                percussive_energy / original_energy,
                (harmonic_energy + percussive_energy) / original_energy,
            )
        } else {
            (0.0, 0.0, 0.0)
        };

        let correlation = zero_lag_correlation(&harmonic, &percussive);
        let quality = 0.6 * preservation.clamp(0.0, 1.0) + 0.4 * (1.0 - correlation.abs());

        let result = HpssResult {
            harmonic,
            percussive,
            residual,
            harmonic_ratio: sanitize_ratio(harmonic_ratio),
            percussive_ratio: sanitize_ratio(percussive_ratio),
            separation_quality: sanitize_ratio(quality),
            is_fallback: false,
        };

        log::debug!(
            "[HpssEngine] Separated {} samples ({} frames x {} bins) in {:?}: H={:.3} P={:.3} Q={:.3}",
            input.len(),
            frames,
            bins,
            started.elapsed(),
            result.harmonic_ratio,
            result.percussive_ratio,
            result.separation_quality
        );
        Ok(result)
    }

    /// One filter-and-mask pass over the workspace
    fn refine(&self, original: &[f32], ws: &mut Workspace, bins: usize, frames: usize) {
        let kernel = self.config.kernel_size;
        median_filter_time(
            &ws.harmonic,
            &mut ws.filtered_harmonic,
            bins,
            frames,
            kernel,
            &mut ws.scratch,
        );
        median_filter_freq(
            &ws.percussive,
            &mut ws.filtered_percussive,
            bins,
            frames,
            kernel,
            &mut ws.scratch,
        );

        let power = self.config.power;
        for i in 0..original.len() {
            let h = ws.filtered_harmonic[i].powf(power);
            let p = ws.filtered_percussive[i].powf(power);
            let denom = h + p;
            let mask = if denom > MASK_EPSILON && denom.is_finite() {
                h / denom
            } else {
                0.5
            };
            ws.harmonic[i] = original[i] * mask;
            ws.percussive[i] = original[i] * (1.0 - mask);
        }
    }
}

fn energy(values: &[f32]) -> f64 {
    values.iter().map(|&v| v as f64 * v as f64).sum()
}

/// Normalized zero-lag cross-correlation; 0 when either signal is silent
fn zero_lag_correlation(a: &[f32], b: &[f32]) -> f64 {
    let (mut ab, mut aa, mut bb) = (0.0f64, 0.0f64, 0.0f64);
    for (&x, &y) in a.iter().zip(b.iter()) {
        ab += x as f64 * y as f64;
        aa += x as f64 * x as f64;
        bb += y as f64 * y as f64;
    }
    let denom = (aa * bb).sqrt();
    if denom > ENERGY_EPSILON {
        ab / denom
    } else {
        0.0
    }
}

fn sanitize_ratio(value: f64) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0) as f32
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests;
