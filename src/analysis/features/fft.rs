// FFT module - windowed magnitude spectrum computation
//
// The forward plan is created once at construction; the processor is then
// immutable and can be shared across threads.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// Analysis frame length (23.2 ms at 44.1 kHz)
pub const FFT_SIZE: usize = 1024;

/// Periodic Hann window of length `size`
pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - ((2.0 * std::f32::consts::PI * i as f32) / size as f32).cos()))
        .collect()
}

/// FFT processor that computes magnitude spectra from audio frames
pub struct FftProcessor {
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    /// Hann window (pre-computed)
    window: Vec<f32>,
    /// Maps a windowed full-scale sine to a peak magnitude of ~1.0
    scale: f32,
}

impl FftProcessor {
    /// Create a new FFT processor
    ///
    /// # Arguments
    /// * `fft_size` - FFT frame size
    pub fn new(fft_size: usize) -> Self {
        let window = hann_window(fft_size);
        let window_sum: f32 = window.iter().sum();
        let scale = if window_sum > 0.0 { 2.0 / window_sum } else { 1.0 };
        let fft = FftPlanner::new().plan_fft_forward(fft_size);

        Self {
            fft,
            fft_size,
            window,
            scale,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Compute magnitude spectrum using FFT
    ///
    /// Applies the Hann window, zero-pads short input, and returns the
    /// positive-frequency magnitudes.
    ///
    /// # Arguments
    /// * `audio` - Audio frame (samples beyond fft_size are ignored)
    ///
    /// # Returns
    /// Magnitude spectrum (size = fft_size / 2 + 1)
    pub fn compute_magnitude_spectrum(&self, audio: &[f32]) -> Vec<f32> {
        let mut buffer: Vec<Complex<f32>> = audio
            .iter()
            .zip(self.window.iter())
            .map(|(&sample, &w)| Complex::new(sample * w, 0.0))
            .collect();
        buffer.resize(self.fft_size, Complex::new(0.0, 0.0));

        self.fft.process(&mut buffer);

        buffer[..self.fft_size / 2 + 1]
            .iter()
            .map(|c| c.norm() * self.scale)
            .collect()
    }
}
