// STFT / ISTFT with a periodic Hann window
//
// Spectrogram layout is frame-major: element (frame, bin) lives at
// `frame * bins + bin`. The inverse uses weighted overlap-add normalized by
// the summed squared window, so an unmodified spectrogram reconstructs the
// (zero-padded) input wherever the window sum is non-negligible.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use crate::analysis::features::hann_window;

/// Window-power sums below this produce silence instead of division blow-up
const WOLA_EPSILON: f32 = 1e-8;

#[derive(Debug, Clone, PartialEq)]
pub struct Spectrogram {
    pub bins: usize,
    pub frames: usize,
    pub magnitude: Vec<f32>,
    pub phase: Vec<f32>,
}

pub struct Stft {
    window_size: usize,
    hop_size: usize,
    bins: usize,
    window: Vec<f32>,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
}

impl Stft {
    /// Plan forward and inverse transforms for a validated geometry
    pub fn new(window_size: usize, hop_size: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            window_size,
            hop_size,
            bins: window_size / 2 + 1,
            window: hann_window(window_size),
            forward: planner.plan_fft_forward(window_size),
            inverse: planner.plan_fft_inverse(window_size),
        }
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    /// Frames needed to cover `len` samples: 1 + ceil(max(0, len - window) / hop)
    pub fn frame_count(&self, len: usize) -> usize {
        let excess = len.saturating_sub(self.window_size);
        1 + (excess + self.hop_size - 1) / self.hop_size
    }

    /// Length of the zero-padded signal the frames cover
    pub fn padded_len(&self, len: usize) -> usize {
        (self.frame_count(len) - 1) * self.hop_size + self.window_size
    }

    pub fn forward(&self, signal: &[f32]) -> Spectrogram {
        let frames = self.frame_count(signal.len());
        let mut magnitude = Vec::with_capacity(frames * self.bins);
        let mut phase = Vec::with_capacity(frames * self.bins);
        let mut buffer = vec![Complex::new(0.0f32, 0.0); self.window_size];

        for frame in 0..frames {
            let start = frame * self.hop_size;
            for (n, slot) in buffer.iter_mut().enumerate() {
                let sample = signal.get(start + n).copied().unwrap_or(0.0);
                *slot = Complex::new(sample * self.window[n], 0.0);
            }
            self.forward.process(&mut buffer);
            for c in &buffer[..self.bins] {
                magnitude.push(c.norm());
                phase.push(c.arg());
            }
        }

        Spectrogram {
            bins: self.bins,
            frames,
            magnitude,
            phase,
        }
    }

    /// Overlap-add resynthesis of a magnitude spectrogram with the given phase
    ///
    /// # Returns
    /// Signal of length `(frames - 1) * hop + window`
    pub fn inverse(&self, magnitude: &[f32], phase: &[f32], frames: usize) -> Vec<f32> {
        let len = (frames.max(1) - 1) * self.hop_size + self.window_size;
        let mut output = vec![0.0f32; len];
        let mut window_power = vec![0.0f32; len];
        let mut buffer = vec![Complex::new(0.0f32, 0.0); self.window_size];
        let scale = 1.0 / self.window_size as f32;

        for frame in 0..frames {
            let offset = frame * self.bins;
            for k in 0..self.bins {
                buffer[k] = Complex::from_polar(magnitude[offset + k], phase[offset + k]);
            }
            // Hermitian mirror for a real-valued output
            for k in self.bins..self.window_size {
                buffer[k] = buffer[self.window_size - k].conj();
            }
            self.inverse.process(&mut buffer);

            let start = frame * self.hop_size;
            for (n, c) in buffer.iter().enumerate() {
                let w = self.window[n];
                output[start + n] += c.re * scale * w;
                window_power[start + n] += w * w;
            }
        }

        for (sample, &power) in output.iter_mut().zip(window_power.iter()) {
            *sample = if power > WOLA_EPSILON {
                *sample / power
            } else {
                0.0
            };
        }
        output
    }
}
