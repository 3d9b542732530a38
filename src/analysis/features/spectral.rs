// Spectral module - Frequency-domain feature extraction
//
// All features are computed from a magnitude spectrum (positive bins only).
//
// References:
// - Peeters, G. (2004). A large set of audio features for sound description
// - Lerch, A. (2012). An Introduction to Audio Content Analysis
// - Jiang, D. et al. (2002). Music type classification by spectral contrast

use crate::analysis::record::{CHROMA_LEN, CONTRAST_LEN};

/// Spectral rolloff threshold (85% of spectral energy)
const ROLLOFF_THRESHOLD: f32 = 0.85;

/// Upper edges (Hz) of the first five contrast bands; the last band runs to Nyquist
const CONTRAST_BAND_EDGES: [f32; CONTRAST_LEN - 1] = [200.0, 400.0, 800.0, 1600.0, 3200.0];

/// Fraction of a band's bins averaged for its peak and valley
const CONTRAST_QUANTILE: f32 = 0.2;

/// Chroma is accumulated over this frequency range (Hz)
const CHROMA_MIN_HZ: f32 = 32.7;
const CHROMA_MAX_HZ: f32 = 5000.0;

/// Spread, skewness and kurtosis of the spectrum around its centroid
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpectralShape {
    pub spread: f32,
    pub skewness: f32,
    pub kurtosis: f32,
    pub bandwidth: f32,
}

/// Spectral feature computation functions
pub struct SpectralFeatures {
    sample_rate: u32,
    fft_size: usize,
}

impl SpectralFeatures {
    /// Create a new spectral features processor
    ///
    /// # Arguments
    /// * `sample_rate` - Audio sample rate in Hz
    /// * `fft_size` - FFT window size
    pub fn new(sample_rate: u32, fft_size: usize) -> Self {
        Self {
            sample_rate,
            fft_size,
        }
    }

    fn bin_width(&self) -> f32 {
        self.sample_rate as f32 / self.fft_size as f32
    }

    /// Compute spectral centroid (weighted mean frequency)
    ///
    /// Formula: centroid = Σ(f_i × |X[i]|) / Σ|X[i]|
    ///
    /// # Returns
    /// Spectral centroid in Hz
    pub fn compute_centroid(&self, spectrum: &[f32]) -> f32 {
        let freq_bin_width = self.bin_width();

        let weighted_sum: f32 = spectrum
            .iter()
            .enumerate()
            .map(|(i, &mag)| i as f32 * freq_bin_width * mag)
            .sum();
        let magnitude_sum: f32 = spectrum.iter().sum();

        if magnitude_sum > 1e-10 {
            weighted_sum / magnitude_sum
        } else {
            0.0
        }
    }

    /// Spread, skewness, kurtosis and mean absolute deviation around `centroid`
    pub fn compute_shape(&self, spectrum: &[f32], centroid: f32) -> SpectralShape {
        let magnitude_sum: f64 = spectrum.iter().map(|&m| m as f64).sum();
        if magnitude_sum <= 1e-10 {
            return SpectralShape::default();
        }

        let bin_width = self.bin_width() as f64;
        let c = centroid as f64;
        let (mut m1, mut m2, mut m3, mut m4) = (0.0f64, 0.0f64, 0.0f64, 0.0f64);
        for (i, &mag) in spectrum.iter().enumerate() {
            let d = i as f64 * bin_width - c;
            let w = mag as f64;
            m1 += d.abs() * w;
            m2 += d * d * w;
            m3 += d * d * d * w;
            m4 += d * d * d * d * w;
        }
        let spread = (m2 / magnitude_sum).sqrt();
        let (skewness, kurtosis) = if spread > 1e-9 {
            (
                m3 / (magnitude_sum * spread.powi(3)),
                m4 / (magnitude_sum * spread.powi(4)),
            )
        } else {
            (0.0, 0.0)
        };

        SpectralShape {
            spread: spread as f32,
            skewness: skewness as f32,
            kurtosis: kurtosis as f32,
            bandwidth: (m1 / magnitude_sum) as f32,
        }
    }

    /// Compute spectral flatness (tonality measure)
    ///
    /// Formula: flatness = geometric_mean(|X[i]|) / arithmetic_mean(|X[i]|)
    ///
    /// # Returns
    /// Spectral flatness (0.0 = tonal to 1.0 = noise-like)
    pub fn compute_flatness(&self, spectrum: &[f32]) -> f32 {
        let non_zero: Vec<f32> = spectrum.iter().filter(|&&mag| mag > 1e-10).copied().collect();
        if non_zero.is_empty() {
            return 0.0;
        }

        // Geometric mean over the whole spectrum: zero bins drag it down
        let log_sum: f64 = non_zero.iter().map(|&mag| (mag as f64).ln()).sum::<f64>()
            + (spectrum.len() - non_zero.len()) as f64 * (1e-10f64).ln();
        let geometric_mean = (log_sum / spectrum.len() as f64).exp();
        let arithmetic_mean = spectrum.iter().map(|&m| m as f64).sum::<f64>() / spectrum.len() as f64;

        if arithmetic_mean > 1e-10 {
            ((geometric_mean / arithmetic_mean) as f32).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Compute spectral rolloff (85% energy threshold frequency)
    ///
    /// # Returns
    /// Rolloff frequency in Hz
    pub fn compute_rolloff(&self, spectrum: &[f32]) -> f32 {
        let total_energy: f32 = spectrum.iter().map(|&mag| mag * mag).sum();
        if total_energy < 1e-10 {
            return 0.0;
        }

        let threshold = ROLLOFF_THRESHOLD * total_energy;
        let freq_bin_width = self.bin_width();

        let mut cumulative_energy = 0.0;
        for (i, &mag) in spectrum.iter().enumerate() {
            cumulative_energy += mag * mag;
            if cumulative_energy >= threshold {
                return i as f32 * freq_bin_width;
            }
        }

        (spectrum.len().saturating_sub(1)) as f32 * freq_bin_width
    }

    /// Half-wave rectified spectral flux between consecutive frames
    pub fn compute_flux(&self, previous: Option<&[f32]>, spectrum: &[f32]) -> f32 {
        match previous {
            Some(prev) => spectrum
                .iter()
                .zip(prev.iter())
                .map(|(&cur, &old)| (cur - old).max(0.0))
                .sum(),
            None => 0.0,
        }
    }

    /// Octave-band spectral contrast in dB (peak vs. valley per band)
    pub fn compute_contrast(&self, spectrum: &[f32]) -> [f32; CONTRAST_LEN] {
        let bin_width = self.bin_width();
        let mut contrast = [0.0; CONTRAST_LEN];
        let mut band_start = 1usize;

        for (band, value) in contrast.iter_mut().enumerate() {
            let band_end = match CONTRAST_BAND_EDGES.get(band) {
                Some(&edge) => ((edge / bin_width).ceil() as usize).min(spectrum.len()),
                None => spectrum.len(),
            };
            if band_end <= band_start {
                continue;
            }

            let mut mags: Vec<f32> = spectrum[band_start..band_end].to_vec();
            mags.sort_by(|a, b| a.total_cmp(b));
            let n = ((mags.len() as f32 * CONTRAST_QUANTILE).round() as usize).max(1);
            let valley = mags[..n].iter().sum::<f32>() / n as f32;
            let peak = mags[mags.len() - n..].iter().sum::<f32>() / n as f32;
            *value = 20.0 * ((peak + 1e-10) / (valley + 1e-10)).log10();

            band_start = band_end;
        }

        contrast
    }

    /// 12-bin pitch-class profile (C = 0), normalized to a maximum of 1
    pub fn compute_chroma(&self, spectrum: &[f32]) -> [f32; CHROMA_LEN] {
        let bin_width = self.bin_width();
        let mut chroma = [0.0f32; CHROMA_LEN];

        for (i, &mag) in spectrum.iter().enumerate().skip(1) {
            let freq = i as f32 * bin_width;
            if !(CHROMA_MIN_HZ..=CHROMA_MAX_HZ).contains(&freq) {
                continue;
            }
            let midi = 69.0 + 12.0 * (freq / 440.0).log2();
            let pitch_class = (midi.round() as i64).rem_euclid(CHROMA_LEN as i64) as usize;
            chroma[pitch_class] += mag * mag;
        }

        let max = chroma.iter().copied().fold(0.0f32, f32::max);
        if max > 1e-12 {
            for c in chroma.iter_mut() {
                *c /= max;
            }
        }
        chroma
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_bin_spectrum(len: usize, bin: usize) -> Vec<f32> {
        let mut spectrum = vec![0.0; len];
        spectrum[bin] = 1.0;
        spectrum
    }

    #[test]
    fn test_centroid_of_single_bin() {
        let features = SpectralFeatures::new(44100, 1024);
        let spectrum = single_bin_spectrum(513, 100);
        let expected = 100.0 * 44100.0 / 1024.0;
        assert!((features.compute_centroid(&spectrum) - expected).abs() < 1e-2);
    }

    #[test]
    fn test_flatness_flat_vs_peaked() {
        let features = SpectralFeatures::new(44100, 1024);
        assert!((features.compute_flatness(&[1.0; 513]) - 1.0).abs() < 1e-4);
        assert!(features.compute_flatness(&single_bin_spectrum(513, 10)) < 0.01);
        assert_eq!(features.compute_flatness(&[0.0; 513]), 0.0);
    }

    #[test]
    fn test_flux_is_rectified() {
        let features = SpectralFeatures::new(44100, 1024);
        let prev = [1.0, 1.0, 1.0];
        let cur = [2.0, 0.0, 1.5];
        assert!((features.compute_flux(Some(&prev), &cur) - 1.5).abs() < 1e-6);
        assert_eq!(features.compute_flux(None, &cur), 0.0);
    }

    #[test]
    fn test_chroma_of_a440() {
        let features = SpectralFeatures::new(44100, 1024);
        // Bin closest to 440 Hz
        let bin = (440.0f32 / (44100.0 / 1024.0)).round() as usize;
        let chroma = features.compute_chroma(&single_bin_spectrum(513, bin));
        assert_eq!(chroma[9], 1.0, "A should dominate: {:?}", chroma);
    }

    #[test]
    fn test_contrast_flat_spectrum_is_zero() {
        let features = SpectralFeatures::new(44100, 1024);
        let contrast = features.compute_contrast(&[0.5; 513]);
        assert!(contrast.iter().all(|c| c.abs() < 1e-3), "{:?}", contrast);
    }

    #[test]
    fn test_shape_of_symmetric_spectrum() {
        let features = SpectralFeatures::new(44100, 1024);
        let mut spectrum = vec![0.0; 513];
        spectrum[99] = 1.0;
        spectrum[101] = 1.0;
        let centroid = features.compute_centroid(&spectrum);
        let shape = features.compute_shape(&spectrum, centroid);
        assert!(shape.skewness.abs() < 1e-3);
        assert!((shape.spread - 44100.0 / 1024.0).abs() < 1e-2);
    }
}
