// Perceptual module - Bark-band loudness and mel-cepstral coefficients
//
// Filterbanks are laid out once per (sample_rate, fft_size) pair at
// construction.
//
// References:
// - Zwicker, E. & Fastl, H. (1990). Psychoacoustics: Facts and Models
// - Davis, S. & Mermelstein, P. (1980). Comparison of parametric
//   representations for monosyllabic word recognition

use crate::analysis::record::MFCC_LEN;

const BARK_BANDS: usize = 24;
const MEL_FILTERS: usize = 26;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Loudness {
    /// Sum of specific loudness over all Bark bands
    pub total: f32,
    /// How evenly loudness is spread over bands (0 = one band dominates)
    pub spread: f32,
    /// Weighted centre of loudness, emphasizing high bands
    pub sharpness: f32,
}

fn hz_to_bark(freq: f32) -> f32 {
    13.0 * (0.00076 * freq).atan() + 3.5 * ((freq / 7500.0).powi(2)).atan()
}

fn hz_to_mel(freq: f32) -> f32 {
    2595.0 * (1.0 + freq / 700.0).log10()
}

fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10f32.powf(mel / 2595.0) - 1.0)
}

pub struct PerceptualFeatures {
    /// Bark band index per spectrum bin
    bark_band_of_bin: Vec<usize>,
    /// Triangular mel filters, one weight row per filter
    mel_filters: Vec<Vec<f32>>,
}

impl PerceptualFeatures {
    pub fn new(sample_rate: u32, fft_size: usize) -> Self {
        let bins = fft_size / 2 + 1;
        let bin_width = sample_rate as f32 / fft_size as f32;

        let bark_band_of_bin = (0..bins)
            .map(|i| (hz_to_bark(i as f32 * bin_width) as usize).min(BARK_BANDS - 1))
            .collect();

        let nyquist = sample_rate as f32 / 2.0;
        let mel_max = hz_to_mel(nyquist);
        let centers: Vec<f32> = (0..MEL_FILTERS + 2)
            .map(|i| mel_to_hz(mel_max * i as f32 / (MEL_FILTERS + 1) as f32))
            .collect();
        let mel_filters = (0..MEL_FILTERS)
            .map(|m| {
                let (lo, mid, hi) = (centers[m], centers[m + 1], centers[m + 2]);
                (0..bins)
                    .map(|i| {
                        let f = i as f32 * bin_width;
                        if f > lo && f <= mid && mid > lo {
                            (f - lo) / (mid - lo)
                        } else if f > mid && f < hi && hi > mid {
                            (hi - f) / (hi - mid)
                        } else {
                            0.0
                        }
                    })
                    .collect()
            })
            .collect();

        Self {
            bark_band_of_bin,
            mel_filters,
        }
    }

    /// Specific loudness per Bark band and its summaries
    pub fn compute_loudness(&self, spectrum: &[f32]) -> Loudness {
        let mut band_energy = [0.0f32; BARK_BANDS];
        for (&mag, &band) in spectrum.iter().zip(self.bark_band_of_bin.iter()) {
            band_energy[band] += mag * mag;
        }
        let specific: Vec<f32> = band_energy.iter().map(|e| e.powf(0.23)).collect();
        let total: f32 = specific.iter().sum();
        if total <= 1e-10 {
            return Loudness::default();
        }

        let max = specific.iter().copied().fold(0.0f32, f32::max);
        let spread = ((total - max) / total).powi(2);

        let weighted: f32 = specific
            .iter()
            .enumerate()
            .map(|(i, &n)| {
                let z = (i + 1) as f32;
                let g = if z < 15.0 { 1.0 } else { 0.066 * (0.171 * z).exp() };
                z * g * n
            })
            .sum();
        let sharpness = 0.11 * weighted / total;

        Loudness {
            total,
            spread,
            sharpness,
        }
    }

    /// First `MFCC_LEN` DCT-II coefficients of the log mel energies
    pub fn compute_mfcc(&self, spectrum: &[f32]) -> [f32; MFCC_LEN] {
        let log_energies: Vec<f32> = self
            .mel_filters
            .iter()
            .map(|filter| {
                let energy: f32 = filter
                    .iter()
                    .zip(spectrum.iter())
                    .map(|(&w, &mag)| w * mag * mag)
                    .sum();
                (energy + 1e-10).ln()
            })
            .collect();

        let n = log_energies.len() as f32;
        let mut mfcc = [0.0; MFCC_LEN];
        for (k, coeff) in mfcc.iter_mut().enumerate() {
            *coeff = log_energies
                .iter()
                .enumerate()
                .map(|(i, &e)| e * (std::f32::consts::PI * k as f32 * (i as f32 + 0.5) / n).cos())
                .sum();
        }
        mfcc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_has_no_loudness() {
        let perceptual = PerceptualFeatures::new(44100, 1024);
        assert_eq!(perceptual.compute_loudness(&[0.0; 513]), Loudness::default());
    }

    #[test]
    fn test_bright_spectrum_is_sharper() {
        let perceptual = PerceptualFeatures::new(44100, 1024);
        let mut dark = vec![0.0; 513];
        dark[5] = 1.0;
        let mut bright = vec![0.0; 513];
        bright[300] = 1.0;
        let dark = perceptual.compute_loudness(&dark);
        let bright = perceptual.compute_loudness(&bright);
        assert!(bright.sharpness > dark.sharpness);
        // A single loud band leaves no spread
        assert!(dark.spread < 1e-6);
    }

    #[test]
    fn test_mfcc_is_finite() {
        let perceptual = PerceptualFeatures::new(44100, 1024);
        let spectrum: Vec<f32> = (0..513).map(|i| 1.0 / (1.0 + i as f32)).collect();
        let mfcc = perceptual.compute_mfcc(&spectrum);
        assert!(mfcc.iter().all(|c| c.is_finite()));
        // Silence gives a constant log floor: all energy lands in c0
        let silent = perceptual.compute_mfcc(&[0.0; 513]);
        assert!(silent[1..].iter().all(|c| c.abs() < 1e-2), "{:?}", silent);
    }
}
