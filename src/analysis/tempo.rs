// Tempo estimation from a spectral-flux series
//
// Peaks are local maxima above mean + k * stddev of the series. The mean
// spacing between consecutive peaks, converted through the assumed frame
// period, gives the BPM.

use serde::{Deserialize, Serialize};

use super::stats::{finite_or_zero, Stat};
use crate::config::AggregationConfig;

/// Where a window's tempo came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TempoSource {
    /// Flux peak spacing
    SpectralFlux,
    /// Mean of per-record tempo-model estimates
    Model,
    /// Fewer than two flux peaks; the configured default was used
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoEstimate {
    pub bpm: f32,
    pub beat_strength: f32,
    pub peak_count: usize,
    pub source: TempoSource,
}

/// Indices of flux peaks
///
/// A peak at `i` satisfies `flux[i] > mean + factor * std`,
/// `flux[i] > flux[i - 1]` and `flux[i] >= flux[i + 1]`. The first and last
/// samples never qualify.
pub fn pick_flux_peaks(flux: &[f32], threshold_factor: f32) -> Vec<usize> {
    if flux.len() < 3 {
        return Vec::new();
    }
    let stat = Stat::from_values(flux.iter().copied());
    let threshold = stat.mean + threshold_factor * stat.std_dev();

    (1..flux.len() - 1)
        .filter(|&i| {
            let v = flux[i];
            v > threshold && v > flux[i - 1] && v >= flux[i + 1]
        })
        .collect()
}

/// variance / mean of the flux series, clamped to [0, 1]
pub fn beat_strength(flux: &[f32]) -> f32 {
    let stat = Stat::from_values(flux.iter().copied());
    if stat.count == 0 {
        return 0.0;
    }
    finite_or_zero(stat.variance as f64 / (stat.mean as f64 + 1e-6)).clamp(0.0, 1.0)
}

/// Estimate tempo for a flux series
///
/// # Arguments
/// * `flux` - Spectral flux values in frame order
/// * `config` - Frame period, clamp range, default tempo and peak threshold
pub fn estimate_tempo(flux: &[f32], config: &AggregationConfig) -> TempoEstimate {
    let strength = beat_strength(flux);
    let peaks = pick_flux_peaks(flux, config.peak_threshold_factor);

    if peaks.len() < 2 {
        return TempoEstimate {
            bpm: config.default_bpm,
            beat_strength: strength,
            peak_count: peaks.len(),
            source: TempoSource::Default,
        };
    }

    // Mean of consecutive differences telescopes to (last - first) / (n - 1)
    let span = (peaks[peaks.len() - 1] - peaks[0]) as f64;
    let mean_interval_frames = span / (peaks.len() - 1) as f64;
    let interval_ms = mean_interval_frames * config.frame_period_ms;
    let bpm = finite_or_zero(60_000.0 / interval_ms);

    TempoEstimate {
        bpm: bpm.clamp(config.min_bpm, config.max_bpm),
        beat_strength: strength,
        peak_count: peaks.len(),
        source: TempoSource::SpectralFlux,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pulse_train(len: usize, period: usize, offset: usize) -> Vec<f32> {
        (0..len)
            .map(|i| if i % period == offset { 1.0 } else { 0.1 })
            .collect()
    }

    #[test]
    fn test_peaks_on_pulse_train() {
        let flux = pulse_train(60, 20, 5);
        assert_eq!(pick_flux_peaks(&flux, 0.5), vec![5, 25, 45]);
    }

    #[test]
    fn test_tempo_from_regular_peaks() {
        let config = AggregationConfig::default();
        let flux = pulse_train(100, 20, 10);
        let estimate = estimate_tempo(&flux, &config);
        assert_eq!(estimate.source, TempoSource::SpectralFlux);
        // 20 frames * 23.2 ms = 464 ms per beat
        assert!((estimate.bpm - 129.31).abs() < 0.05, "bpm = {}", estimate.bpm);
    }

    #[test]
    fn test_tempo_is_clamped() {
        let config = AggregationConfig::default();
        // 4 frames per beat would be ~646 BPM
        let flux = pulse_train(40, 4, 2);
        let estimate = estimate_tempo(&flux, &config);
        assert_eq!(estimate.bpm, config.max_bpm);
    }

    #[test]
    fn test_flat_series_uses_default() {
        let config = AggregationConfig::default();
        let estimate = estimate_tempo(&[0.0; 50], &config);
        assert_eq!(estimate.bpm, 120.0);
        assert_eq!(estimate.source, TempoSource::Default);
        assert_eq!(estimate.beat_strength, 0.0);
    }

    #[test]
    fn test_beat_strength_bounded() {
        let flux = pulse_train(100, 10, 3).iter().map(|v| v * 50.0).collect::<Vec<_>>();
        let strength = beat_strength(&flux);
        assert!((0.0..=1.0).contains(&strength));
    }
}
