//! Deterministic fixtures for tests, the CLI `demo` command, and WAV I/O.
//!
//! Two kinds of fixture live here:
//! - PCM signals (sine + impulse train, seeded noise) for exercising HPSS
//!   and the frame feature extractor;
//! - synthetic `FeatureRecord` streams shaped like a given musical profile,
//!   for driving the decision engine without any audio at all.
//!
//! Jitter is generated from fixed sinusoids so every run is identical.

use std::f32::consts::PI;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::analysis::{FeatureRecord, ScalarFeature};

/// Frame period of synthetic record streams (1024 samples at 44.1 kHz)
pub const SYNTHETIC_FRAME_MS: f64 = 23.2;

/// Sine tone plus a periodic single-sample click
///
/// # Arguments
/// * `sample_rate` - Output sample rate in Hz
/// * `duration_ms` - Signal length
/// * `frequency_hz` - Sine frequency
/// * `click_interval_ms` - Spacing between clicks
pub fn sine_with_clicks(
    sample_rate: u32,
    duration_ms: u32,
    frequency_hz: f32,
    click_interval_ms: u32,
) -> Vec<f32> {
    let len = duration_frames(duration_ms, sample_rate);
    let interval = duration_frames(click_interval_ms, sample_rate).max(1);
    (0..len)
        .map(|i| {
            let tone = 0.4 * (2.0 * PI * frequency_hz * i as f32 / sample_rate as f32).sin();
            let click = if i % interval == interval / 2 { 0.6 } else { 0.0 };
            tone + click
        })
        .collect()
}

/// Uniform white noise from a seeded generator
pub fn white_noise(len: usize, amplitude: f32, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let amplitude = amplitude.abs().max(f32::EPSILON);
    (0..len)
        .map(|_| rng.gen_range(-amplitude..amplitude))
        .collect()
}

fn duration_frames(duration_ms: u32, sample_rate: u32) -> usize {
    (duration_ms as u64 * sample_rate as u64 / 1000) as usize
}

/// Musical profiles available as synthetic record streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyntheticProfile {
    Silence,
    Techno,
    Ambient,
}

impl SyntheticProfile {
    pub const ALL: [SyntheticProfile; 3] = [
        SyntheticProfile::Silence,
        SyntheticProfile::Techno,
        SyntheticProfile::Ambient,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SyntheticProfile::Silence => "silence",
            SyntheticProfile::Techno => "techno",
            SyntheticProfile::Ambient => "ambient",
        }
    }

    /// Records covering `duration_ms` at the synthetic frame period
    pub fn records(self, duration_ms: f64) -> Vec<FeatureRecord> {
        let count = (duration_ms / SYNTHETIC_FRAME_MS).floor().max(0.0) as usize;
        (0..count).map(|i| self.record(i)).collect()
    }

    /// The `index`-th record of this profile's stream
    pub fn record(self, index: usize) -> FeatureRecord {
        let timestamp_ms = index as f64 * SYNTHETIC_FRAME_MS;
        let phase = index as f32;
        match self {
            SyntheticProfile::Silence => FeatureRecord::new(timestamp_ms)
                .with_scalar(ScalarFeature::Rms, 0.0)
                .with_scalar(ScalarFeature::SpectralCentroid, 0.0)
                .with_scalar(ScalarFeature::ZeroCrossingRate, 0.0)
                .with_scalar(ScalarFeature::SpectralFlatness, 0.0)
                .with_scalar(ScalarFeature::SpectralFlux, 0.0),
            SyntheticProfile::Techno => {
                let flux = if index % 20 == 10 { 1.0 } else { 0.1 };
                let mut chroma = [0.2f32; 12];
                chroma[0] = 0.9;
                chroma[7] = 0.6 + 0.01 * (phase * 0.9).cos();
                let mut contrast = [12.0f32; 6];
                contrast[0] = 20.0 + 0.5 * (phase * 0.4).sin();
                FeatureRecord::new(timestamp_ms)
                    .with_scalar(ScalarFeature::Rms, 0.8 + 0.02 * (phase * 1.3).sin())
                    .with_scalar(
                        ScalarFeature::SpectralCentroid,
                        2500.0 + 60.0 * (phase * 0.7).sin(),
                    )
                    .with_scalar(ScalarFeature::ZeroCrossingRate, 0.08)
                    .with_scalar(ScalarFeature::SpectralFlatness, 0.2)
                    .with_scalar(ScalarFeature::SpectralFlux, flux)
                    .with_scalar(ScalarFeature::VoiceProbability, 0.1)
                    .with_scalar(ScalarFeature::PercussiveRatio, 0.7)
                    .with_scalar(ScalarFeature::HarmonicRatio, 0.25)
                    .with_chroma(&chroma)
                    .with_spectral_contrast(&contrast)
            }
            SyntheticProfile::Ambient => {
                let flux = if index % 28 == 14 { 0.6 } else { 0.1 };
                let mut chroma = [0.15f32; 12];
                chroma[2] = 0.8;
                chroma[9] = 0.7 + 0.01 * (phase * 0.5).sin();
                FeatureRecord::new(timestamp_ms)
                    .with_scalar(ScalarFeature::Rms, 0.15 + 0.005 * (phase * 0.3).sin())
                    .with_scalar(
                        ScalarFeature::SpectralCentroid,
                        900.0 + 25.0 * (phase * 0.2).sin(),
                    )
                    .with_scalar(ScalarFeature::ZeroCrossingRate, 0.01)
                    .with_scalar(ScalarFeature::SpectralFlatness, 0.1)
                    .with_scalar(ScalarFeature::SpectralFlux, flux)
                    .with_scalar(ScalarFeature::VoiceProbability, 0.05)
                    .with_scalar(ScalarFeature::PercussiveRatio, 0.1)
                    .with_scalar(ScalarFeature::HarmonicRatio, 0.85)
                    .with_chroma(&chroma)
                    .with_spectral_contrast(&[8.0; 6])
            }
        }
    }
}

impl fmt::Display for SyntheticProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SyntheticProfile {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        SyntheticProfile::ALL
            .iter()
            .copied()
            .find(|p| p.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!(
                    "unknown profile '{}' (expected one of: silence, techno, ambient)",
                    s
                )
            })
    }
}

/// Read a WAV file as mono f32, averaging channels when needed
///
/// # Returns
/// Samples and the file's sample rate
pub fn read_wav(path: &Path) -> Result<(Vec<f32>, u32)> {
    let mut reader =
        hound::WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|sample| sample.map_err(|err| anyhow!(err)))
            .collect::<Result<Vec<f32>>>()?,
        hound::SampleFormat::Int => {
            let max = ((1i64 << (spec.bits_per_sample.clamp(2, 32) - 1)) - 1) as f32;
            reader
                .samples::<i32>()
                .map(|sample| {
                    sample
                        .map(|value| value as f32 / max)
                        .map_err(|err| anyhow!(err))
                })
                .collect::<Result<Vec<f32>>>()?
        }
    };

    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };
    Ok((samples, spec.sample_rate))
}

/// Write mono f32 samples as a 32-bit float WAV file
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("creating {}", path.display()))?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer
        .finalize()
        .with_context(|| format!("finalizing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sine_with_clicks_has_expected_length_and_clicks() {
        let signal = sine_with_clicks(16_000, 1000, 440.0, 250);
        assert_eq!(signal.len(), 16_000);
        // The tone never exceeds 0.4, so only the four clicks cross 0.45
        let peaks = signal.iter().filter(|s| s.abs() > 0.45).count();
        assert_eq!(peaks, 4);
    }

    #[test]
    fn white_noise_is_seeded() {
        assert_eq!(white_noise(64, 0.5, 7), white_noise(64, 0.5, 7));
        assert_ne!(white_noise(64, 0.5, 7), white_noise(64, 0.5, 8));
        assert!(white_noise(256, 0.5, 1).iter().all(|s| s.abs() <= 0.5));
    }

    #[test]
    fn profile_records_are_time_ordered() {
        let records = SyntheticProfile::Techno.records(1000.0);
        assert_eq!(records.len(), 43);
        assert!(records
            .windows(2)
            .all(|w| w[1].timestamp_ms > w[0].timestamp_ms));
        assert_eq!(records[10].spectral_flux, Some(1.0));
    }

    #[test]
    fn profile_parses_case_insensitively() {
        assert_eq!("Techno".parse::<SyntheticProfile>(), Ok(SyntheticProfile::Techno));
        assert!("polka".parse::<SyntheticProfile>().is_err());
    }

    #[test]
    fn wav_round_trip() {
        let dir = std::env::temp_dir().join(format!("style_engine_wav_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("tone.wav");
        let signal = sine_with_clicks(8_000, 200, 300.0, 50);

        write_wav(&path, &signal, 8_000).unwrap();
        let (decoded, sample_rate) = read_wav(&path).unwrap();
        assert_eq!(sample_rate, 8_000);
        assert_eq!(decoded, signal);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
