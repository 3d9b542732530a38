// FeatureRecord - one frame of measurements from the feature source
//
// Every scalar is optional and carries its own presence bit (the `Option`),
// so "exclude absent values from statistics" is enforced by the type rather
// than by runtime checks. Vector features are fixed-length arrays: a vector
// of the wrong length is treated as absent, never truncated or padded.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::models::ModelOutput;

/// Number of cepstral coefficients per frame
pub const MFCC_LEN: usize = 13;
/// Number of pitch classes in a chroma vector
pub const CHROMA_LEN: usize = 12;
/// Number of spectral-contrast bands
pub const CONTRAST_LEN: usize = 6;

/// Scalar features tracked per frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarFeature {
    Rms,
    SpectralCentroid,
    ZeroCrossingRate,
    SpectralFlatness,
    SpectralFlux,
    SpectralBandwidth,
    SpectralRolloff,
    SpectralSpread,
    SpectralSkewness,
    SpectralKurtosis,
    Loudness,
    PerceptualSpread,
    PerceptualSharpness,
    VoiceProbability,
    PercussiveRatio,
    HarmonicRatio,
}

impl ScalarFeature {
    pub const COUNT: usize = 16;

    pub const ALL: [ScalarFeature; Self::COUNT] = [
        ScalarFeature::Rms,
        ScalarFeature::SpectralCentroid,
        ScalarFeature::ZeroCrossingRate,
        ScalarFeature::SpectralFlatness,
        ScalarFeature::SpectralFlux,
        ScalarFeature::SpectralBandwidth,
        ScalarFeature::SpectralRolloff,
        ScalarFeature::SpectralSpread,
        ScalarFeature::SpectralSkewness,
        ScalarFeature::SpectralKurtosis,
        ScalarFeature::Loudness,
        ScalarFeature::PerceptualSpread,
        ScalarFeature::PerceptualSharpness,
        ScalarFeature::VoiceProbability,
        ScalarFeature::PercussiveRatio,
        ScalarFeature::HarmonicRatio,
    ];

    /// Position of this feature in `ALL` and in window stat arrays
    pub fn index(self) -> usize {
        self as usize
    }

    /// Ratios are clamped to [0, 1] on ingestion
    pub fn is_ratio(self) -> bool {
        matches!(
            self,
            ScalarFeature::SpectralFlatness
                | ScalarFeature::ZeroCrossingRate
                | ScalarFeature::VoiceProbability
                | ScalarFeature::PercussiveRatio
                | ScalarFeature::HarmonicRatio
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            ScalarFeature::Rms => "rms",
            ScalarFeature::SpectralCentroid => "spectral_centroid",
            ScalarFeature::ZeroCrossingRate => "zcr",
            ScalarFeature::SpectralFlatness => "spectral_flatness",
            ScalarFeature::SpectralFlux => "spectral_flux",
            ScalarFeature::SpectralBandwidth => "spectral_bandwidth",
            ScalarFeature::SpectralRolloff => "spectral_rolloff",
            ScalarFeature::SpectralSpread => "spectral_spread",
            ScalarFeature::SpectralSkewness => "spectral_skewness",
            ScalarFeature::SpectralKurtosis => "spectral_kurtosis",
            ScalarFeature::Loudness => "loudness",
            ScalarFeature::PerceptualSpread => "perceptual_spread",
            ScalarFeature::PerceptualSharpness => "perceptual_sharpness",
            ScalarFeature::VoiceProbability => "voice_probability",
            ScalarFeature::PercussiveRatio => "percussive_ratio",
            ScalarFeature::HarmonicRatio => "harmonic_ratio",
        }
    }
}

/// Copy a slice into a fixed-length array, or `None` on length mismatch
/// or non-finite entries.
pub fn fixed_vector<const N: usize>(values: &[f32]) -> Option<[f32; N]> {
    if values.len() != N || values.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let mut out = [0.0; N];
    out.copy_from_slice(values);
    Some(out)
}

fn deserialize_fixed<'de, D, const N: usize>(deserializer: D) -> Result<Option<[f32; N]>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<f32>> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|values| {
        let fixed = fixed_vector::<N>(&values);
        if fixed.is_none() {
            log::debug!(
                "[FeatureRecord] Dropping vector of length {} (expected {})",
                values.len(),
                N
            );
        }
        fixed
    }))
}

fn deserialize_mfcc<'de, D: Deserializer<'de>>(d: D) -> Result<Option<[f32; MFCC_LEN]>, D::Error> {
    deserialize_fixed::<D, MFCC_LEN>(d)
}

fn deserialize_chroma<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<Option<[f32; CHROMA_LEN]>, D::Error> {
    deserialize_fixed::<D, CHROMA_LEN>(d)
}

fn deserialize_contrast<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<Option<[f32; CONTRAST_LEN]>, D::Error> {
    deserialize_fixed::<D, CONTRAST_LEN>(d)
}

/// One analysis frame of features
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    /// Frame time in milliseconds (non-decreasing within a stream)
    pub timestamp_ms: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rms: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spectral_centroid: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zcr: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spectral_flatness: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spectral_flux: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spectral_bandwidth: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spectral_rolloff: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spectral_spread: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spectral_skewness: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spectral_kurtosis: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loudness: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub perceptual_spread: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub perceptual_sharpness: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_probability: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percussive_ratio: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub harmonic_ratio: Option<f32>,

    #[serde(
        default,
        deserialize_with = "deserialize_mfcc",
        skip_serializing_if = "Option::is_none"
    )]
    pub mfcc: Option<[f32; MFCC_LEN]>,
    #[serde(
        default,
        deserialize_with = "deserialize_chroma",
        skip_serializing_if = "Option::is_none"
    )]
    pub chroma: Option<[f32; CHROMA_LEN]>,
    #[serde(
        default,
        deserialize_with = "deserialize_contrast",
        skip_serializing_if = "Option::is_none"
    )]
    pub spectral_contrast: Option<[f32; CONTRAST_LEN]>,

    /// Instrument label -> probability (not necessarily normalized)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruments: Option<BTreeMap<String, f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dominant_instrument: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dominant_instrument_confidence: Option<f32>,

    /// Tempo reported by an external tempo model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_tempo_bpm: Option<f32>,
    /// Fundamental frequency reported by an external pitch model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch_hz: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch_confidence: Option<f32>,
}

impl FeatureRecord {
    /// Create an empty record at the given time
    pub fn new(timestamp_ms: f64) -> Self {
        Self {
            timestamp_ms,
            ..Self::default()
        }
    }

    fn slot(&self, feature: ScalarFeature) -> Option<f32> {
        match feature {
            ScalarFeature::Rms => self.rms,
            ScalarFeature::SpectralCentroid => self.spectral_centroid,
            ScalarFeature::ZeroCrossingRate => self.zcr,
            ScalarFeature::SpectralFlatness => self.spectral_flatness,
            ScalarFeature::SpectralFlux => self.spectral_flux,
            ScalarFeature::SpectralBandwidth => self.spectral_bandwidth,
            ScalarFeature::SpectralRolloff => self.spectral_rolloff,
            ScalarFeature::SpectralSpread => self.spectral_spread,
            ScalarFeature::SpectralSkewness => self.spectral_skewness,
            ScalarFeature::SpectralKurtosis => self.spectral_kurtosis,
            ScalarFeature::Loudness => self.loudness,
            ScalarFeature::PerceptualSpread => self.perceptual_spread,
            ScalarFeature::PerceptualSharpness => self.perceptual_sharpness,
            ScalarFeature::VoiceProbability => self.voice_probability,
            ScalarFeature::PercussiveRatio => self.percussive_ratio,
            ScalarFeature::HarmonicRatio => self.harmonic_ratio,
        }
    }

    fn slot_mut(&mut self, feature: ScalarFeature) -> &mut Option<f32> {
        match feature {
            ScalarFeature::Rms => &mut self.rms,
            ScalarFeature::SpectralCentroid => &mut self.spectral_centroid,
            ScalarFeature::ZeroCrossingRate => &mut self.zcr,
            ScalarFeature::SpectralFlatness => &mut self.spectral_flatness,
            ScalarFeature::SpectralFlux => &mut self.spectral_flux,
            ScalarFeature::SpectralBandwidth => &mut self.spectral_bandwidth,
            ScalarFeature::SpectralRolloff => &mut self.spectral_rolloff,
            ScalarFeature::SpectralSpread => &mut self.spectral_spread,
            ScalarFeature::SpectralSkewness => &mut self.spectral_skewness,
            ScalarFeature::SpectralKurtosis => &mut self.spectral_kurtosis,
            ScalarFeature::Loudness => &mut self.loudness,
            ScalarFeature::PerceptualSpread => &mut self.perceptual_spread,
            ScalarFeature::PerceptualSharpness => &mut self.perceptual_sharpness,
            ScalarFeature::VoiceProbability => &mut self.voice_probability,
            ScalarFeature::PercussiveRatio => &mut self.percussive_ratio,
            ScalarFeature::HarmonicRatio => &mut self.harmonic_ratio,
        }
    }

    /// Present, finite value of a scalar feature
    pub fn scalar(&self, feature: ScalarFeature) -> Option<f32> {
        self.slot(feature).filter(|v| v.is_finite())
    }

    /// Set a scalar feature, clamping ratios into [0, 1]
    ///
    /// Non-finite values clear the slot.
    pub fn set_scalar(&mut self, feature: ScalarFeature, value: f32) {
        let value = if !value.is_finite() {
            None
        } else if feature.is_ratio() {
            Some(value.clamp(0.0, 1.0))
        } else {
            Some(value)
        };
        *self.slot_mut(feature) = value;
    }

    /// Builder form of [`FeatureRecord::set_scalar`]
    pub fn with_scalar(mut self, feature: ScalarFeature, value: f32) -> Self {
        self.set_scalar(feature, value);
        self
    }

    pub fn with_mfcc(mut self, values: &[f32]) -> Self {
        self.mfcc = fixed_vector(values);
        self
    }

    pub fn with_chroma(mut self, values: &[f32]) -> Self {
        self.chroma = fixed_vector(values);
        self
    }

    pub fn with_spectral_contrast(mut self, values: &[f32]) -> Self {
        self.spectral_contrast = fixed_vector(values);
        self
    }

    /// Set the instrument map and derive the dominant label from it
    pub fn with_instruments(mut self, instruments: BTreeMap<String, f32>) -> Self {
        self.set_instruments(instruments);
        self
    }

    pub fn set_instruments(&mut self, instruments: BTreeMap<String, f32>) {
        let dominant = dominant_label(&instruments);
        self.dominant_instrument = dominant.as_ref().map(|(label, _)| label.clone());
        self.dominant_instrument_confidence = dominant.map(|(_, p)| p);
        self.instruments = Some(instruments);
    }

    /// Normalize an externally produced record
    ///
    /// Clamps ratios, clears non-finite scalars, and drops vectors holding
    /// non-finite entries.
    pub fn sanitized(mut self) -> Self {
        for feature in ScalarFeature::ALL {
            if let Some(value) = self.slot(feature) {
                self.set_scalar(feature, value);
            }
        }
        if self.mfcc.map_or(false, |v| v.iter().any(|x| !x.is_finite())) {
            self.mfcc = None;
        }
        if self.chroma.map_or(false, |v| v.iter().any(|x| !x.is_finite())) {
            self.chroma = None;
        }
        if self
            .spectral_contrast
            .map_or(false, |v| v.iter().any(|x| !x.is_finite()))
        {
            self.spectral_contrast = None;
        }
        if let Some(instruments) = self.instruments.as_mut() {
            instruments.retain(|_, p| p.is_finite());
            for p in instruments.values_mut() {
                *p = p.max(0.0);
            }
        }
        self.dominant_instrument_confidence = self
            .dominant_instrument_confidence
            .filter(|c| c.is_finite())
            .map(|c| c.clamp(0.0, 1.0));
        self
    }

    /// Merge the output of an external model into this record
    pub fn apply_model_output(&mut self, output: &ModelOutput) {
        match output {
            ModelOutput::Pitch(pitch) => {
                self.pitch_hz = Some(pitch.frequency_hz).filter(|f| f.is_finite());
                self.pitch_confidence = Some(pitch.confidence.clamp(0.0, 1.0));
            }
            ModelOutput::Tempo(tempo) => {
                self.model_tempo_bpm = Some(tempo.bpm).filter(|b| b.is_finite() && *b > 0.0);
            }
            ModelOutput::Timbre(timbre) => {
                self.set_scalar(ScalarFeature::VoiceProbability, timbre.voice_probability);
                if let Some(sharpness) = timbre.brightness {
                    self.set_scalar(ScalarFeature::PerceptualSharpness, sharpness);
                }
            }
            ModelOutput::Instruments(instruments) => {
                self.instruments = Some(instruments.probabilities.clone());
                match &instruments.dominant {
                    Some(label) => {
                        self.dominant_instrument = Some(label.clone());
                        self.dominant_instrument_confidence =
                            Some(instruments.dominant_confidence.clamp(0.0, 1.0));
                    }
                    None => {
                        let dominant = dominant_label(&instruments.probabilities);
                        self.dominant_instrument =
                            dominant.as_ref().map(|(label, _)| label.clone());
                        self.dominant_instrument_confidence = dominant.map(|(_, p)| p);
                    }
                }
            }
        }
    }
}

/// Highest-probability label; ties resolve to the first label in key order
pub fn dominant_label(probabilities: &BTreeMap<String, f32>) -> Option<(String, f32)> {
    let mut best: Option<(&String, f32)> = None;
    for (label, &p) in probabilities {
        if !p.is_finite() {
            continue;
        }
        if best.map_or(true, |(_, best_p)| p > best_p) {
            best = Some((label, p));
        }
    }
    best.map(|(label, p)| (label.clone(), p.clamp(0.0, 1.0)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratios_are_clamped() {
        let record = FeatureRecord::new(0.0)
            .with_scalar(ScalarFeature::VoiceProbability, 1.7)
            .with_scalar(ScalarFeature::PercussiveRatio, -0.2)
            .with_scalar(ScalarFeature::SpectralCentroid, 4200.0);
        assert_eq!(record.voice_probability, Some(1.0));
        assert_eq!(record.percussive_ratio, Some(0.0));
        assert_eq!(record.spectral_centroid, Some(4200.0));
    }

    #[test]
    fn test_non_finite_scalar_is_absent() {
        let mut record = FeatureRecord::new(0.0);
        record.rms = Some(f32::NAN);
        assert_eq!(record.scalar(ScalarFeature::Rms), None);
        let record = record.sanitized();
        assert_eq!(record.rms, None);
    }

    #[test]
    fn test_wrong_length_vector_is_absent() {
        let record = FeatureRecord::new(0.0)
            .with_chroma(&[0.1; 11])
            .with_mfcc(&[0.0; MFCC_LEN]);
        assert!(record.chroma.is_none());
        assert!(record.mfcc.is_some());
    }

    #[test]
    fn test_deserialize_drops_malformed_vectors() {
        let json = r#"{
            "timestamp_ms": 12.5,
            "rms": 0.4,
            "chroma": [0.1, 0.2, 0.3],
            "spectral_contrast": [1, 2, 3, 4, 5, 6]
        }"#;
        let record: FeatureRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.rms, Some(0.4));
        assert!(record.chroma.is_none(), "short chroma must be treated as absent");
        assert_eq!(
            record.spectral_contrast,
            Some([1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
        );
        assert!(record.mfcc.is_none());
    }

    #[test]
    fn test_instrument_map_sets_dominant() {
        let mut instruments = BTreeMap::new();
        instruments.insert("drums".to_string(), 0.7);
        instruments.insert("synth".to_string(), 0.9);
        instruments.insert("voice".to_string(), 0.2);
        let record = FeatureRecord::new(0.0).with_instruments(instruments);
        assert_eq!(record.dominant_instrument.as_deref(), Some("synth"));
        assert_eq!(record.dominant_instrument_confidence, Some(0.9));
    }

    #[test]
    fn test_scalar_feature_indices_match_all() {
        for (i, feature) in ScalarFeature::ALL.iter().enumerate() {
            assert_eq!(feature.index(), i, "{} out of order", feature.name());
        }
    }
}
