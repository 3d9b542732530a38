//! External model contracts
//!
//! Pitch, tempo, timbre and instrument models run outside the engine. Their
//! outputs are folded into FeatureRecords before aggregation through
//! [`FeatureRecord::apply_model_output`](crate::analysis::FeatureRecord::apply_model_output).
//! The engine never depends on a model being present.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::analysis::FeatureRecord;
use crate::error::{log_model_error, ModelError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitchEstimate {
    pub frequency_hz: f32,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempoEstimate {
    pub bpm: f32,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimbreEstimate {
    /// Probability that a human voice is present
    pub voice_probability: f32,
    /// Optional perceptual brightness, stored as sharpness
    #[serde(default)]
    pub brightness: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentEstimate {
    pub probabilities: BTreeMap<String, f32>,
    /// Explicit dominant label; derived from `probabilities` when absent
    #[serde(default)]
    pub dominant: Option<String>,
    #[serde(default)]
    pub dominant_confidence: f32,
}

/// One model's contribution to a frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelOutput {
    Pitch(PitchEstimate),
    Tempo(TempoEstimate),
    Timbre(TimbreEstimate),
    Instruments(InstrumentEstimate),
}

/// A model that analyzes one audio frame
pub trait FeatureModel: Send {
    fn name(&self) -> &str;

    /// Model release identifier reported alongside its outputs
    fn version(&self) -> &str {
        "1.0.0"
    }

    /// Analyze a mono frame at `sample_rate`
    fn analyze(&mut self, frame: &[f32], sample_rate: u32) -> Result<ModelOutput, ModelError>;
}

/// Run every model on a frame and merge successful outputs into `record`
///
/// Model failures are logged and skipped; the record keeps whatever it
/// already had for that field.
///
/// # Returns
/// Number of models whose output was applied
pub fn enrich_record(
    record: &mut FeatureRecord,
    models: &mut [Box<dyn FeatureModel>],
    frame: &[f32],
    sample_rate: u32,
) -> usize {
    let mut applied = 0;
    for model in models.iter_mut() {
        if frame.is_empty() {
            let err = ModelError::InvalidBuffer {
                model: model.name().to_string(),
                reason: "empty frame".to_string(),
            };
            log_model_error(&err, "enrich_record");
            continue;
        }
        match model.analyze(frame, sample_rate) {
            Ok(output) => {
                log::trace!(
                    "[enrich_record] {} v{} at {:.1} ms",
                    model.name(),
                    model.version(),
                    record.timestamp_ms
                );
                record.apply_model_output(&output);
                applied += 1;
            }
            Err(err) => log_model_error(&err, "enrich_record"),
        }
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedTempo(f32);

    impl FeatureModel for FixedTempo {
        fn name(&self) -> &str {
            "fixed_tempo"
        }

        fn analyze(&mut self, _frame: &[f32], _sample_rate: u32) -> Result<ModelOutput, ModelError> {
            Ok(ModelOutput::Tempo(TempoEstimate {
                bpm: self.0,
                confidence: 0.9,
            }))
        }
    }

    struct Broken;

    impl FeatureModel for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn analyze(&mut self, _frame: &[f32], _sample_rate: u32) -> Result<ModelOutput, ModelError> {
            Err(ModelError::Unavailable {
                model: "broken".to_string(),
            })
        }
    }

    #[test]
    fn test_enrich_skips_failing_models() {
        let mut models: Vec<Box<dyn FeatureModel>> = vec![Box::new(Broken), Box::new(FixedTempo(124.0))];
        let mut record = FeatureRecord::new(0.0);
        let applied = enrich_record(&mut record, &mut models, &[0.1; 64], 44100);
        assert_eq!(applied, 1);
        assert_eq!(record.model_tempo_bpm, Some(124.0));
    }

    #[test]
    fn test_default_version() {
        assert_eq!(FixedTempo(120.0).version(), "1.0.0");
    }

    #[test]
    fn test_timbre_output_clamps_voice() {
        let mut record = FeatureRecord::new(0.0);
        record.apply_model_output(&ModelOutput::Timbre(TimbreEstimate {
            voice_probability: 1.4,
            brightness: None,
        }));
        assert_eq!(record.voice_probability, Some(1.0));
    }

    #[test]
    fn test_instrument_output_derives_dominant() {
        let mut probabilities = BTreeMap::new();
        probabilities.insert("piano".to_string(), 0.3);
        probabilities.insert("strings".to_string(), 0.6);
        let mut record = FeatureRecord::new(0.0);
        record.apply_model_output(&ModelOutput::Instruments(InstrumentEstimate {
            probabilities,
            dominant: None,
            dominant_confidence: 0.0,
        }));
        assert_eq!(record.dominant_instrument.as_deref(), Some("strings"));
        assert_eq!(record.dominant_instrument_confidence, Some(0.6));
    }

    #[test]
    fn test_model_output_json_shape() {
        let output = ModelOutput::Pitch(PitchEstimate {
            frequency_hz: 220.0,
            confidence: 0.8,
        });
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["kind"], "pitch");
        assert_eq!(json["frequency_hz"], 220.0);
    }
}
