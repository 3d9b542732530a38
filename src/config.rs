//! Configuration management for the decision engine
//!
//! Every threshold the engine uses lives here with its documented default,
//! so deployments can retune the pipeline from a JSON file without
//! recompiling. Partial files are accepted: missing sections and fields
//! fall back to defaults through `#[serde(default)]`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{log_config_error, ConfigError};

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub aggregation: AggregationConfig,
    pub stability: StabilityConfig,
    pub hpss: HpssConfig,
    pub classifier: ClassifierConfig,
}

/// Feature aggregation window parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Records older than this (relative to the newest record) are evicted
    pub max_window_ms: f64,
    /// Records newer than this contribute to a FeatureWindow
    pub min_window_ms: f64,
    /// Assumed frame period used to convert flux peak spacing into BPM
    pub frame_period_ms: f64,
    /// Cadence at which the engine computes a new window
    pub window_interval_ms: f64,
    /// Flux peaks must exceed mean + factor * stddev
    pub peak_threshold_factor: f32,
    /// Lower tempo clamp (BPM)
    pub min_bpm: f32,
    /// Upper tempo clamp (BPM)
    pub max_bpm: f32,
    /// Tempo reported when fewer than two flux peaks are found
    pub default_bpm: f32,
    /// Use tempo-model estimates carried on records when any are present
    pub prefer_model_tempo: bool,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            max_window_ms: 4000.0,
            min_window_ms: 2000.0,
            frame_period_ms: 23.2,
            window_interval_ms: 250.0,
            peak_threshold_factor: 0.5,
            min_bpm: 60.0,
            max_bpm: 180.0,
            default_bpm: 120.0,
            prefer_model_tempo: true,
        }
    }
}

/// How the detector decides ANALYZING → GENERATING
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    /// Logical AND of the available dimension flags plus a confidence floor
    AllDimensions,
    /// Weighted sum of dimension flags scaled by confidence
    Weighted,
}

/// How a stability dimension with too little data is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingDimensionPolicy {
    /// Skip the dimension in the AND (it cannot veto)
    TreatAsStable,
    /// The dimension counts as unstable
    TreatAsUnstable,
}

/// Per-dimension weights for the weighted trigger score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerWeights {
    pub centroid: f32,
    pub chroma: f32,
    pub tempo: f32,
    pub energy: f32,
}

impl Default for TriggerWeights {
    fn default() -> Self {
        Self {
            centroid: 0.3,
            chroma: 0.3,
            tempo: 0.2,
            energy: 0.2,
        }
    }
}

impl TriggerWeights {
    fn as_array(&self) -> [f32; 4] {
        [self.centroid, self.chroma, self.tempo, self.energy]
    }
}

/// Stability detector and hysteresis parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityConfig {
    /// Energy (mean RMS) at which the gate opens
    pub enter_threshold: f32,
    /// Energy below which an open gate closes (must be < enter)
    pub exit_threshold: f32,
    /// READY must persist this long before ANALYZING
    pub min_ready_ms: f64,
    /// Max variance(centroid) / mean(centroid)^2
    pub centroid_threshold: f32,
    /// Max mean per-bin chroma variance
    pub chroma_threshold: f32,
    /// Max BPM change against the last accepted BPM
    pub tempo_change_threshold: f32,
    /// Confidence floor for the AND trigger
    pub min_confidence: f32,
    pub trigger_mode: TriggerMode,
    /// Score floor for the weighted trigger
    pub trigger_threshold: f32,
    pub trigger_weights: TriggerWeights,
    pub missing_dimension_policy: MissingDimensionPolicy,
    /// Number of accepted BPM values retained
    pub bpm_history_len: usize,
    /// Samples a dimension needs before its flag is computed
    pub min_samples_per_dimension: usize,
    /// Mean RMS treated as "full" signal quality in the confidence score
    pub reference_rms: f32,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            enter_threshold: 0.08,
            exit_threshold: 0.035,
            min_ready_ms: 1500.0,
            centroid_threshold: 0.15,
            chroma_threshold: 0.08,
            tempo_change_threshold: 18.0,
            min_confidence: 0.6,
            trigger_mode: TriggerMode::AllDimensions,
            trigger_threshold: 0.6,
            trigger_weights: TriggerWeights::default(),
            missing_dimension_policy: MissingDimensionPolicy::TreatAsStable,
            bpm_history_len: 8,
            min_samples_per_dimension: 2,
            reference_rms: 0.1,
        }
    }
}

/// Median-filtering HPSS parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HpssConfig {
    /// STFT frame length in samples
    pub window_size: usize,
    /// STFT hop in samples
    pub hop_size: usize,
    /// Median filter length (odd)
    pub kernel_size: usize,
    /// Filter/mask refinement passes
    pub iterations: usize,
    /// Soft-mask exponent
    pub power: f32,
}

impl Default for HpssConfig {
    fn default() -> Self {
        Self {
            window_size: 2048,
            hop_size: 512,
            kernel_size: 17,
            iterations: 10,
            power: 2.0,
        }
    }
}

/// Weight table for style template matching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleWeights {
    pub tempo: f32,
    pub rms: f32,
    pub centroid: f32,
    pub zcr: f32,
    pub flatness: f32,
    pub contrast: f32,
    pub voice: f32,
    pub percussive: f32,
    pub harmonic: f32,
}

impl Default for StyleWeights {
    fn default() -> Self {
        Self {
            tempo: 0.25,
            rms: 0.2,
            centroid: 0.2,
            zcr: 0.15,
            flatness: 0.1,
            contrast: 0.08,
            voice: 0.07,
            percussive: 0.07,
            harmonic: 0.07,
        }
    }
}

impl StyleWeights {
    fn as_array(&self) -> [f32; 9] {
        [
            self.tempo,
            self.rms,
            self.centroid,
            self.zcr,
            self.flatness,
            self.contrast,
            self.voice,
            self.percussive,
            self.harmonic,
        ]
    }
}

/// Talking point ordering
///
/// `Shuffled` draws the descriptive remarks in a seeded random order before
/// truncation; it is excluded from classifier determinism guarantees for a
/// different seed, but a fixed seed reproduces the same list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum TalkingPointSelection {
    Ordered,
    Shuffled { seed: u64 },
}

/// Style classifier parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub weights: StyleWeights,
    /// Windows with mean RMS below this classify as unknown
    pub silence_rms: f32,
    pub max_talking_points: usize,
    pub talking_points: TalkingPointSelection,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            weights: StyleWeights::default(),
            silence_rms: 0.01,
            max_talking_points: 4,
            talking_points: TalkingPointSelection::Ordered,
        }
    }
}

fn check_non_negative(name: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidThreshold {
            name: name.to_string(),
            value,
        })
    }
}

fn check_weights(table: &str, weights: &[f32]) -> Result<(), ConfigError> {
    if let Some(bad) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
        return Err(ConfigError::InvalidWeights {
            table: table.to_string(),
            reason: format!("weight {} is negative or non-finite", bad),
        });
    }
    if weights.iter().sum::<f32>() <= 0.0 {
        return Err(ConfigError::InvalidWeights {
            table: table.to_string(),
            reason: "weights sum to zero".to_string(),
        });
    }
    Ok(())
}

impl AggregationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_non_negative("min_window_ms", self.min_window_ms)?;
        check_non_negative("max_window_ms", self.max_window_ms)?;
        check_non_negative("window_interval_ms", self.window_interval_ms)?;
        check_non_negative("peak_threshold_factor", self.peak_threshold_factor as f64)?;
        if self.min_window_ms <= 0.0 || self.min_window_ms >= self.max_window_ms {
            return Err(ConfigError::WindowOrder {
                min_window_ms: self.min_window_ms,
                max_window_ms: self.max_window_ms,
            });
        }
        if !(self.frame_period_ms.is_finite() && self.frame_period_ms > 0.0) {
            return Err(ConfigError::InvalidThreshold {
                name: "frame_period_ms".to_string(),
                value: self.frame_period_ms,
            });
        }
        if !(self.min_bpm > 0.0 && self.min_bpm < self.max_bpm) {
            return Err(ConfigError::InvalidThreshold {
                name: "min_bpm".to_string(),
                value: self.min_bpm as f64,
            });
        }
        Ok(())
    }
}

impl StabilityConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_non_negative("enter_threshold", self.enter_threshold as f64)?;
        check_non_negative("exit_threshold", self.exit_threshold as f64)?;
        if self.exit_threshold >= self.enter_threshold {
            return Err(ConfigError::HysteresisOrder {
                enter: self.enter_threshold,
                exit: self.exit_threshold,
            });
        }
        check_non_negative("min_ready_ms", self.min_ready_ms)?;
        check_non_negative("centroid_threshold", self.centroid_threshold as f64)?;
        check_non_negative("chroma_threshold", self.chroma_threshold as f64)?;
        check_non_negative("tempo_change_threshold", self.tempo_change_threshold as f64)?;
        check_non_negative("min_confidence", self.min_confidence as f64)?;
        check_non_negative("trigger_threshold", self.trigger_threshold as f64)?;
        if !(self.reference_rms.is_finite() && self.reference_rms > 0.0) {
            return Err(ConfigError::InvalidThreshold {
                name: "reference_rms".to_string(),
                value: self.reference_rms as f64,
            });
        }
        check_weights("trigger", &self.trigger_weights.as_array())
    }
}

impl HpssConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let reason = if self.window_size < 2 {
            Some(format!("window_size {} must be at least 2", self.window_size))
        } else if self.hop_size == 0 || self.hop_size > self.window_size {
            Some(format!(
                "hop_size {} must be in 1..={}",
                self.hop_size, self.window_size
            ))
        } else if self.kernel_size == 0 || self.kernel_size % 2 == 0 {
            Some(format!("kernel_size {} must be odd", self.kernel_size))
        } else if self.iterations == 0 {
            Some("iterations must be at least 1".to_string())
        } else if !(self.power.is_finite() && self.power > 0.0) {
            Some(format!("power {} must be positive", self.power))
        } else {
            None
        };

        match reason {
            Some(reason) => Err(ConfigError::InvalidHpssGeometry { reason }),
            None => Ok(()),
        }
    }
}

impl ClassifierConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_non_negative("silence_rms", self.silence_rms as f64)?;
        check_weights("style", &self.weights.as_array())
    }
}

impl EngineConfig {
    /// Validate every section, returning the first violation found
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.aggregation.validate()?;
        self.stability.validate()?;
        self.hpss.validate()?;
        self.classifier.validate()
    }

    /// Load and validate configuration from a JSON file
    pub fn try_load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let display = path.as_ref().display().to_string();
        let contents = fs::read_to_string(&path).map_err(|err| ConfigError::ReadFailed {
            path: display.clone(),
            reason: err.to_string(),
        })?;
        let config: Self =
            serde_json::from_str(&contents).map_err(|err| ConfigError::ParseFailed {
                path: display,
                reason: err.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from JSON file
    ///
    /// Falls back to defaults when the file is missing, unparseable or
    /// invalid, logging the reason.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match Self::try_load_from_file(&path) {
            Ok(config) => {
                log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                config
            }
            Err(err) => {
                log_config_error(&err, "EngineConfig::load_from_file");
                log::warn!("[Config] Using default configuration");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.aggregation.max_window_ms, 4000.0);
        assert_eq!(config.aggregation.min_window_ms, 2000.0);
        assert_eq!(config.stability.enter_threshold, 0.08);
        assert_eq!(config.stability.exit_threshold, 0.035);
        assert_eq!(config.hpss.kernel_size, 17);
        assert_eq!(config.hpss.iterations, 10);
        assert_eq!(config.classifier.weights.tempo, 0.25);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_roundtrip() {
        let mut config = EngineConfig::default();
        config.stability.trigger_mode = TriggerMode::Weighted;
        config.classifier.talking_points = TalkingPointSelection::Shuffled { seed: 7 };
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let parsed: EngineConfig =
            serde_json::from_str(r#"{ "stability": { "enter_threshold": 0.1 } }"#).unwrap();
        assert_eq!(parsed.stability.enter_threshold, 0.1);
        assert_eq!(parsed.stability.exit_threshold, 0.035);
        assert_eq!(parsed.hpss, HpssConfig::default());
    }

    #[test]
    fn test_rejects_inverted_hysteresis() {
        let mut config = EngineConfig::default();
        config.stability.exit_threshold = 0.08;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::HysteresisOrder { .. })
        ));
    }

    #[test]
    fn test_rejects_inverted_windows() {
        let mut config = EngineConfig::default();
        config.aggregation.min_window_ms = 5000.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::WindowOrder { .. })
        ));
    }

    #[test]
    fn test_rejects_even_kernel() {
        let mut config = EngineConfig::default();
        config.hpss.kernel_size = 16;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidHpssGeometry { .. })
        ));
    }

    #[test]
    fn test_rejects_negative_weight() {
        let mut config = EngineConfig::default();
        config.classifier.weights.zcr = -0.1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidWeights { .. })
        ));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = EngineConfig::load_from_file("/nonexistent/style_engine.json");
        assert_eq!(config, EngineConfig::default());
        assert!(matches!(
            EngineConfig::try_load_from_file("/nonexistent/style_engine.json"),
            Err(ConfigError::ReadFailed { .. })
        ));
    }
}
