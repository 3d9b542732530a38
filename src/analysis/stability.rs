// StabilityDetector - decides when the music is steady enough to describe
//
// State machine:
//   IDLE -> READY        energy gate opens
//   READY -> ANALYZING   gate held open for min_ready_ms
//   READY/ANALYZING -> IDLE when the gate closes
//   ANALYZING -> GENERATING when the trigger condition holds
//   GENERATING -> IDLE   only via complete_generation()
//
// At most one transition happens per update.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::aggregator::FeatureWindow;
use super::hysteresis::{EnergyGate, GateEvent};
use super::record::ScalarFeature;
use crate::config::{MissingDimensionPolicy, StabilityConfig, TriggerMode};
use crate::error::ConfigError;

/// Features whose presence makes up the completeness half of confidence
const KEY_FEATURES: [ScalarFeature; 7] = [
    ScalarFeature::Rms,
    ScalarFeature::SpectralCentroid,
    ScalarFeature::ZeroCrossingRate,
    ScalarFeature::SpectralFlatness,
    ScalarFeature::SpectralFlux,
    ScalarFeature::VoiceProbability,
    ScalarFeature::PercussiveRatio,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorState {
    Idle,
    Ready,
    Analyzing,
    Generating,
}

impl DetectorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorState::Idle => "idle",
            DetectorState::Ready => "ready",
            DetectorState::Analyzing => "analyzing",
            DetectorState::Generating => "generating",
        }
    }
}

/// Per-window stability measurements
///
/// Dimension flags are `None` when the window lacked enough data to decide.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StabilityMetrics {
    pub centroid_stable: Option<bool>,
    pub chroma_stable: Option<bool>,
    pub tempo_stable: Option<bool>,
    /// Energy gate state
    pub energy_stable: bool,
    /// variance / mean^2 of the spectral centroid
    pub centroid_variation: f32,
    /// Mean per-bin chroma variance
    pub chroma_variance: f32,
    /// |current BPM - last accepted BPM|
    pub tempo_delta: Option<f32>,
    /// Mean RMS fed to the energy gate
    pub energy: f32,
    pub overall_stable: bool,
    /// How long `overall_stable` has held continuously
    pub stable_duration_ms: f64,
    pub confidence: f32,
    pub trigger_score: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StabilityUpdate {
    pub previous: DetectorState,
    pub state: DetectorState,
    pub gate_event: Option<GateEvent>,
    pub metrics: StabilityMetrics,
}

impl StabilityUpdate {
    pub fn changed(&self) -> bool {
        self.previous != self.state
    }
}

pub struct StabilityDetector {
    config: StabilityConfig,
    gate: EnergyGate,
    state: DetectorState,
    state_since_ms: f64,
    bpm_history: VecDeque<f32>,
    /// Rejected BPM awaiting confirmation
    tempo_candidate: Option<f32>,
    stable_since_ms: Option<f64>,
    last_metrics: StabilityMetrics,
}

impl StabilityDetector {
    pub fn new(config: StabilityConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let gate = EnergyGate::new(config.enter_threshold, config.exit_threshold)?;
        Ok(Self {
            bpm_history: VecDeque::with_capacity(config.bpm_history_len.max(1)),
            tempo_candidate: None,
            config,
            gate,
            state: DetectorState::Idle,
            state_since_ms: 0.0,
            stable_since_ms: None,
            last_metrics: StabilityMetrics::default(),
        })
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    pub fn config(&self) -> &StabilityConfig {
        &self.config
    }

    pub fn last_metrics(&self) -> &StabilityMetrics {
        &self.last_metrics
    }

    /// Accepted BPM values, oldest first
    pub fn bpm_history(&self) -> impl Iterator<Item = f32> + '_ {
        self.bpm_history.iter().copied()
    }

    pub fn is_gate_open(&self) -> bool {
        self.gate.is_open()
    }

    /// Return to IDLE and forget all history
    pub fn reset(&mut self) {
        self.gate.reset();
        self.state = DetectorState::Idle;
        self.state_since_ms = 0.0;
        self.bpm_history.clear();
        self.tempo_candidate = None;
        self.stable_since_ms = None;
        self.last_metrics = StabilityMetrics::default();
    }

    /// Signal that the consumer finished generating; GENERATING -> IDLE
    ///
    /// # Returns
    /// `true` if the detector was generating
    pub fn complete_generation(&mut self, now_ms: f64) -> bool {
        if self.state != DetectorState::Generating {
            return false;
        }
        log::info!("[StabilityDetector] generating -> idle (generation complete)");
        self.state = DetectorState::Idle;
        self.state_since_ms = now_ms;
        self.stable_since_ms = None;
        // Require a fresh gate opening before the next cycle
        self.gate.reset();
        true
    }

    /// Evaluate a window and advance the state machine
    ///
    /// # Arguments
    /// * `window` - Latest aggregated window, or `None` when nothing is buffered
    /// * `now_ms` - Stream time of this evaluation
    pub fn update(&mut self, window: Option<&FeatureWindow>, now_ms: f64) -> StabilityUpdate {
        let previous = self.state;

        let energy = window.map_or(0.0, |w| w.mean(ScalarFeature::Rms));
        let gate_event = self.gate.process(energy);
        match gate_event {
            Some(GateEvent::Opened) => {
                log::debug!("[StabilityDetector] Energy gate opened at {:.3}", energy)
            }
            Some(GateEvent::Closed) => {
                log::debug!("[StabilityDetector] Energy gate closed at {:.3}", energy)
            }
            None => {}
        }

        let metrics = self.evaluate(window, energy, now_ms);
        let open = self.gate.is_open();

        let next = match self.state {
            DetectorState::Idle if open => DetectorState::Ready,
            DetectorState::Ready if !open => DetectorState::Idle,
            DetectorState::Ready if now_ms - self.state_since_ms >= self.config.min_ready_ms => {
                DetectorState::Analyzing
            }
            DetectorState::Analyzing if !open => DetectorState::Idle,
            DetectorState::Analyzing if self.should_trigger(&metrics) => DetectorState::Generating,
            state => state,
        };

        if next != self.state {
            tracing::info!(
                "[StabilityDetector] {} -> {} at {:.0}ms (confidence {:.2}, score {:.2})",
                self.state.as_str(),
                next.as_str(),
                now_ms,
                metrics.confidence,
                metrics.trigger_score
            );
            self.state = next;
            self.state_since_ms = now_ms;
        }

        self.last_metrics = metrics.clone();
        StabilityUpdate {
            previous,
            state: self.state,
            gate_event,
            metrics,
        }
    }

    fn should_trigger(&self, metrics: &StabilityMetrics) -> bool {
        match self.config.trigger_mode {
            TriggerMode::AllDimensions => {
                metrics.overall_stable && metrics.confidence >= self.config.min_confidence
            }
            TriggerMode::Weighted => metrics.trigger_score >= self.config.trigger_threshold,
        }
    }

    fn resolve(&self, flag: Option<bool>) -> bool {
        flag.unwrap_or(match self.config.missing_dimension_policy {
            MissingDimensionPolicy::TreatAsStable => true,
            MissingDimensionPolicy::TreatAsUnstable => false,
        })
    }

    fn evaluate(
        &mut self,
        window: Option<&FeatureWindow>,
        energy: f32,
        now_ms: f64,
    ) -> StabilityMetrics {
        let Some(window) = window else {
            self.stable_since_ms = None;
            return StabilityMetrics {
                energy_stable: self.gate.is_open(),
                ..StabilityMetrics::default()
            };
        };
        let min_samples = self.config.min_samples_per_dimension;

        let centroid = window.stat(ScalarFeature::SpectralCentroid);
        let centroid_variation = centroid.relative_variance().unwrap_or(0.0);
        let centroid_stable = if centroid.count >= min_samples {
            centroid
                .relative_variance()
                .map(|v| v <= self.config.centroid_threshold)
        } else {
            None
        };

        let chroma_variance = window.chroma.mean_variance();
        let chroma_stable = (window.chroma.count >= min_samples)
            .then(|| chroma_variance <= self.config.chroma_threshold);

        let (tempo_stable, tempo_delta) = self.evaluate_tempo(window);

        let overall_stable = [centroid_stable, chroma_stable, tempo_stable]
            .into_iter()
            .all(|flag| self.resolve(flag));

        let stable_duration_ms = if overall_stable {
            now_ms - *self.stable_since_ms.get_or_insert(now_ms)
        } else {
            self.stable_since_ms = None;
            0.0
        };

        let confidence = self.confidence(window, centroid_variation);
        let energy_stable = self.gate.is_open();

        let weights = &self.config.trigger_weights;
        let weighted = [
            (weights.centroid, self.resolve(centroid_stable)),
            (weights.chroma, self.resolve(chroma_stable)),
            (weights.tempo, self.resolve(tempo_stable)),
            (weights.energy, energy_stable),
        ]
        .iter()
        .filter(|(_, flag)| *flag)
        .map(|(w, _)| *w)
        .sum::<f32>();

        StabilityMetrics {
            centroid_stable,
            chroma_stable,
            tempo_stable,
            energy_stable,
            centroid_variation,
            chroma_variance,
            tempo_delta,
            energy,
            overall_stable,
            stable_duration_ms,
            confidence,
            trigger_score: weighted * confidence,
        }
    }

    /// Compare the window tempo against the last accepted BPM
    ///
    /// Only passing readings are accepted. A rejected reading is held as a
    /// candidate; a second reading within the threshold of it confirms the
    /// tempo change and becomes the new reference.
    fn evaluate_tempo(&mut self, window: &FeatureWindow) -> (Option<bool>, Option<f32>) {
        if !window.has_measured_tempo() {
            return (None, None);
        }
        let current = window.tempo_bpm;
        let threshold = self.config.tempo_change_threshold;
        let Some(&last) = self.bpm_history.back() else {
            self.accept_bpm(current);
            return (None, None);
        };

        let delta = (current - last).abs();
        if delta <= threshold {
            self.accept_bpm(current);
            return (Some(true), Some(delta));
        }

        match self.tempo_candidate {
            Some(candidate) if (current - candidate).abs() <= threshold => self.accept_bpm(current),
            _ => self.tempo_candidate = Some(current),
        }
        (Some(false), Some(delta))
    }

    fn accept_bpm(&mut self, bpm: f32) {
        if self.bpm_history.len() >= self.config.bpm_history_len.max(1) {
            self.bpm_history.pop_front();
        }
        self.bpm_history.push_back(bpm);
        self.tempo_candidate = None;
    }

    /// 0.6 * completeness + 0.4 * quality, in [0, 1]
    fn confidence(&self, window: &FeatureWindow, centroid_variation: f32) -> f32 {
        let present = KEY_FEATURES.iter().filter(|f| window.has(**f)).count()
            + usize::from(window.chroma.is_present());
        let completeness = present as f32 / (KEY_FEATURES.len() + 1) as f32;

        let energy_quality = if window.has(ScalarFeature::Rms) {
            (window.mean(ScalarFeature::Rms) / self.config.reference_rms).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let consistency = if window.has(ScalarFeature::SpectralCentroid) {
            1.0 - centroid_variation.sqrt().clamp(0.0, 1.0)
        } else {
            0.0
        };
        let quality = 0.5 * energy_quality + 0.5 * consistency;

        let confidence = 0.6 * completeness + 0.4 * quality;
        if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

#[cfg(test)]
#[path = "stability_tests.rs"]
mod tests;
