//! DecisionEngine: per-stream orchestration of the decision pipeline.
//!
//! One engine owns the aggregator, stability detector and classifier for a
//! single stream. Records are pushed on the producer thread; every
//! `window_interval_ms` of stream time the engine computes a window, advances
//! the state machine and, on entering GENERATING, commits a style decision.
//! HPSS results arrive asynchronously and are merged into later records.

use serde::{Deserialize, Serialize};

use crate::analysis::{
    DetectorState, FeatureAggregator, FeatureRecord, FeatureWindow, ScalarFeature,
    StabilityDetector, StabilityMetrics, StyleClassifier, StyleResult,
};
use crate::config::EngineConfig;
use crate::error::ConfigError;
use crate::hpss::{HpssResult, HpssSummary};
use crate::telemetry::{self, DiagnosticError};

/// A committed style decision and the evidence behind it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleDecision {
    pub timestamp_ms: f64,
    pub style: StyleResult,
    pub metrics: StabilityMetrics,
    pub window: FeatureWindow,
}

/// Events produced while feeding the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DecisionEvent {
    StateChanged {
        from: DetectorState,
        to: DetectorState,
        timestamp_ms: f64,
    },
    StyleDecided(StyleDecision),
}

pub struct DecisionEngine {
    config: EngineConfig,
    aggregator: FeatureAggregator,
    detector: StabilityDetector,
    classifier: StyleClassifier,
    hpss_summary: Option<HpssSummary>,
    last_tick_ms: Option<f64>,
    last_window: Option<FeatureWindow>,
    last_decision: Option<StyleDecision>,
}

impl DecisionEngine {
    /// Create an engine after validating every configuration section
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            aggregator: FeatureAggregator::new(config.aggregation.clone())?,
            detector: StabilityDetector::new(config.stability.clone())?,
            classifier: StyleClassifier::new(config.classifier.clone())?,
            config,
            hpss_summary: None,
            last_tick_ms: None,
            last_window: None,
            last_decision: None,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> DetectorState {
        self.detector.state()
    }

    pub fn aggregator(&self) -> &FeatureAggregator {
        &self.aggregator
    }

    pub fn last_window(&self) -> Option<&FeatureWindow> {
        self.last_window.as_ref()
    }

    pub fn last_metrics(&self) -> &StabilityMetrics {
        self.detector.last_metrics()
    }

    pub fn last_decision(&self) -> Option<&StyleDecision> {
        self.last_decision.as_ref()
    }

    pub fn hpss_summary(&self) -> Option<HpssSummary> {
        self.hpss_summary
    }

    /// Push one record and run any tick that became due
    ///
    /// Records without percussive/harmonic ratios inherit them from the most
    /// recent successful separation. Out-of-order records are dropped.
    ///
    /// # Returns
    /// Events produced by the tick, if one ran
    pub fn push_frame(&mut self, mut record: FeatureRecord) -> Vec<DecisionEvent> {
        if let Some(summary) = self.hpss_summary {
            if record.percussive_ratio.is_none() {
                record.set_scalar(ScalarFeature::PercussiveRatio, summary.percussive_ratio);
            }
            if record.harmonic_ratio.is_none() {
                record.set_scalar(ScalarFeature::HarmonicRatio, summary.harmonic_ratio);
            }
        }

        let timestamp_ms = record.timestamp_ms;
        if !self.aggregator.add_frame(record) {
            telemetry::hub().record_error(
                DiagnosticError::OutOfOrderRecord,
                format!("record at {:.1}ms", timestamp_ms),
            );
            return Vec::new();
        }

        let due = match self.last_tick_ms {
            None => true,
            Some(last) => timestamp_ms - last >= self.config.aggregation.window_interval_ms,
        };
        if due {
            self.tick(timestamp_ms)
        } else {
            Vec::new()
        }
    }

    /// Compute a window at `now_ms` and advance the state machine
    pub fn tick(&mut self, now_ms: f64) -> Vec<DecisionEvent> {
        self.last_tick_ms = Some(now_ms);
        let window = self.aggregator.compute_window_features();
        let update = self.detector.update(window.as_ref(), now_ms);

        let mut events = Vec::new();
        if update.changed() {
            telemetry::hub().record_transition(update.previous, update.state, now_ms);
            events.push(DecisionEvent::StateChanged {
                from: update.previous,
                to: update.state,
                timestamp_ms: now_ms,
            });
        }

        if update.changed() && update.state == DetectorState::Generating {
            if let Some(window) = window.as_ref() {
                let style = self.classifier.detect_style(window);
                tracing::info!(
                    "[DecisionEngine] Style decided at {:.0}ms: {} (confidence {:.2}, trigger {:.2})",
                    now_ms,
                    style.label,
                    style.confidence,
                    update.metrics.trigger_score
                );
                telemetry::hub().record_decision(&style, update.metrics.trigger_score, now_ms);

                let decision = StyleDecision {
                    timestamp_ms: now_ms,
                    style,
                    metrics: update.metrics.clone(),
                    window: window.clone(),
                };
                self.last_decision = Some(decision.clone());
                events.push(DecisionEvent::StyleDecided(decision));
            }
        }

        self.last_window = window;
        events
    }

    /// Merge a separation result into subsequent records
    ///
    /// Fallback results carry placeholder ratios and are ignored.
    ///
    /// # Returns
    /// `true` if the summary was adopted
    pub fn apply_hpss(&mut self, result: &HpssResult) -> bool {
        if result.is_fallback {
            log::debug!("[DecisionEngine] Ignoring fallback HPSS result");
            return false;
        }
        self.hpss_summary = Some(result.summary());
        true
    }

    /// Signal that the downstream generator finished (GENERATING → IDLE)
    pub fn complete_generation(&mut self, now_ms: f64) -> Option<DecisionEvent> {
        if !self.detector.complete_generation(now_ms) {
            return None;
        }
        telemetry::hub().record_transition(DetectorState::Generating, DetectorState::Idle, now_ms);
        Some(DecisionEvent::StateChanged {
            from: DetectorState::Generating,
            to: DetectorState::Idle,
            timestamp_ms: now_ms,
        })
    }

    /// Classify the current buffer without touching the state machine
    pub fn classify_now(&self) -> StyleResult {
        match self.aggregator.compute_window_features() {
            Some(window) => self.classifier.detect_style(&window),
            None => StyleResult::unknown(),
        }
    }

    /// Drop all per-stream state
    pub fn reset(&mut self) {
        self.aggregator.clear();
        self.detector.reset();
        self.hpss_summary = None;
        self.last_tick_ms = None;
        self.last_window = None;
        self.last_decision = None;
        log::info!("[DecisionEngine] Reset");
    }
}

#[cfg(test)]
mod tests;
