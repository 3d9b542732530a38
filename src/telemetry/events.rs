//! Telemetry event types emitted by the decision engine and HPSS worker.

use serde::{Deserialize, Serialize};

use crate::analysis::DetectorState;

/// Diagnostic error codes surfaced via telemetry metrics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticError {
    OutOfOrderRecord,
    HpssFallback,
    HpssCancelled,
    WorkerBusy,
    Unknown,
}

/// Metric events covering decisions, separation latency, and dropped input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MetricEvent {
    StateTransition {
        from: DetectorState,
        to: DetectorState,
        timestamp_ms: f64,
    },
    StyleDecision {
        label: String,
        confidence: f32,
        trigger_score: f32,
        timestamp_ms: f64,
    },
    HpssCompleted {
        harmonic_ratio: f32,
        percussive_ratio: f32,
        separation_quality: f32,
        elapsed_ms: f32,
    },
    HpssLatency {
        avg_ms: f32,
        max_ms: f32,
        sample_count: usize,
    },
    Error {
        code: DiagnosticError,
        context: String,
    },
}
