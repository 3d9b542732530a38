// Style Engine Core - Rust music decision engine
// Windowed feature aggregation, stability detection, rule-based style
// classification and harmonic/percussive separation

// Module declarations
pub mod analysis;
pub mod config;
pub mod engine;
pub mod error;
pub mod fixtures;
pub mod hpss;
pub mod models;
pub mod telemetry;

// Re-exports for convenience
pub use analysis::{
    DetectorState, FeatureAggregator, FeatureRecord, FeatureWindow, ScalarFeature,
    StabilityDetector, StabilityMetrics, StyleClassifier, StyleResult,
};
pub use config::EngineConfig;
pub use engine::{DecisionEngine, DecisionEvent, HpssWorker, StreamSession, StyleDecision};
pub use error::{ConfigError, ErrorCode, HpssError, ModelError};
pub use hpss::{HpssEngine, HpssResult, HpssSummary};

/// Install a stderr `tracing` subscriber that also captures `log` records
///
/// Safe to call more than once; later calls are no-ops.
///
/// # Arguments
/// * `verbose` - Log at debug level instead of info
pub fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging(false);
        init_logging(true);
        log::info!("[lib] logging initialized");
    }

    #[test]
    fn test_default_config_builds_engine() {
        let engine = DecisionEngine::new(EngineConfig::default()).unwrap();
        assert_eq!(engine.state(), DetectorState::Idle);
    }
}
