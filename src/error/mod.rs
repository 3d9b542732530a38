// Error types for the style decision engine
//
// Only construction-time problems and explicitly fallible operations
// surface as errors. The streaming components (aggregator, stability
// detector, classifier, HPSS `separate`) degrade to neutral defaults instead.

mod config;
mod hpss;
mod model;

pub use config::{log_config_error, ConfigError, ConfigErrorCodes};
pub use hpss::{log_hpss_error, HpssError, HpssErrorCodes};
pub use model::{log_model_error, ModelError, ModelErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, so callers and telemetry can report failures
/// without matching on every variant.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
