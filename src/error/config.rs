// Configuration error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Configuration error code constants
///
/// Error code range: 3001-3007
pub struct ConfigErrorCodes {}

impl ConfigErrorCodes {
    /// Hysteresis exit threshold is not strictly below the enter threshold
    pub const HYSTERESIS_ORDER: i32 = 3001;

    /// Minimum aggregation window is not strictly below the maximum window
    pub const WINDOW_ORDER: i32 = 3002;

    /// A threshold or duration is negative or non-finite
    pub const INVALID_THRESHOLD: i32 = 3003;

    /// HPSS window/hop/kernel/iteration geometry is unusable
    pub const INVALID_HPSS_GEOMETRY: i32 = 3004;

    /// A weight table contains negative or non-finite entries
    pub const INVALID_WEIGHTS: i32 = 3005;

    /// Config file could not be read
    pub const READ_FAILED: i32 = 3006;

    /// Config file is not valid JSON for the schema
    pub const PARSE_FAILED: i32 = 3007;
}

/// Log a configuration error with structured context
pub fn log_config_error(err: &ConfigError, context: &str) {
    error!(
        "Config error in {}: code={}, component=EngineConfig, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Configuration errors
///
/// These are rejected when a config is validated or a component is
/// constructed, because accepting them would silently break an invariant
/// (most importantly the hysteresis enter/exit ordering).
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Exit threshold must be strictly less than enter threshold
    HysteresisOrder { enter: f32, exit: f32 },

    /// Minimum window must be strictly less than maximum window
    WindowOrder { min_window_ms: f64, max_window_ms: f64 },

    /// Named parameter is out of range
    InvalidThreshold { name: String, value: f64 },

    /// HPSS geometry is unusable
    InvalidHpssGeometry { reason: String },

    /// Named weight table is invalid
    InvalidWeights { table: String, reason: String },

    /// Config file could not be read
    ReadFailed { path: String, reason: String },

    /// Config file could not be parsed
    ParseFailed { path: String, reason: String },
}

impl ErrorCode for ConfigError {
    fn code(&self) -> i32 {
        match self {
            ConfigError::HysteresisOrder { .. } => ConfigErrorCodes::HYSTERESIS_ORDER,
            ConfigError::WindowOrder { .. } => ConfigErrorCodes::WINDOW_ORDER,
            ConfigError::InvalidThreshold { .. } => ConfigErrorCodes::INVALID_THRESHOLD,
            ConfigError::InvalidHpssGeometry { .. } => ConfigErrorCodes::INVALID_HPSS_GEOMETRY,
            ConfigError::InvalidWeights { .. } => ConfigErrorCodes::INVALID_WEIGHTS,
            ConfigError::ReadFailed { .. } => ConfigErrorCodes::READ_FAILED,
            ConfigError::ParseFailed { .. } => ConfigErrorCodes::PARSE_FAILED,
        }
    }

    fn message(&self) -> String {
        match self {
            ConfigError::HysteresisOrder { enter, exit } => format!(
                "Hysteresis exit threshold ({}) must be strictly below enter threshold ({})",
                exit, enter
            ),
            ConfigError::WindowOrder {
                min_window_ms,
                max_window_ms,
            } => format!(
                "Minimum window ({} ms) must be strictly below maximum window ({} ms)",
                min_window_ms, max_window_ms
            ),
            ConfigError::InvalidThreshold { name, value } => {
                format!("Invalid value for {}: {}", name, value)
            }
            ConfigError::InvalidHpssGeometry { reason } => {
                format!("Invalid HPSS configuration: {}", reason)
            }
            ConfigError::InvalidWeights { table, reason } => {
                format!("Invalid {} weights: {}", table, reason)
            }
            ConfigError::ReadFailed { path, reason } => {
                format!("Failed to read config file {}: {}", path, reason)
            }
            ConfigError::ParseFailed { path, reason } => {
                format!("Failed to parse config file {}: {}", path, reason)
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ConfigError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_codes() {
        assert_eq!(
            ConfigError::HysteresisOrder {
                enter: 0.05,
                exit: 0.08
            }
            .code(),
            ConfigErrorCodes::HYSTERESIS_ORDER
        );
        assert_eq!(
            ConfigError::WindowOrder {
                min_window_ms: 4000.0,
                max_window_ms: 2000.0
            }
            .code(),
            ConfigErrorCodes::WINDOW_ORDER
        );
        assert_eq!(
            ConfigError::InvalidHpssGeometry {
                reason: "test".to_string()
            }
            .code(),
            ConfigErrorCodes::INVALID_HPSS_GEOMETRY
        );
        assert_eq!(
            ConfigError::ParseFailed {
                path: "a.json".to_string(),
                reason: "eof".to_string()
            }
            .code(),
            3007
        );
    }

    #[test]
    fn test_hysteresis_message_names_both_thresholds() {
        let err = ConfigError::HysteresisOrder {
            enter: 0.05,
            exit: 0.08,
        };
        let message = err.message();
        assert!(message.contains("0.05"), "message was {}", message);
        assert!(message.contains("0.08"), "message was {}", message);
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidThreshold {
            name: "centroid_threshold".to_string(),
            value: -1.0,
        };
        let display = format!("{}", err);
        assert!(display.contains("ConfigError"));
        assert!(display.contains(&err.code().to_string()));
    }
}
