// Model collaborator error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Model error code constants
///
/// Error code range: 5001-5003
pub struct ModelErrorCodes {}

impl ModelErrorCodes {
    /// Model weights/runtime not loaded
    pub const UNAVAILABLE: i32 = 5001;

    /// Buffer or sample rate rejected by the model
    pub const INVALID_BUFFER: i32 = 5002;

    /// Inference ran but failed
    pub const INFERENCE_FAILED: i32 = 5003;
}

/// Log a model error with structured context
pub fn log_model_error(err: &ModelError, context: &str) {
    error!(
        "Model error in {}: code={}, component=FeatureModel, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors reported by external model collaborators
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Model is not loaded
    Unavailable { model: String },

    /// Input rejected
    InvalidBuffer { model: String, reason: String },

    /// Inference failed
    InferenceFailed { model: String, reason: String },
}

impl ErrorCode for ModelError {
    fn code(&self) -> i32 {
        match self {
            ModelError::Unavailable { .. } => ModelErrorCodes::UNAVAILABLE,
            ModelError::InvalidBuffer { .. } => ModelErrorCodes::INVALID_BUFFER,
            ModelError::InferenceFailed { .. } => ModelErrorCodes::INFERENCE_FAILED,
        }
    }

    fn message(&self) -> String {
        match self {
            ModelError::Unavailable { model } => format!("Model {} is not available", model),
            ModelError::InvalidBuffer { model, reason } => {
                format!("Model {} rejected input: {}", model, reason)
            }
            ModelError::InferenceFailed { model, reason } => {
                format!("Model {} inference failed: {}", model, reason)
            }
        }
    }
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ModelError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ModelError {}
