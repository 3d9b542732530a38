// HPSS error types and constants

use crate::error::ErrorCode;
use log::warn;
use std::fmt;

/// HPSS error code constants
///
/// Error code range: 4001-4005
pub struct HpssErrorCodes {}

impl HpssErrorCodes {
    /// Input buffer is empty
    pub const EMPTY_INPUT: i32 = 4001;

    /// Input buffer contains NaN or infinite samples
    pub const NON_FINITE_INPUT: i32 = 4002;

    /// STFT geometry does not fit the buffer
    pub const INVALID_GEOMETRY: i32 = 4003;

    /// Separation was cancelled between iterations
    pub const CANCELLED: i32 = 4004;

    /// A separation job is already running for this stream
    pub const WORKER_BUSY: i32 = 4005;
}

/// Log an HPSS error with structured context
///
/// Separation failures are recoverable (the engine substitutes a fallback
/// result), so they are logged at warn level.
pub fn log_hpss_error(err: &HpssError, context: &str) {
    warn!(
        "HPSS error in {}: code={}, component=HpssEngine, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Harmonic-percussive separation errors
#[derive(Debug, Clone, PartialEq)]
pub enum HpssError {
    /// Input buffer is empty
    EmptyInput,

    /// Input buffer contains a non-finite sample
    NonFiniteInput { index: usize },

    /// STFT geometry is unusable
    InvalidGeometry { reason: String },

    /// Cancelled at an iteration boundary
    Cancelled { completed_iterations: usize },

    /// Another job is in flight
    WorkerBusy,
}

impl ErrorCode for HpssError {
    fn code(&self) -> i32 {
        match self {
            HpssError::EmptyInput => HpssErrorCodes::EMPTY_INPUT,
            HpssError::NonFiniteInput { .. } => HpssErrorCodes::NON_FINITE_INPUT,
            HpssError::InvalidGeometry { .. } => HpssErrorCodes::INVALID_GEOMETRY,
            HpssError::Cancelled { .. } => HpssErrorCodes::CANCELLED,
            HpssError::WorkerBusy => HpssErrorCodes::WORKER_BUSY,
        }
    }

    fn message(&self) -> String {
        match self {
            HpssError::EmptyInput => "Input buffer is empty".to_string(),
            HpssError::NonFiniteInput { index } => {
                format!("Input sample {} is NaN or infinite", index)
            }
            HpssError::InvalidGeometry { reason } => format!("Invalid STFT geometry: {}", reason),
            HpssError::Cancelled {
                completed_iterations,
            } => format!(
                "Separation cancelled after {} iterations",
                completed_iterations
            ),
            HpssError::WorkerBusy => {
                "HPSS worker busy. Wait for the previous job to complete.".to_string()
            }
        }
    }
}

impl fmt::Display for HpssError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HpssError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for HpssError {}
