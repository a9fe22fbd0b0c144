//! Error types for phase averaging

use thiserror::Error;

/// Errors raised by the phase averaging engine and its I/O helpers
#[derive(Debug, Error)]
pub enum PhaseAverageError {
    /// A configuration value or input array is outside its valid range.
    #[error("Invalid parameter: {message}")]
    InvalidParameter {
        /// Description of what's wrong with the parameter
        message: String,
    },

    /// Two arrays that must share a leading length do not.
    #[error("Length mismatch for {what}: expected {expected}, actual {actual}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Spectral phase correction could not find an FFT bin at the target frequency.
    #[error(
        "Frequency {frequency} not resolved by the FFT axis (resolution {resolution}, tolerance 1e-3)"
    )]
    FrequencyNotResolved { frequency: f64, resolution: f64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },
}

impl PhaseAverageError {
    /// Create an InvalidParameter error.
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    /// Create a LengthMismatch error.
    pub fn length_mismatch(what: &'static str, expected: usize, actual: usize) -> Self {
        Self::LengthMismatch {
            what,
            expected,
            actual,
        }
    }

    /// True for errors caused by caller-supplied configuration or arrays.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Self::InvalidParameter { .. } | Self::LengthMismatch { .. }
        )
    }
}
