use thiserror::Error;

use crate::audio::{OpenError, SourceError};
use crate::session::RecorderState;

/// Errors surfaced by recorder operations
#[derive(Debug, Error)]
pub enum RecorderError {
    /// The requested recording configuration cannot be honoured
    #[error("unsupported recording configuration: {0}")]
    Config(String),

    /// The capture device failed to open or failed while capturing
    #[error("audio device error: {0}")]
    Device(String),

    /// Scratch or destination file I/O failed
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The operation is not valid in the recorder's current state
    #[error("cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: RecorderState,
    },

    /// The capture worker panicked or was cancelled
    #[error("capture worker terminated abnormally: {0}")]
    Worker(String),
}

impl From<OpenError> for RecorderError {
    fn from(err: OpenError) -> Self {
        match err {
            OpenError::UnsupportedConfig(msg) => Self::Config(msg),
            OpenError::HardwareUnavailable(msg) => Self::Device(msg),
        }
    }
}

impl From<SourceError> for RecorderError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Io(e) => Self::Io(e),
            other => Self::Device(other.to_string()),
        }
    }
}

pub type Result<T, E = RecorderError> = std::result::Result<T, E>;
