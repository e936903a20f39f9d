//! Error taxonomy for physio ingestion, regressor synthesis and denoising.

use thiserror::Error;

/// Errors raised by the physio pipeline.
#[derive(Error, Debug)]
pub enum PhysioError {
    /// Caller-supplied geometry or parameters are inconsistent.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Too few frames to estimate phases or regressors.
    #[error("insufficient data: got {got} frames, need at least {need}")]
    InsufficientData {
        /// Frames available
        got: usize,
        /// Frames required
        need: usize,
    },

    /// Physio source could not be interpreted.
    #[error("input format error: {0}")]
    InputFormat(String),

    /// Respiration recording does not cover the scan.
    #[error("respiration shorter than scan: window [{start}, {end}) at frame {frame}")]
    DataLength {
        /// Frame whose window fell outside the recording
        frame: usize,
        /// First sample index of the window
        start: usize,
        /// One-past-last sample index of the window
        end: usize,
    },

    /// Least-squares fit failed for one slice of the volume.
    #[error("fit failure on slice {slice}: {reason}")]
    FitFailure {
        /// Slice index
        slice: usize,
        /// Reason
        reason: String,
    },

    /// Reference volume could not be read or written.
    #[error("volume error: {0}")]
    Volume(String),

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Metadata or raw-data JSON failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for physio operations
pub type PhysioResult<T> = Result<T, PhysioError>;
