//! Result and error types for Cotejar.

use thiserror::Error;

/// Result type for Cotejar operations
pub type CotejarResult<T> = Result<T, CotejarError>;

/// Errors that can occur in Cotejar
#[derive(Debug, Error)]
pub enum CotejarError {
    /// Baseline and current images have different dimensions
    ///
    /// Never silently truncated or stretched. Geometry normalization
    /// should have prevented this; if it occurs the normalizer failed
    /// silently and needs investigation, not a retry.
    #[error("image dimensions differ: baseline {baseline_width}x{baseline_height}, current {current_width}x{current_height}")]
    DimensionMismatch {
        /// Baseline image width
        baseline_width: u32,
        /// Baseline image height
        baseline_height: u32,
        /// Current image width
        current_width: u32,
        /// Current image height
        current_height: u32,
    },

    /// An image has zero width or height
    #[error("image is empty ({width}x{height})")]
    EmptyImage {
        /// Observed width
        width: u32,
        /// Observed height
        height: u32,
    },

    /// An image payload could not be parsed as a raster image
    #[error("failed to decode image payload: {message}")]
    DecodeFailure {
        /// Error message
        message: String,
    },

    /// A result image could not be encoded
    #[error("failed to encode image: {message}")]
    EncodeFailure {
        /// Error message
        message: String,
    },

    /// The window-control collaborator rejected a resize/state-change
    ///
    /// The workflow aborts rather than capturing at a possibly-wrong
    /// geometry.
    #[error("window operation failed: {message}")]
    WindowOperation {
        /// Error message
        message: String,
    },

    /// No baseline exists for the requested comparison
    ///
    /// An expected user-facing condition, not a bug.
    #[error("no baseline found for '{name}'")]
    BaselineMissing {
        /// Baseline key
        name: String,
    },

    /// The capture collaborator failed to produce an image
    #[error("capture failed: {message}")]
    Capture {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
