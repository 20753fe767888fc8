//! Error types for the encoder core.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RGB buffer is {actual} bytes, expected {expected} for a {width}x{height} image")]
    SourceSizeMismatch {
        width: usize,
        height: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Image {width}x{height} is too small for a single character cell")]
    ImageTooSmall { width: usize, height: usize },

    #[error("Frame is {width}x{height} cells, stream was started at {expected_width}x{expected_height}")]
    FrameSizeMismatch {
        expected_width: usize,
        expected_height: usize,
        width: usize,
        height: usize,
    },
}

/// Result type alias for encoder operations
pub type Result<T> = std::result::Result<T, EngineError>;
