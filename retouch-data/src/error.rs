//! Error types for data model operations.

use thiserror::Error;

/// Errors that can occur while reading or mutating image batches.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Slot {slot} out of range for batch of {len} slots")]
    SlotOutOfRange { slot: usize, len: usize },

    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Empty batch: {0}")]
    Empty(String),

    #[error("Invalid resample target {height}x{width}")]
    InvalidResize { height: usize, width: usize },

    #[error("Image conversion error: {0}")]
    Conversion(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}
