//! Error types for trajectory matching and aggregation.

use retouch_data::DataError;
use thiserror::Error;

/// Errors that can occur while matching or aggregating along trajectories.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("Invalid match options: {0}")]
    InvalidOptions(String),

    #[error("Tracker error: {0}")]
    Tracker(String),

    #[error("Tracker returned no refinement iterations")]
    NoIterations,

    #[error("Flat index {index} out of range (limit {limit}) at frame {frame}, point {point}")]
    IndexOutOfRange {
        frame: usize,
        point: usize,
        index: i64,
        limit: usize,
    },

    #[error("Shape mismatch for {what}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}
