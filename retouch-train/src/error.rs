//! Error types for the edit pipeline.

use retouch_data::DataError;
use retouch_match::MatchError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that abort an edit step.
///
/// Nothing here is retried: skipping a failed edit would leave the
/// `updated` flags out of sync with the pixels they describe.
#[derive(Debug, Error)]
pub enum EditError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Match error: {0}")]
    Match(#[from] MatchError),

    #[error("Stale state: {0}")]
    StaleState(&'static str),

    #[error("Editor returned {actual} images for {expected} inputs")]
    EditCount { expected: usize, actual: usize },

    #[error("Scene model error: {0}")]
    Model(String),

    #[error("Diffusion editor error: {0}")]
    Editor(String),

    #[error("Data manager error: {0}")]
    DataManager(String),
}
