//! Error types for volpyr-transform

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while downsampling or building a pyramid
#[derive(Debug, Error)]
pub enum TransformError {
    /// Core library error
    #[error("core error: {0}")]
    Core(#[from] volpyr_core::Error),

    /// A pyramid step failed; `level` is the level being produced
    #[error("pyramid level {level} failed: {source}")]
    Level {
        level: u32,
        #[source]
        source: Box<TransformError>,
    },

    /// Filesystem error on a level directory
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid transformation parameters
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
}

/// Result type for transform operations
pub type TransformResult<T> = Result<T, TransformError>;
