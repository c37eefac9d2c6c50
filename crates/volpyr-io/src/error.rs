//! I/O error types
//!
//! Provides a unified error type for slice decoding, ingestion and export.
//! Each format module maps its underlying library errors into `IoError`
//! variants so that callers only need to handle one error type.

use std::path::PathBuf;
use thiserror::Error;
use volpyr_core::Shape3;

/// Error type for volpyr I/O operations.
#[derive(Error, Debug)]
pub enum IoError {
    /// Standard I/O error (file not found, permission denied, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The image format is not supported or not enabled via features
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The image data is structurally invalid
    #[error("invalid image data: {0}")]
    InvalidData(String),

    /// A format-specific decoder returned an error
    #[error("decode error: {0}")]
    DecodeError(String),

    /// A format-specific encoder returned an error
    #[error("encode error: {0}")]
    EncodeError(String),

    /// Reading slice `index` of a stack failed
    #[error("slice {index} ({}): {source}", path.display())]
    Slice {
        index: usize,
        path: PathBuf,
        #[source]
        source: Box<IoError>,
    },

    /// A slice's (Y, X) extent differs from the first slice's
    #[error(
        "slice {index} ({}) has shape {actual}, expected {expected}",
        path.display()
    )]
    InconsistentSliceShapes {
        index: usize,
        path: PathBuf,
        expected: Shape3,
        actual: Shape3,
    },

    /// An error from the core library (store access, shape checks)
    #[error("core error: {0}")]
    Core(#[from] volpyr_core::Error),
}

/// Convenience alias for I/O results.
pub type IoResult<T> = Result<T, IoError>;
