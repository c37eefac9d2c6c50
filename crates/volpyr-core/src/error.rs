//! Error types for volpyr-core
//!
//! Provides a unified error type for the shape, volume and chunked-store
//! layers. Each variant carries the shape or region that triggered it so a
//! failure inside a long-running pyramid build can be traced back to the
//! offending block.

use crate::shape::{Region, Shape3};
use crate::voxel::DataType;
use thiserror::Error;

/// volpyr core error type
#[derive(Error, Debug)]
pub enum Error {
    /// Non-positive or mismatched dimensions
    #[error("invalid shape for {context}: {shape}")]
    InvalidShape { context: &'static str, shape: Shape3 },

    /// Block access beyond the current logical shape
    #[error("block {region} is out of bounds for array of shape {shape}")]
    OutOfBounds { region: Region, shape: Shape3 },

    /// Downsampling attempted on a zero-length axis
    #[error("cannot downsample empty array of shape {shape}")]
    EmptyArray { shape: Shape3 },

    /// Stored voxel type differs from the requested one
    #[error("data type mismatch: expected {expected}, found {actual}")]
    DataTypeMismatch { expected: DataType, actual: DataType },

    /// Malformed or unsupported store metadata
    #[error("invalid store metadata: {0}")]
    Metadata(String),

    /// A chunk could not be encoded or decoded
    #[error("chunk {key}: {message}")]
    Chunk { key: String, message: String },

    /// Invalid parameter value
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Metadata(e.to_string())
    }
}

/// Result type alias for volpyr core operations
pub type Result<T> = std::result::Result<T, Error>;
