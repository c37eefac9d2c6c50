//! volpyr-io - Slice ingestion and level export
//!
//! This crate moves voxels between image files and chunked stores:
//!
//! - [`SliceCodec`] - Decode/encode single 2D slices (TIFF, PNG)
//! - [`detect_format`] - Magic-number format detection
//! - [`discover_slices`] - Ordered listing of slice files
//! - [`ingest_slices`] / [`ingest_volume`] - Build level 0 from a stack
//! - [`export_slices`], [`export_csv`], [`export_volume_tiff`],
//!   [`export_chunked`] - Write a level back out
//!
//! # Features
//!
//! - `tiff-format` (default): TIFF slices and multipage stacks
//! - `png-format` (default): PNG slices

pub mod codec;
pub mod discover;
mod error;
pub mod export;
pub mod format;
pub mod ingest;
#[cfg(feature = "png-format")]
pub mod png;
#[cfg(feature = "tiff-format")]
pub mod tiff;

pub use codec::{SliceCodec, codec_for_format, codec_for_path};
#[cfg(feature = "png-format")]
pub use codec::PngCodec;
#[cfg(feature = "tiff-format")]
pub use codec::TiffCodec;
pub use discover::{SliceOrder, discover_slices, trailing_index};
pub use error::{IoError, IoResult};
#[cfg(feature = "tiff-format")]
pub use export::export_volume_tiff;
pub use export::{
    export_chunked, export_csv, export_observed, export_slices, shape_dir_name, slice_file_name,
};
pub use format::{ImageFormat, detect_format, detect_format_from_bytes};
#[cfg(feature = "tiff-format")]
pub use ingest::ingest_volume;
pub use ingest::{IngestStrategy, SliceGraph, ingest_slices, ingest_slices_observed};
#[cfg(feature = "tiff-format")]
pub use tiff::TiffCompression;
