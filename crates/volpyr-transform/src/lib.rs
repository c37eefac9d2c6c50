//! volpyr-transform - Downsampling and pyramid construction
//!
//! This crate provides the resolution-reduction operations of volpyr:
//!
//! - 2× box-filter downsampling of a chunked array, in place or into a
//!   double buffer, processed block by block
//! - Whole-volume reference downsampling
//! - Multi-level pyramid construction with per-level persistence

pub mod downsample;
mod error;
pub mod pyramid;

pub use downsample::{
    DownsampleOptions, ReclaimStrategy, downsample, downsample_volume, halve_shape,
    round_half_even_mean,
};
pub use error::{TransformError, TransformResult};
pub use pyramid::{PyramidOptions, build_pyramid, level_name, persist_level};
