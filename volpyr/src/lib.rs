//! volpyr - Multi-resolution pyramids of 3D voxel volumes
//!
//! Builds a chain of progressively coarser levels from a stack of 2D
//! image slices. Each level halves every axis (rounding up) with a 2×
//! box filter and is persisted as its own chunk directory.
//!
//! # Overview
//!
//! - [`ChunkedStore`] / [`PyramidArray`] - Chunked, resizable voxel storage
//! - [`transform`] - Downsampling and pyramid construction
//! - [`io`] - Slice ingestion (TIFF, PNG) and level export
//!
//! # Example
//!
//! ```
//! use volpyr::{NoopObserver, PyramidArray, Shape3, StoreConfig, Volume};
//! use volpyr::transform::{PyramidOptions, build_pyramid};
//!
//! let volume = Volume::<u16>::from_fn(Shape3::new(4, 6, 6), |z, y, x| {
//!     (z * 100 + y * 10 + x) as u16
//! })
//! .unwrap();
//! let config = StoreConfig::default().with_chunk_shape(Shape3::new(2, 2, 2));
//! let mut array = PyramidArray::from_volume(&volume, &config).unwrap();
//!
//! let out = std::env::temp_dir().join(format!("volpyr_doc_{}", std::process::id()));
//! let levels = build_pyramid(&mut array, 2, &out, &PyramidOptions::default(), &NoopObserver)
//!     .unwrap();
//! assert_eq!(levels.len(), 2);
//! assert_eq!(array.shape(), Shape3::new(1, 2, 2));
//! assert_eq!(array.level(), 2);
//! # std::fs::remove_dir_all(&out).ok();
//! ```

// Re-export core types (primary data structures used everywhere)
pub use volpyr_core::*;

// Re-export domain crates as modules to avoid name conflicts
pub use volpyr_io as io;
pub use volpyr_transform as transform;
