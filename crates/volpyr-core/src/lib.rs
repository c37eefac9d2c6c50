//! volpyr-core - Basic data structures for volumetric pyramids
//!
//! This crate provides the fundamental data structures used throughout
//! volpyr:
//!
//! - [`Shape3`] / [`Region`] - (Z, Y, X) extents, coordinates and boxes
//! - [`Voxel`] / [`DataType`] - Unsigned integer voxel element types
//! - [`Volume`] - Dense in-memory voxel buffer
//! - [`ChunkedStore`] - Persistent, resizable, chunk-addressable array
//! - [`PyramidArray`] - A chunked array tagged with its pyramid level
//! - [`Observer`] - Hooks around long-running operations

pub mod array;
pub mod error;
pub mod observe;
pub mod shape;
pub mod store;
pub mod voxel;
pub mod volume;

pub use array::PyramidArray;
pub use error::{Error, Result};
pub use observe::{LogObserver, NoopObserver, Observation, Observer, Operation, observe};
pub use shape::{Region, Shape3};
pub use store::serial::{ArrayMetadata, PyramidAttributes};
pub use store::{ChunkLayout, ChunkedStore, Compression, StoreConfig, StoreLocation, remove_store_dir};
pub use voxel::{DataType, Voxel};
pub use volume::Volume;
