//! 2× box-filter downsampling
//!
//! Each output voxel `(zo, yo, xo)` is the mean of the input window
//! `[2zo, 2zo+2) × [2yo, 2yo+2) × [2xo, 2xo+2)` clipped to the input shape,
//! so odd axes end in windows of length 1. The mean is rounded half to
//! even and computed exactly from the integer sum and count.
//!
//! # Block processing
//!
//! [`downsample`] never loads the whole array. Output is produced in tiles
//! of [`DownsampleOptions::block_shape`]; each tile reads only its input
//! window region. Tile origins are multiples of the block shape, so every
//! input region starts on even coordinates and aggregating it alone gives
//! exactly the voxels the whole-array computation would.
//!
//! # Reclaiming storage
//!
//! | Strategy | Output goes to | Tiles |
//! |---|---|---|
//! | [`ReclaimStrategy::InPlace`] | low-index prefix of the same store, then `resize` | sequential |
//! | [`ReclaimStrategy::DoubleBuffer`] | a fresh sibling store that replaces the old one | parallel |
//!
//! In place, tiles run in ascending (z, y, x) order. The tile with grid
//! index `i` reads input tiles `2i` and `2i + 1` along each axis, and
//! writes output tile `i`; a later tile never needs input that an earlier
//! tile has overwritten.

use crate::{TransformError, TransformResult};
use rayon::prelude::*;
use volpyr_core::{PyramidArray, Region, Shape3, Volume, Voxel};

/// How the storage of the previous level is reclaimed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReclaimStrategy {
    /// Overwrite the input store's low-index prefix, then shrink it
    #[default]
    InPlace,
    /// Write into a new store and swap it in when complete
    DoubleBuffer,
}

/// Options for [`downsample`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DownsampleOptions {
    /// Output tile shape; defaults to the store's chunk shape
    pub block_shape: Option<Shape3>,
    pub strategy: ReclaimStrategy,
}

impl DownsampleOptions {
    pub fn with_block_shape(mut self, block_shape: Shape3) -> Self {
        self.block_shape = Some(block_shape);
        self
    }

    pub fn with_strategy(mut self, strategy: ReclaimStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

/// Shape of the next level: `ceil(n / 2)` along every axis
///
/// # Errors
///
/// Returns `Error::EmptyArray` if any axis has zero length.
pub fn halve_shape(shape: Shape3) -> TransformResult<Shape3> {
    if shape.is_empty() {
        return Err(volpyr_core::Error::EmptyArray { shape }.into());
    }
    Ok(shape.halved())
}

/// Mean of `count` values summing to `sum`, rounded half to even
///
/// Ties (`sum / count` exactly halfway between two integers) round to the
/// even neighbour, so `{2, 3}` gives 2 and `{3, 4}` gives 4.
///
/// # Panics
///
/// Panics if `count` is zero.
#[inline]
pub fn round_half_even_mean(sum: u64, count: u64) -> u64 {
    let q = sum / count;
    let r = sum % count;
    match (2 * r).cmp(&count) {
        std::cmp::Ordering::Less => q,
        std::cmp::Ordering::Greater => q + 1,
        std::cmp::Ordering::Equal => q + (q & 1),
    }
}

/// Downsample a whole in-memory volume
///
/// Reference path for [`downsample`]; memory use is proportional to the
/// input size.
pub fn downsample_volume<T: Voxel>(input: &Volume<T>) -> TransformResult<Volume<T>> {
    halve_shape(input.shape())?;
    aggregate(input)
}

/// Aggregate `input` into a volume of `input.shape().halved()`
///
/// The window grid is anchored at `input`'s first voxel. Output planes
/// are computed in parallel.
fn aggregate<T: Voxel>(input: &Volume<T>) -> TransformResult<Volume<T>> {
    let in_shape = input.shape();
    let out_shape = in_shape.halved();
    let plane_len = (out_shape.y * out_shape.x) as usize;
    let src = input.data();
    let mut data = vec![T::default(); out_shape.len()];

    data.par_chunks_mut(plane_len)
        .enumerate()
        .for_each(|(zo, plane)| {
            let zo = zo as u64;
            let z_range = 2 * zo..(2 * zo + 2).min(in_shape.z);
            for yo in 0..out_shape.y {
                let y_range = 2 * yo..(2 * yo + 2).min(in_shape.y);
                for xo in 0..out_shape.x {
                    let x_range = 2 * xo..(2 * xo + 2).min(in_shape.x);
                    let mut sum = 0u64;
                    let mut count = 0u64;
                    for z in z_range.clone() {
                        for y in y_range.clone() {
                            let row = ((z * in_shape.y + y) * in_shape.x) as usize;
                            for x in x_range.clone() {
                                sum += src[row + x as usize].to_u64();
                                count += 1;
                            }
                        }
                    }
                    // The mean never exceeds the largest input value
                    plane[(yo * out_shape.x + xo) as usize] =
                        T::from_u64(round_half_even_mean(sum, count)).unwrap_or(T::MAX);
                }
            }
        });

    Ok(Volume::from_data(out_shape, data)?)
}

/// Output tiles of `out_shape` with edge `block`, in (z, y, x) order
fn output_tiles(out_shape: Shape3, block: Shape3) -> Vec<Region> {
    let grid = out_shape.div_ceil(block);
    let mut tiles = Vec::with_capacity(grid.len());
    for tz in 0..grid.z {
        for ty in 0..grid.y {
            for tx in 0..grid.x {
                let origin = Shape3::new(tz, ty, tx).mul(block);
                let size = block.min(out_shape.saturating_sub(origin));
                tiles.push(Region::new(origin, size));
            }
        }
    }
    tiles
}

/// Input window region for an output tile
fn input_region(tile: Region, in_shape: Shape3) -> Region {
    let origin = tile.origin.scale(2);
    let end = tile.end().scale(2).min(in_shape);
    Region::new(origin, end.saturating_sub(origin))
}

/// Read, aggregate and return one output tile
fn compute_tile<T: Voxel>(
    store: &volpyr_core::ChunkedStore<T>,
    tile: Region,
    in_shape: Shape3,
) -> TransformResult<Volume<T>> {
    let input = input_region(tile, in_shape);
    let block = store.read_block(input.origin, input.size)?;
    let out = aggregate(&block)?;
    debug_assert_eq!(out.shape(), tile.size);
    log::debug!("tile {} <- {}", tile, input);
    Ok(out)
}

/// Replace `array` with its next coarser level
///
/// The new shape is `ceil(shape / 2)` per axis and the level increments by
/// one, including at the 1×1×1 fixed point. Both reclaim strategies and
/// every block shape give identical voxels.
///
/// # Arguments
///
/// * `array` - Array to downsample; must have no zero-length axis
/// * `options` - Tile shape and reclaim strategy
///
/// # Errors
///
/// Returns `Error::EmptyArray` for an empty array and
/// `TransformError::InvalidParameters` for an empty block shape. A failed
/// read or write aborts the step; with `InPlace` the store is then left
/// partially overwritten.
pub fn downsample<T: Voxel>(
    array: &mut PyramidArray<T>,
    options: &DownsampleOptions,
) -> TransformResult<()> {
    let in_shape = array.shape();
    let out_shape = halve_shape(in_shape)?;
    let block = options.block_shape.unwrap_or_else(|| array.chunk_shape());
    if block.is_empty() {
        return Err(TransformError::InvalidParameters(format!(
            "block shape {block} has a zero-length axis"
        )));
    }
    let tiles = output_tiles(out_shape, block);
    log::debug!(
        "downsample level {} {} -> {} in {} tiles of {} ({:?})",
        array.level(),
        in_shape,
        out_shape,
        tiles.len(),
        block,
        options.strategy
    );

    match options.strategy {
        ReclaimStrategy::InPlace => {
            let store = array.store();
            for &tile in &tiles {
                let out = compute_tile(store, tile, in_shape)?;
                store.write_block(tile.origin, &out)?;
            }
            array.store_mut().resize(out_shape)?;
        }
        ReclaimStrategy::DoubleBuffer => {
            let next = array.store().allocate_sibling(out_shape)?;
            {
                let store = array.store();
                tiles.par_iter().try_for_each(|&tile| {
                    let out = compute_tile(store, tile, in_shape)?;
                    next.write_block(tile.origin, &out)?;
                    Ok::<(), TransformError>(())
                })?;
            }
            array.replace_store(next)?;
        }
    }

    array.advance_level();
    Ok(())
}
