//! Building level 0 from image stacks
//!
//! A stack is an ordered list of 2D slice files; the list order is the Z
//! order. Four strategies trade memory for simplicity and all produce
//! bit-identical stores:
//!
//! | Strategy | Peak memory | Store growth |
//! |---|---|---|
//! | [`IngestStrategy::MaterializeAll`] | whole stack | allocated once |
//! | [`IngestStrategy::IndexedWrite`] | one slice | allocated once |
//! | [`IngestStrategy::AppendGrowth`] | one slice | one resize per slice |
//! | [`IngestStrategy::LazyGraph`] | one chunk row of slices | allocated once |
//!
//! Every slice must have the (Y, X) extent of the first one.

use crate::codec::SliceCodec;
use crate::{IoError, IoResult};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use volpyr_core::{
    NoopObserver, Observer, Operation, PyramidArray, Shape3, StoreConfig, Volume, Voxel, observe,
};

/// How slices are assembled into the level-0 store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IngestStrategy {
    /// Decode every slice, stack them in memory, then store the volume
    MaterializeAll,
    /// Allocate the full shape up front and write each slice at its Z
    IndexedWrite,
    /// Start from the first slice and grow the store by one slice at a time
    AppendGrowth,
    /// Decode slices in parallel, one chunk row at a time
    #[default]
    LazyGraph,
}

/// Deferred decode of a slice stack
///
/// Each node decodes one slice and depends on nothing else, so nodes run
/// in any order. [`materialize`](Self::materialize) executes them band by
/// band on the rayon pool, where a band is one chunk row along Z, and
/// writes each completed band with a single block write.
///
/// There is no single join point over the whole stack: every band is its
/// own join, and at most one band of decoded slices is held in memory.
pub struct SliceGraph<'a, T: Voxel> {
    paths: Vec<PathBuf>,
    codec: &'a dyn SliceCodec<T>,
}

impl<'a, T: Voxel> SliceGraph<'a, T> {
    pub fn new<P: AsRef<Path>>(paths: &[P], codec: &'a dyn SliceCodec<T>) -> Self {
        Self {
            paths: paths.iter().map(|p| p.as_ref().to_path_buf()).collect(),
            codec,
        }
    }

    /// Number of decode nodes
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Run every node and store the result
    ///
    /// The first failing node aborts the run. Bands finished before the
    /// failure have already been written; with a directory location they
    /// stay in the store directory even though no array is returned, so
    /// the location must be cleared before it is reused.
    pub fn materialize(&self, config: &StoreConfig) -> IoResult<PyramidArray<T>> {
        let (first, slice_shape) = first_slice(&self.paths, self.codec)?;
        let depth = self.paths.len() as u64;
        let array = PyramidArray::allocate(
            Shape3::new(depth, slice_shape.y, slice_shape.x),
            config,
        )?;
        let band = config.chunk_shape.z.max(1) as usize;

        for start in (0..self.paths.len()).step_by(band) {
            let end = (start + band).min(self.paths.len());
            let slices = (start..end)
                .into_par_iter()
                .map(|index| {
                    if index == 0 {
                        Ok(first.clone())
                    } else {
                        decode_slice(self.codec, index, &self.paths[index], slice_shape)
                    }
                })
                .collect::<IoResult<Vec<_>>>()?;
            let block = Volume::stack(&slices)?;
            array
                .store()
                .write_block(Shape3::new(start as u64, 0, 0), &block)?;
            log::debug!("ingested slices {}..{}", start, end);
        }
        Ok(array)
    }
}

/// Decode and check slice `index` against the expected depth-1 shape
fn decode_slice<T: Voxel>(
    codec: &dyn SliceCodec<T>,
    index: usize,
    path: &Path,
    expected: Shape3,
) -> IoResult<Volume<T>> {
    let slice = codec.decode(path).map_err(|e| IoError::Slice {
        index,
        path: path.to_path_buf(),
        source: Box::new(e),
    })?;
    if slice.shape() != expected {
        return Err(IoError::InconsistentSliceShapes {
            index,
            path: path.to_path_buf(),
            expected,
            actual: slice.shape(),
        });
    }
    Ok(slice)
}

/// Decode slice 0, which fixes the (Y, X) extent of the stack
fn first_slice<T: Voxel>(
    paths: &[PathBuf],
    codec: &dyn SliceCodec<T>,
) -> IoResult<(Volume<T>, Shape3)> {
    let path = paths.first().ok_or(volpyr_core::Error::InvalidShape {
        context: "empty slice list",
        shape: Shape3::zero(),
    })?;
    let slice = codec.decode(path).map_err(|e| IoError::Slice {
        index: 0,
        path: path.clone(),
        source: Box::new(e),
    })?;
    if slice.depth() != 1 {
        return Err(IoError::Slice {
            index: 0,
            path: path.clone(),
            source: Box::new(IoError::InvalidData(format!(
                "decoded {} instead of a single slice",
                slice.shape()
            ))),
        });
    }
    let shape = slice.shape();
    Ok((slice, shape))
}

/// Ingest a slice stack into a level-0 array
///
/// # Arguments
///
/// * `paths` - Slice files in Z order
/// * `codec` - Decoder for the slice files
/// * `config` - Configuration of the level-0 store
/// * `strategy` - How slices are assembled
///
/// # Errors
///
/// Returns `Error::InvalidShape` for an empty list,
/// `IoError::Slice` naming the slice that failed to decode and
/// `IoError::InconsistentSliceShapes` for a slice whose extent differs
/// from the first.
pub fn ingest_slices<T: Voxel, P: AsRef<Path>>(
    paths: &[P],
    codec: &dyn SliceCodec<T>,
    config: &StoreConfig,
    strategy: IngestStrategy,
) -> IoResult<PyramidArray<T>> {
    ingest_slices_observed(paths, codec, config, strategy, &NoopObserver)
}

/// [`ingest_slices`] reporting an `Ingest` operation to `observer`
pub fn ingest_slices_observed<T: Voxel, P: AsRef<Path>>(
    paths: &[P],
    codec: &dyn SliceCodec<T>,
    config: &StoreConfig,
    strategy: IngestStrategy,
    observer: &dyn Observer,
) -> IoResult<PyramidArray<T>> {
    let paths: Vec<PathBuf> = paths.iter().map(|p| p.as_ref().to_path_buf()).collect();
    log::debug!("ingesting {} slices ({:?})", paths.len(), strategy);
    observe(
        observer,
        Operation::Ingest {
            slices: paths.len(),
        },
        |array: &PyramidArray<T>| array.nbytes(),
        || match strategy {
            IngestStrategy::MaterializeAll => materialize_all(&paths, codec, config),
            IngestStrategy::IndexedWrite => indexed_write(&paths, codec, config),
            IngestStrategy::AppendGrowth => append_growth(&paths, codec, config),
            IngestStrategy::LazyGraph => SliceGraph::new(&paths, codec).materialize(config),
        },
    )
}

fn materialize_all<T: Voxel>(
    paths: &[PathBuf],
    codec: &dyn SliceCodec<T>,
    config: &StoreConfig,
) -> IoResult<PyramidArray<T>> {
    let (first, slice_shape) = first_slice(paths, codec)?;
    let mut slices = Vec::with_capacity(paths.len());
    slices.push(first);
    for (index, path) in paths.iter().enumerate().skip(1) {
        slices.push(decode_slice(codec, index, path, slice_shape)?);
    }
    let volume = Volume::stack(&slices)?;
    Ok(PyramidArray::from_volume(&volume, config)?)
}

fn indexed_write<T: Voxel>(
    paths: &[PathBuf],
    codec: &dyn SliceCodec<T>,
    config: &StoreConfig,
) -> IoResult<PyramidArray<T>> {
    let (first, slice_shape) = first_slice(paths, codec)?;
    let shape = Shape3::new(paths.len() as u64, slice_shape.y, slice_shape.x);
    let array = PyramidArray::allocate(shape, config)?;
    array.store().write_block(Shape3::zero(), &first)?;
    for (index, path) in paths.iter().enumerate().skip(1) {
        let slice = decode_slice(codec, index, path, slice_shape)?;
        array
            .store()
            .write_block(Shape3::new(index as u64, 0, 0), &slice)?;
    }
    Ok(array)
}

fn append_growth<T: Voxel>(
    paths: &[PathBuf],
    codec: &dyn SliceCodec<T>,
    config: &StoreConfig,
) -> IoResult<PyramidArray<T>> {
    let (first, slice_shape) = first_slice(paths, codec)?;
    let mut array = PyramidArray::from_volume(&first, config)?;
    for (index, path) in paths.iter().enumerate().skip(1) {
        let slice = decode_slice(codec, index, path, slice_shape)?;
        array.store_mut().append_z(&slice)?;
    }
    Ok(array)
}

/// Ingest a multipage TIFF, one page per Z slice
///
/// Pages are decoded and stored one at a time.
#[cfg(feature = "tiff-format")]
pub fn ingest_volume<T: Voxel>(
    path: impl AsRef<Path>,
    config: &StoreConfig,
) -> IoResult<PyramidArray<T>> {
    use crate::tiff::{TiffPageReader, tiff_page_count};
    use std::fs::File;
    use std::io::BufReader;

    let path = path.as_ref();
    let depth = tiff_page_count(BufReader::new(File::open(path)?))?;
    let mut pages = TiffPageReader::new(BufReader::new(File::open(path)?))?;
    let page_error = |index: usize, e: IoError| IoError::Slice {
        index,
        path: path.to_path_buf(),
        source: Box::new(e),
    };

    let first: Volume<T> = pages
        .next_page()
        .map_err(|e| page_error(0, e))?
        .ok_or_else(|| IoError::InvalidData(format!("{} has no pages", path.display())))?;
    let slice_shape = first.shape();
    let array = PyramidArray::allocate(
        Shape3::new(depth as u64, slice_shape.y, slice_shape.x),
        config,
    )?;
    array.store().write_block(Shape3::zero(), &first)?;

    for index in 1..depth {
        let page: Volume<T> = pages
            .next_page()
            .map_err(|e| page_error(index, e))?
            .ok_or_else(|| IoError::InvalidData(format!("page {index} missing")))?;
        if page.shape() != slice_shape {
            return Err(IoError::InconsistentSliceShapes {
                index,
                path: path.to_path_buf(),
                expected: slice_shape,
                actual: page.shape(),
            });
        }
        array
            .store()
            .write_block(Shape3::new(index as u64, 0, 0), &page)?;
    }
    Ok(array)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Decodes `<v>.raw` as a 2×3 slice of value `v`; anything else fails
    struct NamedValues;

    impl SliceCodec<u16> for NamedValues {
        fn decode(&self, path: &Path) -> IoResult<Volume<u16>> {
            let value = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| IoError::DecodeError(format!("bad slice {}", path.display())))?;
            Ok(Volume::filled(Shape3::new(1, 2, 3), value)?)
        }

        fn encode(&self, _slice: &Volume<u16>, _path: &Path) -> IoResult<()> {
            Err(IoError::UnsupportedFormat("read only".to_string()))
        }

        fn extension(&self) -> &'static str {
            "raw"
        }
    }

    #[test]
    fn test_graph_writes_band_by_band() {
        let paths = ["1.raw", "2.raw", "3.raw", "4.raw", "5.raw"];
        let config = StoreConfig::default().with_chunk_shape(Shape3::new(2, 2, 3));
        let array = SliceGraph::<u16>::new(&paths, &NamedValues).materialize(&config).unwrap();
        let vol = array.to_volume().unwrap();
        for z in 0..5 {
            assert!(vol.plane(z).iter().all(|&v| v == z as u16 + 1));
        }
    }

    #[test]
    fn test_failed_band_keeps_earlier_bands() {
        let dir = std::env::temp_dir().join(format!("volpyr_graph_fail_{}", std::process::id()));
        std::fs::remove_dir_all(&dir).ok();
        let paths = ["1.raw", "2.raw", "3.raw", "broken.raw"];
        let config = StoreConfig::default()
            .with_chunk_shape(Shape3::new(2, 2, 3))
            .in_directory(&dir);

        let err = SliceGraph::<u16>::new(&paths, &NamedValues)
            .materialize(&config)
            .err()
            .unwrap();
        assert!(matches!(err, IoError::Slice { index: 3, .. }));

        let left = volpyr_core::ChunkedStore::<u16>::load(&dir).unwrap();
        let band = left.read_block(Shape3::zero(), Shape3::new(2, 2, 3)).unwrap();
        assert_eq!(band.plane(1), &[2; 6]);
        assert!(volpyr_core::ChunkedStore::<u16>::allocate(left.shape(), &config).is_err());
        volpyr_core::remove_store_dir(&dir).unwrap();
        assert!(!dir.exists());
    }
}
