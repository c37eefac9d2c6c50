//! ChunkedStore - persistent, resizable, block-addressable 3D array
//!
//! The store partitions a logical (Z, Y, X) array into fixed-size chunks
//! and keeps them either in memory or as files under a directory (see
//! [`serial`] for the on-disk layout). All access goes through axis-aligned
//! blocks; nothing requires the whole array to be resident.
//!
//! # Concurrency
//!
//! [`ChunkedStore::read_block`] and [`ChunkedStore::write_block`] take
//! `&self` and may be called from several threads. Writes are serialized
//! internally so that two writers touching one chunk cannot interleave
//! their read-modify-write cycles. Readers take no lock: a directory
//! store replaces each chunk file with a rename, so a read sees either the
//! old or the new chunk, never a partial one. [`ChunkedStore::resize`]
//! takes `&mut self` and therefore excludes every concurrent access.
//!
//! # Examples
//!
//! ```
//! use volpyr_core::{ChunkedStore, Shape3, StoreConfig, Volume};
//!
//! let config = StoreConfig::default().with_chunk_shape(Shape3::splat(4));
//! let store = ChunkedStore::<u16>::allocate(Shape3::new(6, 6, 6), &config).unwrap();
//!
//! let block = Volume::filled(Shape3::new(2, 3, 3), 9u16).unwrap();
//! store.write_block(Shape3::new(3, 3, 3), &block).unwrap();
//!
//! let back = store.read_block(Shape3::new(3, 3, 3), Shape3::new(2, 3, 3)).unwrap();
//! assert_eq!(back, block);
//! ```

mod backend;
pub mod serial;

use crate::error::{Error, Result};
use crate::shape::{Region, Shape3};
use crate::voxel::{DataType, Voxel};
use crate::volume::{Volume, copy_box};
use backend::{Backend, ChunkFormat};
use serde::{Deserialize, Serialize};
use serial::{ArrayMetadata, ZARRAY};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Default chunk edge length
pub const DEFAULT_CHUNK_EDGE: u64 = 64;

/// How chunk keys map onto the directory hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkLayout {
    /// One directory level per axis: `z/y/x`
    #[default]
    Nested,
    /// All chunks side by side: `z.y.x`
    Flat,
}

impl ChunkLayout {
    /// Separator between chunk indices in a key
    pub fn separator(self) -> &'static str {
        match self {
            ChunkLayout::Nested => "/",
            ChunkLayout::Flat => ".",
        }
    }

    pub fn from_separator(s: &str) -> Option<Self> {
        match s {
            "/" => Some(ChunkLayout::Nested),
            "." => Some(ChunkLayout::Flat),
            _ => None,
        }
    }

    /// Key of the chunk at grid index `key`, e.g. `"1/0/3"`
    pub fn chunk_key(self, key: Shape3) -> String {
        let sep = self.separator();
        format!("{}{sep}{}{sep}{}", key.z, key.y, key.x)
    }
}

/// Where chunk data lives
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreLocation {
    /// Chunks held in process memory
    #[default]
    Memory,
    /// Chunks stored as files below this directory
    Directory(PathBuf),
}

/// Chunk compression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    None,
    /// zlib at the given level (0-10)
    Zlib(u8),
}

impl Default for Compression {
    fn default() -> Self {
        Compression::Zlib(1)
    }
}

/// Store construction options
///
/// # Examples
///
/// ```
/// use volpyr_core::{ChunkLayout, Shape3, StoreConfig};
///
/// let config = StoreConfig::from_json_str(r#"{ "chunk_shape": [16, 32, 32], "layout": "flat" }"#)
///     .unwrap();
/// assert_eq!(config.chunk_shape, Shape3::new(16, 32, 32));
/// assert_eq!(config.layout, ChunkLayout::Flat);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub chunk_shape: Shape3,
    pub layout: ChunkLayout,
    pub location: StoreLocation,
    pub compression: Compression,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            chunk_shape: Shape3::splat(DEFAULT_CHUNK_EDGE),
            layout: ChunkLayout::default(),
            location: StoreLocation::default(),
            compression: Compression::default(),
        }
    }
}

impl StoreConfig {
    pub fn with_chunk_shape(mut self, chunk_shape: Shape3) -> Self {
        self.chunk_shape = chunk_shape;
        self
    }

    pub fn with_layout(mut self, layout: ChunkLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Keep chunks as files under `path`
    pub fn in_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.location = StoreLocation::Directory(path.into());
        self
    }

    /// Keep chunks in memory
    pub fn in_memory(mut self) -> Self {
        self.location = StoreLocation::Memory;
        self
    }

    /// Parse a configuration from JSON; missing fields take defaults
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(s)
            .map_err(|e| Error::InvalidParameter(format!("store config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON configuration file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    fn validate(&self) -> Result<()> {
        if self.chunk_shape.is_empty() {
            return Err(Error::InvalidShape {
                context: "chunk shape",
                shape: self.chunk_shape,
            });
        }
        if let Compression::Zlib(level) = self.compression
            && level > 10
        {
            return Err(Error::InvalidParameter(format!(
                "zlib level {level} exceeds 10"
            )));
        }
        Ok(())
    }
}

/// Persistent chunked array of `T` voxels
pub struct ChunkedStore<T: Voxel> {
    shape: Shape3,
    chunk_shape: Shape3,
    layout: ChunkLayout,
    compression: Compression,
    backend: Backend<T>,
    write_lock: Mutex<()>,
}

impl<T: Voxel> ChunkedStore<T> {
    /// Create an empty store of the given logical shape
    ///
    /// A directory location must not exist yet or be empty.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidShape` if any axis of `shape` or of the chunk
    /// shape is zero.
    pub fn allocate(shape: Shape3, config: &StoreConfig) -> Result<Self> {
        if shape.is_empty() {
            return Err(Error::InvalidShape {
                context: "store allocation",
                shape,
            });
        }
        config.validate()?;
        if let StoreLocation::Directory(path) = &config.location {
            ensure_vacant(path)?;
            fs::create_dir_all(path)?;
        }
        let store = Self {
            shape,
            chunk_shape: config.chunk_shape,
            layout: config.layout,
            compression: config.compression,
            backend: Backend::open(&config.location),
            write_lock: Mutex::new(()),
        };
        store.flush_metadata()?;
        log::debug!(
            "allocated {} store {} (chunks {})",
            T::DTYPE,
            shape,
            config.chunk_shape
        );
        Ok(store)
    }

    /// Allocate a store holding a copy of `volume`
    pub fn from_volume(volume: &Volume<T>, config: &StoreConfig) -> Result<Self> {
        let store = Self::allocate(volume.shape(), config)?;
        store.write_block(Shape3::zero(), volume)?;
        Ok(store)
    }

    /// Open a store previously written with [`persist`](Self::persist)
    ///
    /// The returned store is backed by the directory: later writes and
    /// resizes modify it in place.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref();
        let meta = serial::read_metadata(root)?;
        let config = meta.to_config::<T>(root)?;
        Ok(Self {
            shape: meta.shape,
            chunk_shape: config.chunk_shape,
            layout: config.layout,
            compression: config.compression,
            backend: Backend::open(&config.location),
            write_lock: Mutex::new(()),
        })
    }

    #[inline]
    pub fn shape(&self) -> Shape3 {
        self.shape
    }

    #[inline]
    pub fn chunk_shape(&self) -> Shape3 {
        self.chunk_shape
    }

    #[inline]
    pub fn layout(&self) -> ChunkLayout {
        self.layout
    }

    #[inline]
    pub fn compression(&self) -> Compression {
        self.compression
    }

    #[inline]
    pub fn dtype(&self) -> DataType {
        T::DTYPE
    }

    /// Value reported for voxels that were never written
    #[inline]
    pub fn fill_value(&self) -> T {
        T::default()
    }

    /// Number of chunks along each axis
    pub fn grid_shape(&self) -> Shape3 {
        self.shape.div_ceil(self.chunk_shape)
    }

    pub fn num_voxels(&self) -> u64 {
        self.shape.num_elements()
    }

    /// Logical size of the voxel data in bytes
    pub fn nbytes(&self) -> u64 {
        self.num_voxels() * T::DTYPE.size() as u64
    }

    pub fn location(&self) -> StoreLocation {
        self.backend.location()
    }

    /// Backing directory, if any
    pub fn path(&self) -> Option<&Path> {
        match &self.backend {
            Backend::Directory(p) => Some(p),
            Backend::Memory(_) => None,
        }
    }

    /// Configuration that reproduces this store's layout at its location
    pub fn config(&self) -> StoreConfig {
        StoreConfig {
            chunk_shape: self.chunk_shape,
            layout: self.layout,
            location: self.location(),
            compression: self.compression,
        }
    }

    /// Number of chunks held by a memory-backed store
    pub fn resident_chunks(&self) -> Option<usize> {
        self.backend.resident_chunks()
    }

    /// Read the region `[origin, origin + size)` into a dense volume
    ///
    /// # Errors
    ///
    /// Returns `Error::OutOfBounds` if the region exceeds the logical shape,
    /// `Error::InvalidShape` if `size` is empty.
    pub fn read_block(&self, origin: Shape3, size: Shape3) -> Result<Volume<T>> {
        let region = Region::new(origin, size);
        self.check_region(region)?;
        let format = self.chunk_format();
        let mut out = Volume::filled(size, self.fill_value())?;
        for key in chunk_keys(region, self.chunk_shape) {
            let chunk_region = self.chunk_region(key);
            let Some(overlap) = region.intersect(&chunk_region) else {
                continue;
            };
            if let Some(chunk) = self.backend.read_chunk(key, &format)? {
                copy_box(
                    &chunk,
                    self.chunk_shape,
                    overlap.origin.saturating_sub(chunk_region.origin),
                    out.data_mut(),
                    size,
                    overlap.origin.saturating_sub(origin),
                    overlap.size,
                );
            }
        }
        Ok(out)
    }

    /// Write `block` with its first voxel at `origin`
    ///
    /// Blocks need not align with chunk boundaries; partially covered
    /// chunks are read, patched and rewritten.
    ///
    /// # Errors
    ///
    /// Returns `Error::OutOfBounds` if the block exceeds the logical shape.
    pub fn write_block(&self, origin: Shape3, block: &Volume<T>) -> Result<()> {
        let region = Region::new(origin, block.shape());
        self.check_region(region)?;
        let format = self.chunk_format();
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        for key in chunk_keys(region, self.chunk_shape) {
            let chunk_region = self.chunk_region(key);
            let Some(overlap) = region.intersect(&chunk_region) else {
                continue;
            };
            let mut chunk = if overlap == chunk_region {
                vec![self.fill_value(); format.len]
            } else {
                self.backend
                    .read_chunk(key, &format)?
                    .unwrap_or_else(|| vec![self.fill_value(); format.len])
            };
            copy_box(
                block.data(),
                block.shape(),
                overlap.origin.saturating_sub(origin),
                &mut chunk,
                self.chunk_shape,
                overlap.origin.saturating_sub(chunk_region.origin),
                overlap.size,
            );
            self.backend.write_chunk(key, chunk, &format)?;
        }
        Ok(())
    }

    /// Read the whole array into memory
    pub fn to_volume(&self) -> Result<Volume<T>> {
        self.read_block(Shape3::zero(), self.shape)
    }

    /// Change the logical shape
    ///
    /// Shrinking drops chunks that fall entirely outside the new bounds and
    /// resets the out-of-bounds part of boundary chunks to the fill value,
    /// so growing again later exposes only fill values. Data inside both
    /// the old and the new shape is untouched.
    pub fn resize(&mut self, new_shape: Shape3) -> Result<()> {
        if new_shape.is_empty() {
            return Err(Error::InvalidShape {
                context: "store resize",
                shape: new_shape,
            });
        }
        let old_shape = self.shape;
        if !old_shape.all_le(new_shape) {
            let keep = Region::whole(new_shape);
            let format = self.chunk_format();
            for key in chunk_keys(Region::whole(old_shape), self.chunk_shape) {
                let chunk_region = self.chunk_region(key);
                match keep.intersect(&chunk_region) {
                    None => self.backend.erase_chunk(key, &format)?,
                    Some(overlap) if overlap == chunk_region => {}
                    Some(overlap) => {
                        if let Some(chunk) = self.backend.read_chunk(key, &format)? {
                            let mut kept = vec![self.fill_value(); format.len];
                            let offset = overlap.origin.saturating_sub(chunk_region.origin);
                            copy_box(
                                &chunk,
                                self.chunk_shape,
                                offset,
                                &mut kept,
                                self.chunk_shape,
                                offset,
                                overlap.size,
                            );
                            self.backend.write_chunk(key, kept, &format)?;
                        }
                    }
                }
            }
        }
        self.shape = new_shape;
        self.flush_metadata()?;
        log::debug!("resized store {} -> {}", old_shape, new_shape);
        Ok(())
    }

    /// Grow along Z by `slab.depth()` and write `slab` into the new region
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidShape` if the slab's (Y, X) extent differs
    /// from the store's.
    pub fn append_z(&mut self, slab: &Volume<T>) -> Result<()> {
        if slab.height() != self.shape.y || slab.width() != self.shape.x {
            return Err(Error::InvalidShape {
                context: "appended slab",
                shape: slab.shape(),
            });
        }
        let origin = Shape3::new(self.shape.z, 0, 0);
        self.resize(Shape3::new(
            self.shape.z + slab.depth(),
            self.shape.y,
            self.shape.x,
        ))?;
        self.write_block(origin, slab)
    }

    /// Write the store to `path` as a chunk directory
    ///
    /// An existing store directory at `path` is replaced. A directory store
    /// persisted onto its own path only refreshes its metadata.
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Backend::Directory(root) = &self.backend
            && same_path(root, path)
        {
            return self.flush_metadata();
        }
        remove_store_dir(path)?;
        fs::create_dir_all(path)?;
        serial::write_metadata(path, &self.metadata())?;
        let target = Backend::<T>::Directory(path.to_path_buf());
        let format = self.chunk_format();
        for key in chunk_keys(Region::whole(self.shape), self.chunk_shape) {
            if let Some(chunk) = self.backend.read_chunk(key, &format)? {
                target.write_chunk(key, chunk, &format)?;
            }
        }
        Ok(())
    }

    /// Copy into a new store with a possibly different configuration
    ///
    /// The copy proceeds in Z slabs one destination chunk deep, so at most
    /// one slab is held in memory.
    pub fn copy_to(&self, config: &StoreConfig) -> Result<Self> {
        let dest = Self::allocate(self.shape, config)?;
        let depth = config.chunk_shape.z;
        let mut z = 0;
        while z < self.shape.z {
            let dz = depth.min(self.shape.z - z);
            let slab = self.read_block(
                Shape3::new(z, 0, 0),
                Shape3::new(dz, self.shape.y, self.shape.x),
            )?;
            dest.write_block(Shape3::new(z, 0, 0), &slab)?;
            z += dz;
        }
        Ok(dest)
    }

    /// Allocate an empty store of `shape` with this store's chunking,
    /// alongside it: in memory for a memory store, in a `<dir>.next`
    /// sibling directory for a directory store.
    pub fn allocate_sibling(&self, shape: Shape3) -> Result<Self> {
        let mut config = self.config();
        if let StoreLocation::Directory(path) = &self.backend.location() {
            let scratch = sibling_path(path, "next");
            remove_store_dir(&scratch)?;
            config.location = StoreLocation::Directory(scratch);
        }
        Self::allocate(shape, &config)
    }

    /// Replace this store with `next`, taking over this store's location
    ///
    /// For directory stores the old directory is moved aside to
    /// `<dir>.old`, `next`'s directory is renamed into its place and the
    /// moved-aside copy is removed. If the rename fails the old directory
    /// is restored and `self` is left unchanged.
    pub fn replace_with(&mut self, mut next: Self) -> Result<()> {
        let old_path = self.path().map(Path::to_path_buf);
        let new_path = next.path().map(Path::to_path_buf);
        if let (Some(old), Some(new)) = (old_path, new_path)
            && old != new
        {
            let aside = sibling_path(&old, "old");
            remove_store_dir(&aside)?;
            fs::rename(&old, &aside)?;
            if let Err(e) = fs::rename(&new, &old) {
                fs::rename(&aside, &old)?;
                return Err(e.into());
            }
            if let Err(e) = fs::remove_dir_all(&aside) {
                log::warn!("could not remove {}: {}", aside.display(), e);
            }
            next.backend = Backend::Directory(old);
        }
        *self = next;
        Ok(())
    }

    fn metadata(&self) -> ArrayMetadata {
        ArrayMetadata::new(
            self.shape,
            self.chunk_shape,
            T::DTYPE,
            self.layout,
            self.compression,
        )
    }

    fn flush_metadata(&self) -> Result<()> {
        match &self.backend {
            Backend::Directory(root) => serial::write_metadata(root, &self.metadata()),
            Backend::Memory(_) => Ok(()),
        }
    }

    fn chunk_format(&self) -> ChunkFormat {
        ChunkFormat {
            layout: self.layout,
            compression: self.compression,
            len: self.chunk_shape.len(),
        }
    }

    fn chunk_region(&self, key: Shape3) -> Region {
        Region::new(key.mul(self.chunk_shape), self.chunk_shape)
    }

    fn check_region(&self, region: Region) -> Result<()> {
        if region.is_empty() {
            return Err(Error::InvalidShape {
                context: "block",
                shape: region.size,
            });
        }
        if !region.fits_within(self.shape) {
            return Err(Error::OutOfBounds {
                region,
                shape: self.shape,
            });
        }
        Ok(())
    }
}

impl<T: Voxel> fmt::Debug for ChunkedStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkedStore")
            .field("dtype", &T::DTYPE)
            .field("shape", &self.shape)
            .field("chunk_shape", &self.chunk_shape)
            .field("layout", &self.layout)
            .field("compression", &self.compression)
            .field("location", &self.location())
            .finish()
    }
}

/// Grid indices of every chunk overlapping `region`, in (z, y, x) order
fn chunk_keys(region: Region, chunk_shape: Shape3) -> impl Iterator<Item = Shape3> {
    let lo = region.origin.div(chunk_shape);
    let hi = region.end().div_ceil(chunk_shape);
    (lo.z..hi.z).flat_map(move |z| {
        (lo.y..hi.y).flat_map(move |y| (lo.x..hi.x).map(move |x| Shape3::new(z, y, x)))
    })
}

/// `<dir>.<suffix>` next to `path`
fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

fn same_path(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Fail unless `path` is absent or an empty directory
fn ensure_vacant(path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    if path.is_dir() && fs::read_dir(path)?.next().is_none() {
        return Ok(());
    }
    Err(Error::InvalidParameter(format!(
        "store location {} is not empty",
        path.display()
    )))
}

/// Remove a previous store directory at `path`
///
/// Only directories holding a `.zarray` (or empty ones) are removed; any
/// other existing path is an error.
pub fn remove_store_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    if path.join(ZARRAY).is_file() {
        fs::remove_dir_all(path)?;
        return Ok(());
    }
    ensure_vacant(path)
}
