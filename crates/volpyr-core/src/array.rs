//! PyramidArray - one resolution level of a pyramid
//!
//! A `PyramidArray` owns the chunked store holding the voxels of its
//! current level together with the level counter. Level 0 is the ingested
//! volume; every downsample replaces the store contents with the next
//! coarser level and increments the counter.

use crate::error::Result;
use crate::shape::Shape3;
use crate::store::serial::{self, PyramidAttributes};
use crate::store::{ChunkedStore, StoreConfig};
use crate::voxel::{DataType, Voxel};
use crate::volume::Volume;
use std::path::Path;

/// A chunked array tagged with its pyramid level
#[derive(Debug)]
pub struct PyramidArray<T: Voxel> {
    store: ChunkedStore<T>,
    level: u32,
}

impl<T: Voxel> PyramidArray<T> {
    /// Wrap a store as level 0
    pub fn new(store: ChunkedStore<T>) -> Self {
        Self::with_level(store, 0)
    }

    pub fn with_level(store: ChunkedStore<T>, level: u32) -> Self {
        Self { store, level }
    }

    /// Level-0 array holding a copy of `volume`
    pub fn from_volume(volume: &Volume<T>, config: &StoreConfig) -> Result<Self> {
        Ok(Self::new(ChunkedStore::from_volume(volume, config)?))
    }

    /// Empty level-0 array
    pub fn allocate(shape: Shape3, config: &StoreConfig) -> Result<Self> {
        Ok(Self::new(ChunkedStore::allocate(shape, config)?))
    }

    #[inline]
    pub fn shape(&self) -> Shape3 {
        self.store.shape()
    }

    #[inline]
    pub fn level(&self) -> u32 {
        self.level
    }

    #[inline]
    pub fn dtype(&self) -> DataType {
        T::DTYPE
    }

    #[inline]
    pub fn chunk_shape(&self) -> Shape3 {
        self.store.chunk_shape()
    }

    /// Logical size of the current level in bytes
    pub fn nbytes(&self) -> u64 {
        self.store.nbytes()
    }

    pub fn store(&self) -> &ChunkedStore<T> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ChunkedStore<T> {
        &mut self.store
    }

    pub fn into_store(self) -> ChunkedStore<T> {
        self.store
    }

    /// Swap in the store holding the next level, taking over the old
    /// store's location.
    pub fn replace_store(&mut self, next: ChunkedStore<T>) -> Result<()> {
        self.store.replace_with(next)
    }

    /// Record that the store now holds the next coarser level
    pub fn advance_level(&mut self) {
        self.level += 1;
    }

    /// Persist the current level to `path`, including its level attribute
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.store.persist(path)?;
        serial::write_attributes(path, &PyramidAttributes { level: self.level })
    }

    /// Load a level written by [`save`](Self::save) into memory
    ///
    /// The result is a working copy with the saved chunking; downsampling
    /// it leaves the level directory untouched. Stores without a `.zattrs`
    /// file load as level 0.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let (stored, level) = open_level::<T>(path.as_ref())?;
        let config = stored.config().in_memory();
        Ok(Self::with_level(stored.copy_to(&config)?, level))
    }

    /// Copy a saved level into a new store described by `config`
    ///
    /// Use a directory location to work on levels that do not fit in
    /// memory. The location must not be the level directory itself.
    pub fn load_into(path: impl AsRef<Path>, config: &StoreConfig) -> Result<Self> {
        let (stored, level) = open_level::<T>(path.as_ref())?;
        Ok(Self::with_level(stored.copy_to(config)?, level))
    }

    /// Read the whole level into memory
    pub fn to_volume(&self) -> Result<Volume<T>> {
        self.store.to_volume()
    }
}

fn open_level<T: Voxel>(path: &Path) -> Result<(ChunkedStore<T>, u32)> {
    let stored = ChunkedStore::load(path)?;
    let level = serial::read_attributes(path)?.map_or(0, |a| a.level);
    Ok((stored, level))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_load_keeps_level() {
        let dir = std::env::temp_dir().join(format!("volpyr_array_{}", std::process::id()));
        std::fs::remove_dir_all(&dir).ok();
        let vol = Volume::<u16>::from_fn(Shape3::new(3, 4, 5), |z, y, x| (z + y + x) as u16).unwrap();
        let config = StoreConfig::default().with_chunk_shape(Shape3::splat(2));
        let mut array = PyramidArray::from_volume(&vol, &config).unwrap();
        array.advance_level();
        array.advance_level();
        array.save(&dir).unwrap();

        let loaded = PyramidArray::<u16>::load(&dir).unwrap();
        assert_eq!(loaded.level(), 2);
        assert_eq!(loaded.shape(), vol.shape());
        assert_eq!(loaded.to_volume().unwrap(), vol);
        assert_eq!(loaded.store().path(), None);
        assert_eq!(loaded.chunk_shape(), Shape3::splat(2));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_loaded_copy_does_not_alias_level() {
        let dir = std::env::temp_dir().join(format!("volpyr_array_copy_{}", std::process::id()));
        std::fs::remove_dir_all(&dir).ok();
        let vol = Volume::filled(Shape3::new(4, 4, 4), 3u8).unwrap();
        let config = StoreConfig::default().with_chunk_shape(Shape3::splat(2));
        PyramidArray::from_volume(&vol, &config).unwrap().save(dir.join("level")).unwrap();

        let work_config = config.clone().in_directory(dir.join("work"));
        let mut working = PyramidArray::<u8>::load_into(dir.join("level"), &work_config).unwrap();
        working.store_mut().resize(Shape3::splat(1)).unwrap();
        assert_eq!(working.store().path(), Some(dir.join("work").as_path()));

        let level = PyramidArray::<u8>::load(dir.join("level")).unwrap();
        assert_eq!(level.shape(), Shape3::new(4, 4, 4));
        assert_eq!(level.to_volume().unwrap(), vol);

        let into_itself = config.in_directory(dir.join("level"));
        assert!(PyramidArray::<u8>::load_into(dir.join("level"), &into_itself).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }
}
