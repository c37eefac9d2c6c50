//! Chunk backends
//!
//! A backend maps chunk grid indices to full chunk buffers. It knows
//! nothing about the array shape; the store above it decides which chunks
//! exist and which voxels of a chunk are meaningful.

use crate::error::{Error, Result};
use crate::shape::Shape3;
use crate::store::serial::{decode_chunk, encode_chunk};
use crate::store::{ChunkLayout, Compression, StoreLocation};
use crate::voxel::Voxel;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// How chunks are named and encoded
#[derive(Debug, Clone, Copy)]
pub(crate) struct ChunkFormat {
    pub layout: ChunkLayout,
    pub compression: Compression,
    /// Voxels per chunk
    pub len: usize,
}

pub(crate) enum Backend<T: Voxel> {
    Memory(RwLock<HashMap<Shape3, Vec<T>>>),
    Directory(PathBuf),
}

impl<T: Voxel> Backend<T> {
    pub(crate) fn open(location: &StoreLocation) -> Self {
        match location {
            StoreLocation::Memory => Backend::Memory(RwLock::new(HashMap::new())),
            StoreLocation::Directory(path) => Backend::Directory(path.clone()),
        }
    }

    pub(crate) fn location(&self) -> StoreLocation {
        match self {
            Backend::Memory(_) => StoreLocation::Memory,
            Backend::Directory(path) => StoreLocation::Directory(path.clone()),
        }
    }

    pub(crate) fn read_chunk(&self, key: Shape3, format: &ChunkFormat) -> Result<Option<Vec<T>>> {
        match self {
            Backend::Memory(map) => {
                let map = map.read().unwrap_or_else(|e| e.into_inner());
                Ok(map.get(&key).cloned())
            }
            Backend::Directory(root) => {
                let path = chunk_path(root, key, format.layout);
                match fs::read(&path) {
                    Ok(bytes) => {
                        let name = format.layout.chunk_key(key);
                        decode_chunk(&name, &bytes, format.len, format.compression).map(Some)
                    }
                    Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
                    Err(e) => Err(Error::Io(e)),
                }
            }
        }
    }

    pub(crate) fn write_chunk(&self, key: Shape3, data: Vec<T>, format: &ChunkFormat) -> Result<()> {
        debug_assert_eq!(data.len(), format.len);
        match self {
            Backend::Memory(map) => {
                let mut map = map.write().unwrap_or_else(|e| e.into_inner());
                map.insert(key, data);
                Ok(())
            }
            Backend::Directory(root) => {
                let path = chunk_path(root, key, format.layout);
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                // Readers never see a truncated chunk file
                let staged = staging_path(&path);
                fs::write(&staged, encode_chunk(&data, format.compression))?;
                fs::rename(&staged, &path)?;
                Ok(())
            }
        }
    }

    pub(crate) fn erase_chunk(&self, key: Shape3, format: &ChunkFormat) -> Result<()> {
        match self {
            Backend::Memory(map) => {
                let mut map = map.write().unwrap_or_else(|e| e.into_inner());
                map.remove(&key);
                Ok(())
            }
            Backend::Directory(root) => {
                match fs::remove_file(chunk_path(root, key, format.layout)) {
                    Ok(()) => Ok(()),
                    Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                    Err(e) => Err(Error::Io(e)),
                }
            }
        }
    }

    /// Number of chunks currently materialized (memory backend only)
    pub(crate) fn resident_chunks(&self) -> Option<usize> {
        match self {
            Backend::Memory(map) => Some(map.read().unwrap_or_else(|e| e.into_inner()).len()),
            Backend::Directory(_) => None,
        }
    }
}

/// File path of chunk `key` under `root`
pub(crate) fn chunk_path(root: &Path, key: Shape3, layout: ChunkLayout) -> PathBuf {
    match layout {
        ChunkLayout::Nested => root
            .join(key.z.to_string())
            .join(key.y.to_string())
            .join(key.x.to_string()),
        ChunkLayout::Flat => root.join(layout.chunk_key(key)),
    }
}

/// Temporary name a chunk file is written under before the rename
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_path_layouts() {
        let root = Path::new("/data/RES(2x2x2)");
        let key = Shape3::new(1, 0, 3);
        assert_eq!(
            chunk_path(root, key, ChunkLayout::Nested),
            Path::new("/data/RES(2x2x2)/1/0/3")
        );
        assert_eq!(
            chunk_path(root, key, ChunkLayout::Flat),
            Path::new("/data/RES(2x2x2)/1.0.3")
        );
    }

    #[test]
    fn test_directory_write_leaves_no_staging_file() {
        let root = std::env::temp_dir().join(format!("volpyr_backend_{}", std::process::id()));
        std::fs::remove_dir_all(&root).ok();
        let backend = Backend::<u16>::open(&StoreLocation::Directory(root.clone()));
        let format = ChunkFormat {
            layout: ChunkLayout::Nested,
            compression: Compression::None,
            len: 2,
        };
        let key = Shape3::new(0, 0, 1);
        backend.write_chunk(key, vec![5, 6], &format).unwrap();
        backend.write_chunk(key, vec![7, 8], &format).unwrap();
        assert_eq!(backend.read_chunk(key, &format).unwrap(), Some(vec![7, 8]));
        assert!(!root.join("0/0/1.partial").exists());
        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_memory_backend() {
        let backend = Backend::<u16>::open(&StoreLocation::Memory);
        let format = ChunkFormat {
            layout: ChunkLayout::Nested,
            compression: Compression::None,
            len: 4,
        };
        let key = Shape3::new(0, 1, 0);
        assert!(backend.read_chunk(key, &format).unwrap().is_none());
        backend.write_chunk(key, vec![1, 2, 3, 4], &format).unwrap();
        assert_eq!(backend.read_chunk(key, &format).unwrap(), Some(vec![1, 2, 3, 4]));
        assert_eq!(backend.resident_chunks(), Some(1));
        backend.erase_chunk(key, &format).unwrap();
        assert_eq!(backend.resident_chunks(), Some(0));
    }
}
