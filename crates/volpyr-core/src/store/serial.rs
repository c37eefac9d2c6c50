//! On-disk encoding for chunked stores
//!
//! A store directory follows the zarr v2 layout:
//!
//! ```text
//! <root>/.zarray        JSON array metadata
//! <root>/.zattrs        JSON attributes (pyramid level), optional
//! <root>/0/0/0          chunk (0, 0, 0), nested layout
//! <root>/0.0.1          chunk (0, 0, 1), flat layout
//! ```
//!
//! Every chunk file holds the full chunk shape in C order, little-endian,
//! optionally zlib-compressed. Voxels past the array edge are stored as the
//! fill value. A missing chunk file reads as all fill.

use crate::error::{Error, Result};
use crate::shape::Shape3;
use crate::store::{ChunkLayout, Compression, StoreConfig, StoreLocation};
use crate::voxel::{DataType, Voxel};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Metadata file name
pub const ZARRAY: &str = ".zarray";

/// Attributes file name
pub const ZATTRS: &str = ".zattrs";

const ZARR_FORMAT: u32 = 2;

/// Contents of `.zarray`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayMetadata {
    pub zarr_format: u32,
    pub shape: Shape3,
    pub chunks: Shape3,
    pub dtype: String,
    pub compressor: Option<CompressorMetadata>,
    pub fill_value: u64,
    pub order: String,
    pub filters: Option<Vec<serde_json::Value>>,
    #[serde(default = "default_separator")]
    pub dimension_separator: String,
}

fn default_separator() -> String {
    ".".to_string()
}

/// `compressor` entry of `.zarray`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressorMetadata {
    pub id: String,
    #[serde(default = "default_level")]
    pub level: u8,
}

fn default_level() -> u8 {
    1
}

/// Contents of `.zattrs`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PyramidAttributes {
    /// Pyramid level, 0 at full resolution
    pub level: u32,
}

impl ArrayMetadata {
    pub(crate) fn new(
        shape: Shape3,
        chunks: Shape3,
        dtype: DataType,
        layout: ChunkLayout,
        compression: Compression,
    ) -> Self {
        let compressor = match compression {
            Compression::None => None,
            Compression::Zlib(level) => Some(CompressorMetadata {
                id: "zlib".to_string(),
                level,
            }),
        };
        Self {
            zarr_format: ZARR_FORMAT,
            shape,
            chunks,
            dtype: dtype.zarr_dtype().to_string(),
            compressor,
            fill_value: 0,
            order: "C".to_string(),
            filters: None,
            dimension_separator: layout.separator().to_string(),
        }
    }

    /// Check the metadata against voxel type `T` and derive the store
    /// configuration it describes.
    pub(crate) fn to_config<T: Voxel>(&self, root: &Path) -> Result<StoreConfig> {
        if self.zarr_format != ZARR_FORMAT {
            return Err(Error::Metadata(format!(
                "unsupported zarr_format {}",
                self.zarr_format
            )));
        }
        let dtype = DataType::from_zarr_dtype(&self.dtype)
            .ok_or_else(|| Error::Metadata(format!("unsupported dtype {:?}", self.dtype)))?;
        if dtype != T::DTYPE {
            return Err(Error::DataTypeMismatch {
                expected: T::DTYPE,
                actual: dtype,
            });
        }
        if self.order != "C" {
            return Err(Error::Metadata(format!("unsupported order {:?}", self.order)));
        }
        if self.fill_value != 0 {
            return Err(Error::Metadata(format!(
                "unsupported fill_value {}",
                self.fill_value
            )));
        }
        if self.filters.as_ref().is_some_and(|f| !f.is_empty()) {
            return Err(Error::Metadata("filters are not supported".to_string()));
        }
        let layout = ChunkLayout::from_separator(&self.dimension_separator).ok_or_else(|| {
            Error::Metadata(format!(
                "unsupported dimension_separator {:?}",
                self.dimension_separator
            ))
        })?;
        let compression = match &self.compressor {
            None => Compression::None,
            Some(c) if c.id == "zlib" => Compression::Zlib(c.level),
            Some(c) => {
                return Err(Error::Metadata(format!("unsupported compressor {:?}", c.id)));
            }
        };
        if self.shape.is_empty() || self.chunks.is_empty() {
            return Err(Error::InvalidShape {
                context: "stored array",
                shape: if self.shape.is_empty() {
                    self.shape
                } else {
                    self.chunks
                },
            });
        }
        Ok(StoreConfig {
            chunk_shape: self.chunks,
            layout,
            location: StoreLocation::Directory(root.to_path_buf()),
            compression,
        })
    }
}

pub(crate) fn write_metadata(root: &Path, meta: &ArrayMetadata) -> Result<()> {
    fs::create_dir_all(root)?;
    let json = serde_json::to_string_pretty(meta)?;
    fs::write(root.join(ZARRAY), json)?;
    Ok(())
}

/// Read `.zarray` from a store directory
pub fn read_metadata(root: impl AsRef<Path>) -> Result<ArrayMetadata> {
    let text = fs::read_to_string(root.as_ref().join(ZARRAY))?;
    Ok(serde_json::from_str(&text)?)
}

/// Write `.zattrs` into a store directory
pub fn write_attributes(root: impl AsRef<Path>, attrs: &PyramidAttributes) -> Result<()> {
    let json = serde_json::to_string_pretty(attrs)?;
    fs::write(root.as_ref().join(ZATTRS), json)?;
    Ok(())
}

/// Read `.zattrs`, or `None` if the store has no attributes file
pub fn read_attributes(root: impl AsRef<Path>) -> Result<Option<PyramidAttributes>> {
    match fs::read_to_string(root.as_ref().join(ZATTRS)) {
        Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Encode a full chunk to its file representation
pub(crate) fn encode_chunk<T: Voxel>(data: &[T], compression: Compression) -> Vec<u8> {
    let mut raw = Vec::with_capacity(data.len() * T::DTYPE.size());
    for &v in data {
        v.write_le(&mut raw);
    }
    match compression {
        Compression::None => raw,
        Compression::Zlib(level) => miniz_oxide::deflate::compress_to_vec_zlib(&raw, level),
    }
}

/// Decode a chunk file holding exactly `len` voxels
pub(crate) fn decode_chunk<T: Voxel>(
    key: &str,
    bytes: &[u8],
    len: usize,
    compression: Compression,
) -> Result<Vec<T>> {
    let inflated;
    let raw = match compression {
        Compression::None => bytes,
        Compression::Zlib(_) => {
            inflated = miniz_oxide::inflate::decompress_to_vec_zlib(bytes).map_err(|e| {
                Error::Chunk {
                    key: key.to_string(),
                    message: format!("zlib inflate failed: {:?}", e.status),
                }
            })?;
            &inflated[..]
        }
    };
    let size = T::DTYPE.size();
    if raw.len() != len * size {
        return Err(Error::Chunk {
            key: key.to_string(),
            message: format!("expected {} bytes, found {}", len * size, raw.len()),
        });
    }
    Ok(raw.chunks_exact(size).map(T::read_le).collect())
}
