//! Voxel element types
//!
//! Pyramid levels store fixed-width unsigned integers. The element type is
//! a type parameter on every container, so it cannot change between levels.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Runtime tag for a voxel element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    UInt8,
    UInt16,
    UInt32,
}

impl DataType {
    /// Size of one element in bytes
    pub fn size(self) -> usize {
        match self {
            DataType::UInt8 => 1,
            DataType::UInt16 => 2,
            DataType::UInt32 => 4,
        }
    }

    /// Zarr v2 dtype string (`|u1`, `<u2`, `<u4`)
    pub fn zarr_dtype(self) -> &'static str {
        match self {
            DataType::UInt8 => "|u1",
            DataType::UInt16 => "<u2",
            DataType::UInt32 => "<u4",
        }
    }

    /// Parse a zarr v2 dtype string
    pub fn from_zarr_dtype(s: &str) -> Option<Self> {
        match s {
            "|u1" | "<u1" => Some(DataType::UInt8),
            "<u2" => Some(DataType::UInt16),
            "<u4" => Some(DataType::UInt32),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::UInt8 => "uint8",
            DataType::UInt16 => "uint16",
            DataType::UInt32 => "uint32",
        };
        f.write_str(name)
    }
}

/// An unsigned integer voxel element.
///
/// Conversions go through `u64`, which is wide enough to hold the sum of
/// a full 2×2×2 aggregation window for every implementor.
pub trait Voxel:
    Copy + Default + PartialEq + Eq + Ord + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    /// Runtime tag for this element type
    const DTYPE: DataType;

    /// Largest representable value
    const MAX: Self;

    /// Widen to `u64`
    fn to_u64(self) -> u64;

    /// Narrow from `u64`, or `None` if the value does not fit
    fn from_u64(v: u64) -> Option<Self>;

    /// Append the little-endian encoding of `self` to `out`
    fn write_le(self, out: &mut Vec<u8>);

    /// Decode from exactly `Self::DTYPE.size()` little-endian bytes
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! impl_voxel {
    ($t:ty, $dtype:expr) => {
        impl Voxel for $t {
            const DTYPE: DataType = $dtype;
            const MAX: Self = <$t>::MAX;

            #[inline]
            fn to_u64(self) -> u64 {
                self as u64
            }

            #[inline]
            fn from_u64(v: u64) -> Option<Self> {
                <$t>::try_from(v).ok()
            }

            #[inline]
            fn write_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            #[inline]
            fn read_le(bytes: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$t>()];
                buf.copy_from_slice(bytes);
                <$t>::from_le_bytes(buf)
            }
        }
    };
}

impl_voxel!(u8, DataType::UInt8);
impl_voxel!(u16, DataType::UInt16);
impl_voxel!(u32, DataType::UInt32);
