//! Slice codecs
//!
//! A [`SliceCodec`] turns one 2D image file into a depth-1 [`Volume`] and
//! back. The voxel type of the volume must match the sample width stored
//! in the file; no implicit widening or narrowing takes place.

use crate::format::{ImageFormat, detect_format};
use crate::{IoError, IoResult};
use std::path::Path;
use volpyr_core::{DataType, Shape3, Volume, Voxel};

/// Decode and encode single 2D slices
pub trait SliceCodec<T: Voxel>: Send + Sync {
    /// Decode the file at `path` into a volume of depth 1
    fn decode(&self, path: &Path) -> IoResult<Volume<T>>;

    /// Encode a depth-1 volume to `path`
    fn encode(&self, slice: &Volume<T>, path: &Path) -> IoResult<()>;

    /// File extension written by [`encode`](Self::encode), without the dot
    fn extension(&self) -> &'static str;
}

/// Grayscale samples as decoded from a file, before conversion to `T`
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Samples {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl Samples {
    pub(crate) fn dtype(&self) -> DataType {
        match self {
            Samples::U8(_) => DataType::UInt8,
            Samples::U16(_) => DataType::UInt16,
            Samples::U32(_) => DataType::UInt32,
        }
    }

    /// Copy the samples of a plane of `T`
    pub(crate) fn from_plane<T: Voxel>(plane: &[T]) -> Self {
        let widened = plane.iter().map(|v| v.to_u64());
        match T::DTYPE {
            DataType::UInt8 => Samples::U8(widened.map(|v| v as u8).collect()),
            DataType::UInt16 => Samples::U16(widened.map(|v| v as u16).collect()),
            DataType::UInt32 => Samples::U32(widened.map(|v| v as u32).collect()),
        }
    }

    /// Convert into a depth-1 volume of `height` × `width`
    ///
    /// # Errors
    ///
    /// Returns `Error::DataTypeMismatch` if the sample width differs from
    /// `T`'s.
    pub(crate) fn into_slice<T: Voxel>(self, height: u32, width: u32) -> IoResult<Volume<T>> {
        let actual = self.dtype();
        if actual != T::DTYPE {
            return Err(volpyr_core::Error::DataTypeMismatch {
                expected: T::DTYPE,
                actual,
            }
            .into());
        }
        let data: Vec<T> = match self {
            Samples::U8(d) => d.into_iter().filter_map(|v| T::from_u64(v as u64)).collect(),
            Samples::U16(d) => d.into_iter().filter_map(|v| T::from_u64(v as u64)).collect(),
            Samples::U32(d) => d.into_iter().filter_map(|v| T::from_u64(v as u64)).collect(),
        };
        let expected = height as usize * width as usize;
        if data.len() < expected {
            return Err(IoError::InvalidData(format!(
                "expected {} samples for {}x{}, found {}",
                expected,
                width,
                height,
                data.len()
            )));
        }
        let mut data = data;
        data.truncate(expected);
        Ok(Volume::from_slice_data(height as u64, width as u64, data)?)
    }
}

/// (height, width) of a depth-1 volume as encoder dimensions
pub(crate) fn slice_dimensions<T: Voxel>(slice: &Volume<T>) -> IoResult<(u32, u32)> {
    if slice.depth() != 1 {
        return Err(IoError::InvalidData(format!(
            "expected a single slice, got shape {}",
            slice.shape()
        )));
    }
    let height = u32::try_from(slice.height())
        .map_err(|_| IoError::InvalidData(format!("height {} too large", slice.height())))?;
    let width = u32::try_from(slice.width())
        .map_err(|_| IoError::InvalidData(format!("width {} too large", slice.width())))?;
    Ok((height, width))
}

/// (Y, X) extent of a slice as a depth-1 shape
pub(crate) fn slice_shape(height: u64, width: u64) -> Shape3 {
    Shape3::new(1, height, width)
}

/// TIFF slices
#[cfg(feature = "tiff-format")]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TiffCodec {
    pub compression: crate::tiff::TiffCompression,
}

#[cfg(feature = "tiff-format")]
impl TiffCodec {
    pub fn new(compression: crate::tiff::TiffCompression) -> Self {
        Self { compression }
    }
}

#[cfg(feature = "tiff-format")]
impl<T: Voxel> SliceCodec<T> for TiffCodec {
    fn decode(&self, path: &Path) -> IoResult<Volume<T>> {
        let file = std::fs::File::open(path)?;
        crate::tiff::read_tiff_slice(std::io::BufReader::new(file))
    }

    fn encode(&self, slice: &Volume<T>, path: &Path) -> IoResult<()> {
        let file = std::fs::File::create(path)?;
        crate::tiff::write_tiff_slice(slice, std::io::BufWriter::new(file), self.compression)
    }

    fn extension(&self) -> &'static str {
        ImageFormat::Tiff.extension()
    }
}

/// PNG slices (8- and 16-bit grayscale)
#[cfg(feature = "png-format")]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PngCodec;

#[cfg(feature = "png-format")]
impl<T: Voxel> SliceCodec<T> for PngCodec {
    fn decode(&self, path: &Path) -> IoResult<Volume<T>> {
        let file = std::fs::File::open(path)?;
        crate::png::read_png_slice(std::io::BufReader::new(file))
    }

    fn encode(&self, slice: &Volume<T>, path: &Path) -> IoResult<()> {
        let file = std::fs::File::create(path)?;
        crate::png::write_png_slice(slice, std::io::BufWriter::new(file))
    }

    fn extension(&self) -> &'static str {
        ImageFormat::Png.extension()
    }
}

/// Codec for a format, if support for it is compiled in
pub fn codec_for_format<T: Voxel>(format: ImageFormat) -> IoResult<Box<dyn SliceCodec<T>>> {
    match format {
        #[cfg(feature = "tiff-format")]
        ImageFormat::Tiff => Ok(Box::new(TiffCodec::default())),
        #[cfg(feature = "png-format")]
        ImageFormat::Png => Ok(Box::new(PngCodec)),
        #[allow(unreachable_patterns)]
        other => Err(IoError::UnsupportedFormat(format!(
            "{:?} support is not enabled",
            other
        ))),
    }
}

/// Codec for the format detected in the header of `path`
pub fn codec_for_path<T: Voxel>(path: impl AsRef<Path>) -> IoResult<Box<dyn SliceCodec<T>>> {
    codec_for_format(detect_format(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_type_must_match() {
        let samples = Samples::U16(vec![1, 2, 3, 4]);
        let vol: Volume<u16> = samples.clone().into_slice(2, 2).unwrap();
        assert_eq!(vol.shape(), Shape3::new(1, 2, 2));
        assert_eq!(vol.data(), &[1, 2, 3, 4]);
        let err = samples.into_slice::<u8>(2, 2).unwrap_err();
        assert!(matches!(
            err,
            IoError::Core(volpyr_core::Error::DataTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_samples_short_buffer() {
        let samples = Samples::U8(vec![1, 2, 3]);
        assert!(samples.into_slice::<u8>(2, 2).is_err());
    }

    #[test]
    fn test_from_plane() {
        assert_eq!(Samples::from_plane(&[7u32, 8]), Samples::U32(vec![7, 8]));
        assert_eq!(Samples::from_plane(&[7u8]).dtype(), DataType::UInt8);
    }

    #[test]
    fn test_slice_dimensions_rejects_stack() {
        let vol = Volume::<u8>::new(Shape3::new(2, 3, 4)).unwrap();
        assert!(slice_dimensions(&vol).is_err());
        let vol = Volume::<u8>::new(slice_shape(3, 4)).unwrap();
        assert_eq!(slice_dimensions(&vol).unwrap(), (3, 4));
    }
}
