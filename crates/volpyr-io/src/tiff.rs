//! TIFF slice and stack support
//!
//! Grayscale 8-, 16- and 32-bit TIFFs map one page to one Z slice. A
//! multipage TIFF is a whole volume; [`TiffPageReader`] and
//! [`TiffPageWriter`] stream it one page at a time.

use crate::codec::{Samples, slice_dimensions, slice_shape};
use crate::{IoError, IoResult};
use std::io::{Read, Seek, Write};
use tiff::ColorType;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{Gray8, Gray16, Gray32};
use tiff::encoder::{Compression, DeflateLevel, TiffEncoder};
use volpyr_core::{Volume, Voxel};

/// TIFF compression applied when writing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TiffCompression {
    /// No compression
    #[default]
    None,
    /// LZW compression
    Lzw,
    /// Deflate (zlib) compression
    Deflate,
    /// PackBits run-length compression
    PackBits,
}

impl TiffCompression {
    /// Convert to tiff crate's Compression enum
    fn to_tiff_compression(self) -> Compression {
        match self {
            TiffCompression::None => Compression::Uncompressed,
            TiffCompression::Lzw => Compression::Lzw,
            TiffCompression::Deflate => Compression::Deflate(DeflateLevel::default()),
            TiffCompression::PackBits => Compression::Packbits,
        }
    }
}

/// Sequential reader over the pages of a TIFF
pub struct TiffPageReader<R: Read + Seek> {
    decoder: Decoder<R>,
    exhausted: bool,
}

impl<R: Read + Seek> TiffPageReader<R> {
    pub fn new(reader: R) -> IoResult<Self> {
        let decoder = Decoder::new(reader)
            .map_err(|e| IoError::DecodeError(format!("TIFF decode error: {}", e)))?;
        Ok(Self {
            decoder,
            exhausted: false,
        })
    }

    /// Decode the next page, or `None` after the last one
    pub fn next_page<T: Voxel>(&mut self) -> IoResult<Option<Volume<T>>> {
        if self.exhausted {
            return Ok(None);
        }
        let page = decode_page(&mut self.decoder)?;
        if self.decoder.more_images() {
            self.decoder
                .next_image()
                .map_err(|e| IoError::DecodeError(format!("TIFF page navigation error: {}", e)))?;
        } else {
            self.exhausted = true;
        }
        Ok(Some(page))
    }
}

/// Read the first page of a TIFF as a depth-1 volume
pub fn read_tiff_slice<T: Voxel, R: Read + Seek>(reader: R) -> IoResult<Volume<T>> {
    let mut decoder = Decoder::new(reader)
        .map_err(|e| IoError::DecodeError(format!("TIFF decode error: {}", e)))?;
    decode_page(&mut decoder)
}

/// Read every page of a TIFF into one volume, page `i` at Z = `i`
///
/// # Errors
///
/// Returns `IoError::InconsistentSliceShapes` if a page's dimensions
/// differ from the first page's. The reported path is empty; callers that
/// know the file name should use [`TiffPageReader`] directly.
pub fn read_tiff_volume<T: Voxel, R: Read + Seek>(reader: R) -> IoResult<Volume<T>> {
    let mut pages = TiffPageReader::new(reader)?;
    let mut slices: Vec<Volume<T>> = Vec::new();
    while let Some(page) = pages.next_page()? {
        if let Some(first) = slices.first()
            && first.shape() != page.shape()
        {
            return Err(IoError::InconsistentSliceShapes {
                index: slices.len(),
                path: Default::default(),
                expected: first.shape(),
                actual: page.shape(),
            });
        }
        slices.push(page);
    }
    Ok(Volume::stack(&slices)?)
}

/// Get the number of pages in a TIFF file
pub fn tiff_page_count<R: Read + Seek>(reader: R) -> IoResult<usize> {
    let mut decoder = Decoder::new(reader)
        .map_err(|e| IoError::DecodeError(format!("TIFF decode error: {}", e)))?;

    let mut count = 1;
    while decoder.more_images() {
        decoder
            .next_image()
            .map_err(|e| IoError::DecodeError(format!("TIFF page navigation error: {}", e)))?;
        count += 1;
    }

    Ok(count)
}

/// Page-at-a-time multipage TIFF writer
pub struct TiffPageWriter<W: Write + Seek> {
    encoder: TiffEncoder<W>,
    pages: usize,
}

impl<W: Write + Seek> TiffPageWriter<W> {
    pub fn new(writer: W, compression: TiffCompression) -> IoResult<Self> {
        let encoder = TiffEncoder::new(writer)
            .map_err(|e| IoError::EncodeError(format!("TIFF encoder error: {}", e)))?
            .with_compression(compression.to_tiff_compression());
        Ok(Self { encoder, pages: 0 })
    }

    /// Append a depth-1 volume as the next page
    pub fn write_page<T: Voxel>(&mut self, slice: &Volume<T>) -> IoResult<()> {
        let (height, width) = slice_dimensions(slice)?;
        let result = match Samples::from_plane(slice.data()) {
            Samples::U8(data) => self.encoder.write_image::<Gray8>(width, height, &data),
            Samples::U16(data) => self.encoder.write_image::<Gray16>(width, height, &data),
            Samples::U32(data) => self.encoder.write_image::<Gray32>(width, height, &data),
        };
        result.map_err(|e| IoError::EncodeError(format!("TIFF write error: {}", e)))?;
        self.pages += 1;
        Ok(())
    }

    /// Number of pages written so far
    pub fn pages(&self) -> usize {
        self.pages
    }
}

/// Write a depth-1 volume as a single-page TIFF
pub fn write_tiff_slice<T: Voxel, W: Write + Seek>(
    slice: &Volume<T>,
    writer: W,
    compression: TiffCompression,
) -> IoResult<()> {
    let mut pages = TiffPageWriter::new(writer, compression)?;
    pages.write_page(slice)
}

/// Write a volume as a multipage TIFF, one page per Z slice
pub fn write_tiff_volume<T: Voxel, W: Write + Seek>(
    volume: &Volume<T>,
    writer: W,
    compression: TiffCompression,
) -> IoResult<()> {
    let mut pages = TiffPageWriter::new(writer, compression)?;
    for z in 0..volume.depth() {
        pages.write_page(&volume.slice(z)?)?;
    }
    Ok(())
}

/// Decode the page at the current decoder position
fn decode_page<T: Voxel, R: Read + Seek>(decoder: &mut Decoder<R>) -> IoResult<Volume<T>> {
    let (width, height) = decoder
        .dimensions()
        .map_err(|e| IoError::DecodeError(format!("Failed to get TIFF dimensions: {}", e)))?;
    let color_type = decoder
        .colortype()
        .map_err(|e| IoError::DecodeError(format!("Failed to get TIFF color type: {}", e)))?;
    if !matches!(color_type, ColorType::Gray(8 | 16 | 32)) {
        return Err(IoError::UnsupportedFormat(format!(
            "unsupported TIFF color type: {:?}",
            color_type
        )));
    }

    let image_data = decoder
        .read_image()
        .map_err(|e| IoError::DecodeError(format!("Failed to read TIFF image data: {}", e)))?;

    let samples = match image_data {
        DecodingResult::U8(data) => Samples::U8(data),
        DecodingResult::U16(data) => Samples::U16(data),
        DecodingResult::U32(data) => Samples::U32(data),
        _ => {
            return Err(IoError::UnsupportedFormat(
                "TIFF sample format is not unsigned integer".to_string(),
            ));
        }
    };
    let slice = samples.into_slice(height, width)?;
    debug_assert_eq!(slice.shape(), slice_shape(height as u64, width as u64));
    Ok(slice)
}
