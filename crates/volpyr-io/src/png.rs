//! PNG slice support
//!
//! Only single-channel grayscale at 8 or 16 bits per sample is accepted;
//! 16-bit samples are big-endian on disk.

use crate::codec::{Samples, slice_dimensions};
use crate::{IoError, IoResult};
use png::{BitDepth, ColorType, Decoder, Encoder};
use std::io::{BufRead, Seek, Write};
use volpyr_core::{DataType, Volume, Voxel};

/// Read a grayscale PNG as a depth-1 volume
pub fn read_png_slice<T: Voxel, R: BufRead + Seek>(reader: R) -> IoResult<Volume<T>> {
    let decoder = Decoder::new(reader);
    let mut reader = decoder
        .read_info()
        .map_err(|e| IoError::DecodeError(format!("PNG decode error: {}", e)))?;

    let info = reader.info();
    let width = info.width;
    let height = info.height;
    let color_type = info.color_type;
    let bit_depth = info.bit_depth;
    if color_type != ColorType::Grayscale
        || !matches!(bit_depth, BitDepth::Eight | BitDepth::Sixteen)
    {
        return Err(IoError::UnsupportedFormat(format!(
            "unsupported PNG format: {:?} {:?}",
            color_type, bit_depth
        )));
    }

    let buf_size = reader
        .output_buffer_size()
        .ok_or_else(|| IoError::DecodeError("failed to get output buffer size".to_string()))?;
    let mut buf = vec![0; buf_size];
    let output_info = reader
        .next_frame(&mut buf)
        .map_err(|e| IoError::DecodeError(format!("PNG frame error: {}", e)))?;

    let bytes_per_row = output_info.line_size;
    let data = &buf[..output_info.buffer_size()];
    let (w, h) = (width as usize, height as usize);

    let samples = if bit_depth == BitDepth::Sixteen {
        let mut out = Vec::with_capacity(w * h);
        for y in 0..h {
            let row = &data[y * bytes_per_row..y * bytes_per_row + w * 2];
            out.extend(row.chunks_exact(2).map(|b| u16::from_be_bytes([b[0], b[1]])));
        }
        Samples::U16(out)
    } else {
        let mut out = Vec::with_capacity(w * h);
        for y in 0..h {
            out.extend_from_slice(&data[y * bytes_per_row..y * bytes_per_row + w]);
        }
        Samples::U8(out)
    };

    samples.into_slice(height, width)
}

/// Write a depth-1 volume as a grayscale PNG
///
/// # Errors
///
/// Returns `IoError::UnsupportedFormat` for 32-bit voxels, which PNG
/// cannot hold.
pub fn write_png_slice<T: Voxel, W: Write>(slice: &Volume<T>, writer: W) -> IoResult<()> {
    let (height, width) = slice_dimensions(slice)?;
    let (bit_depth, bytes) = match Samples::from_plane(slice.data()) {
        Samples::U8(data) => (BitDepth::Eight, data),
        Samples::U16(data) => (
            BitDepth::Sixteen,
            data.iter().flat_map(|v| v.to_be_bytes()).collect(),
        ),
        Samples::U32(_) => {
            return Err(IoError::UnsupportedFormat(format!(
                "PNG cannot store {} samples",
                DataType::UInt32
            )));
        }
    };

    let mut encoder = Encoder::new(writer, width, height);
    encoder.set_color(ColorType::Grayscale);
    encoder.set_depth(bit_depth);

    let mut writer = encoder
        .write_header()
        .map_err(|e| IoError::EncodeError(format!("PNG header error: {}", e)))?;
    writer
        .write_image_data(&bytes)
        .map_err(|e| IoError::EncodeError(format!("PNG write error: {}", e)))?;
    writer
        .finish()
        .map_err(|e| IoError::EncodeError(format!("PNG finish error: {}", e)))?;

    Ok(())
}
