//! Exporting pyramid levels
//!
//! Every export reads the level one Z plane at a time, so memory use is
//! bounded by a single plane regardless of the level's size. Output
//! directories are created when missing.

use crate::codec::SliceCodec;
use crate::{IoError, IoResult};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use volpyr_core::{Observer, Operation, PyramidArray, Shape3, Volume, Voxel, observe};

/// Per-level export subdirectory name: `<Z>x<Y>x<X>`
pub fn shape_dir_name(shape: Shape3) -> String {
    shape.to_string()
}

/// File name of slice `index`: `<base>_<iiii>.<ext>`
pub fn slice_file_name(base_name: &str, index: u64, extension: &str) -> String {
    format!("{base_name}_{index:04}.{extension}")
}

fn read_plane<T: Voxel>(array: &PyramidArray<T>, z: u64) -> IoResult<Volume<T>> {
    let shape = array.shape();
    Ok(array
        .store()
        .read_block(Shape3::new(z, 0, 0), Shape3::new(1, shape.y, shape.x))?)
}

fn create_parent(path: &Path) -> IoResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Persist the level as a chunk directory at `path`
pub fn export_chunked<T: Voxel>(array: &PyramidArray<T>, path: impl AsRef<Path>) -> IoResult<()> {
    let path = path.as_ref();
    create_parent(path)?;
    array.save(path)?;
    Ok(())
}

/// Write the level as one multipage TIFF, one page per Z slice
#[cfg(feature = "tiff-format")]
pub fn export_volume_tiff<T: Voxel>(
    array: &PyramidArray<T>,
    path: impl AsRef<Path>,
    compression: crate::tiff::TiffCompression,
) -> IoResult<()> {
    let path = path.as_ref();
    create_parent(path)?;
    let mut writer = BufWriter::new(File::create(path)?);
    {
        let mut pages = crate::tiff::TiffPageWriter::new(&mut writer, compression)?;
        for z in 0..array.shape().z {
            pages.write_page(&read_plane(array, z)?)?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Write every Z slice as `<dir>/<base>_<iiii>.<ext>`, indices from 0
///
/// # Returns
///
/// The written files in Z order.
pub fn export_slices<T: Voxel>(
    array: &PyramidArray<T>,
    dir: impl AsRef<Path>,
    base_name: &str,
    codec: &dyn SliceCodec<T>,
) -> IoResult<Vec<PathBuf>> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(array.shape().z as usize);
    for z in 0..array.shape().z {
        let path = dir.join(slice_file_name(base_name, z, codec.extension()));
        codec
            .encode(&read_plane(array, z)?, &path)
            .map_err(|e| IoError::Slice {
                index: z as usize,
                path: path.clone(),
                source: Box::new(e),
            })?;
        written.push(path);
    }
    Ok(written)
}

/// Write every Z slice as `<dir>/<base>_<iiii>.csv`
///
/// One line per row (Y), values separated by commas.
pub fn export_csv<T: Voxel>(
    array: &PyramidArray<T>,
    dir: impl AsRef<Path>,
    base_name: &str,
) -> IoResult<Vec<PathBuf>> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    let width = array.shape().x as usize;
    let mut written = Vec::with_capacity(array.shape().z as usize);
    for z in 0..array.shape().z {
        let path = dir.join(slice_file_name(base_name, z, "csv"));
        let plane = read_plane(array, z)?;
        let mut out = BufWriter::new(File::create(&path)?);
        for row in plane.data().chunks_exact(width) {
            let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
            writeln!(out, "{}", line.join(","))?;
        }
        out.flush()?;
        written.push(path);
    }
    Ok(written)
}

/// Run `export` on `array` and `path`, reporting an `Export` operation
///
/// # Examples
///
/// ```no_run
/// use volpyr_core::{LogObserver, PyramidArray};
/// use volpyr_io::{export_csv, export_observed};
///
/// let array = PyramidArray::<u16>::load("out/RES(2x4x4)").unwrap();
/// export_observed(&array, "out/csv", &LogObserver, |a, dir| export_csv(a, dir, "level1"))
///     .unwrap();
/// ```
pub fn export_observed<T, R, F>(
    array: &PyramidArray<T>,
    path: impl AsRef<Path>,
    observer: &dyn Observer,
    export: F,
) -> IoResult<R>
where
    T: Voxel,
    F: FnOnce(&PyramidArray<T>, &Path) -> IoResult<R>,
{
    let path = path.as_ref();
    observe(
        observer,
        Operation::Export {
            path: path.to_path_buf(),
        },
        |_| array.nbytes(),
        || export(array, path),
    )
}
