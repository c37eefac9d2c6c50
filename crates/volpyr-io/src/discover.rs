//! Slice discovery
//!
//! Lists the slice files of a directory in Z order. Filesystem
//! enumeration order is unspecified, so the order is always explicit.

use crate::{IoError, IoResult};
use std::fs;
use std::path::{Path, PathBuf};

/// How slice files are ordered along Z
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SliceOrder {
    /// Lexicographic by file name
    #[default]
    FileName,
    /// By the last run of decimal digits in the file stem, ties by name
    ///
    /// `img_2.tif` sorts before `img_10.tif`.
    TrailingIndex,
}

/// Last run of decimal digits in the file stem, e.g. `12` for
/// `scan12_crop.tif`
pub fn trailing_index(path: &Path) -> Option<u64> {
    let stem = path.file_stem()?.to_str()?;
    let end = stem.rfind(|c: char| c.is_ascii_digit())? + 1;
    let start = stem[..end]
        .rfind(|c: char| !c.is_ascii_digit())
        .map_or(0, |i| i + 1);
    stem[start..end].parse().ok()
}

/// List files in `dir` whose extension is in `extensions`
/// (case-insensitive), ordered by `order`
///
/// # Errors
///
/// With [`SliceOrder::TrailingIndex`], a file name without digits is an
/// `IoError::InvalidData`.
pub fn discover_slices(
    dir: impl AsRef<Path>,
    extensions: &[&str],
    order: SliceOrder,
) -> IoResult<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)));
        if matches {
            files.push(path);
        }
    }

    match order {
        SliceOrder::FileName => files.sort_by(|a, b| a.file_name().cmp(&b.file_name())),
        SliceOrder::TrailingIndex => {
            let mut keyed = files
                .into_iter()
                .map(|p| match trailing_index(&p) {
                    Some(i) => Ok((i, p)),
                    None => Err(IoError::InvalidData(format!(
                        "no slice index in file name {}",
                        p.display()
                    ))),
                })
                .collect::<IoResult<Vec<_>>>()?;
            keyed.sort_by(|(ia, a), (ib, b)| ia.cmp(ib).then_with(|| a.file_name().cmp(&b.file_name())));
            files = keyed.into_iter().map(|(_, p)| p).collect();
        }
    }

    log::debug!("found {} slices in {}", files.len(), dir.display());
    Ok(files)
}
