//! Multi-resolution pyramid construction
//!
//! [`build_pyramid`] repeatedly downsamples an array and persists each new
//! level under `output_dir/RES(<Z>x<Y>x<X>)`. A level is written to a
//! `.partial` sibling first and renamed into place once complete, so a
//! directory under its final name always holds a whole level.

use crate::downsample::{DownsampleOptions, downsample};
use crate::{TransformError, TransformResult};
use std::fs;
use std::path::{Path, PathBuf};
use volpyr_core::{Observer, Operation, PyramidArray, Shape3, Voxel, observe, remove_store_dir};

/// Options for [`build_pyramid`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PyramidOptions {
    pub downsample: DownsampleOptions,
    /// Also persist the input level before the first downsample
    pub persist_level0: bool,
}

impl PyramidOptions {
    pub fn with_downsample(mut self, downsample: DownsampleOptions) -> Self {
        self.downsample = downsample;
        self
    }

    pub fn with_persist_level0(mut self, persist_level0: bool) -> Self {
        self.persist_level0 = persist_level0;
        self
    }
}

/// Directory name of a level: `RES(<Z>x<Y>x<X>)`
///
/// # Examples
///
/// ```
/// use volpyr_core::Shape3;
/// use volpyr_transform::level_name;
///
/// assert_eq!(level_name(Shape3::new(50, 51, 1)), "RES(50x51x1)");
/// ```
pub fn level_name(shape: Shape3) -> String {
    format!("RES({shape})")
}

/// Persist the current level of `array` into `output_dir`
///
/// Returns the final level directory. An existing level directory of the
/// same name is replaced.
pub fn persist_level<T: Voxel>(
    array: &PyramidArray<T>,
    output_dir: &Path,
) -> TransformResult<PathBuf> {
    let name = level_name(array.shape());
    let target = output_dir.join(&name);

    // A directory-backed array that already lives at the target
    if array.store().path() == Some(target.as_path()) {
        array.save(&target)?;
        return Ok(target);
    }

    let partial = output_dir.join(format!("{name}.partial"));
    remove_store_dir(&partial)?;
    array.save(&partial)?;
    remove_store_dir(&target)?;
    fs::rename(&partial, &target).map_err(|source| TransformError::Io {
        path: target.clone(),
        source,
    })?;
    log::debug!("level {} written to {}", array.level(), target.display());
    Ok(target)
}

/// Build `levels` coarser levels of `array`, persisting each
///
/// # Arguments
///
/// * `array` - Level to start from; left holding the coarsest level. A
///   directory-backed array stored inside `output_dir` is first copied to
///   a `<dir>.work` sibling, and the copy is downsampled instead.
/// * `levels` - Number of downsample steps
/// * `output_dir` - Parent directory of the level directories; created if
///   missing
/// * `options` - Downsample options and whether to persist the input level
/// * `observer` - Receives a `Downsample` and a `Persist` event per level
///
/// # Returns
///
/// The level directories in the order they were written.
///
/// # Errors
///
/// Stops at the first failure with `TransformError::Level` naming the level
/// being produced. Levels written before the failure remain on disk.
pub fn build_pyramid<T: Voxel>(
    array: &mut PyramidArray<T>,
    levels: u32,
    output_dir: impl AsRef<Path>,
    options: &PyramidOptions,
    observer: &dyn Observer,
) -> TransformResult<Vec<PathBuf>> {
    let output_dir = output_dir.as_ref();
    fs::create_dir_all(output_dir).map_err(|source| TransformError::Io {
        path: output_dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::with_capacity(levels as usize + 1);
    if options.persist_level0 {
        let level = array.level();
        let path = persist_observed(array, output_dir, observer).map_err(|e| at_level(level, e))?;
        written.push(path);
    }
    if levels > 0 {
        let level = array.level() + 1;
        detach_from_output(array, output_dir).map_err(|e| at_level(level, e))?;
    }

    for _ in 0..levels {
        let level = array.level() + 1;
        let step = |array: &mut PyramidArray<T>| -> TransformResult<PathBuf> {
            let shape = array.shape().halved();
            observe(
                observer,
                Operation::Downsample { level, shape },
                |_| shape.num_elements() * T::DTYPE.size() as u64,
                || downsample(array, &options.downsample),
            )?;
            persist_observed(array, output_dir, observer)
        };
        let path = step(array).map_err(|e| at_level(level, e))?;
        written.push(path);
    }

    Ok(written)
}

fn persist_observed<T: Voxel>(
    array: &PyramidArray<T>,
    output_dir: &Path,
    observer: &dyn Observer,
) -> TransformResult<PathBuf> {
    let path = output_dir.join(level_name(array.shape()));
    observe(
        observer,
        Operation::Persist { path },
        |_| array.nbytes(),
        || persist_level(array, output_dir),
    )
}

/// Keep downsampling away from published level directories
fn detach_from_output<T: Voxel>(
    array: &mut PyramidArray<T>,
    output_dir: &Path,
) -> TransformResult<()> {
    let Some(path) = array.store().path().map(Path::to_path_buf) else {
        return Ok(());
    };
    if !is_within(&path, output_dir) {
        return Ok(());
    }
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".work");
    let work = path.with_file_name(name);
    remove_store_dir(&work)?;
    let copy = array
        .store()
        .copy_to(&array.store().config().in_directory(&work))?;
    log::debug!("working on a copy of {} in {}", path.display(), work.display());
    *array = PyramidArray::with_level(copy, array.level());
    Ok(())
}

fn is_within(path: &Path, dir: &Path) -> bool {
    match (path.canonicalize(), dir.canonicalize()) {
        (Ok(path), Ok(dir)) => path.starts_with(dir),
        _ => path.starts_with(dir),
    }
}

fn at_level(level: u32, e: TransformError) -> TransformError {
    TransformError::Level {
        level,
        source: Box::new(e),
    }
}
