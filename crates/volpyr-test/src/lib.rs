//! volpyr-test - Regression test framework for volpyr
//!
//! Every integration test (`tests/*_reg.rs`) drives a [`RegParams`] that
//! counts comparisons, records failures and reports a summary banner:
//!
//! ```ignore
//! use volpyr_test::RegParams;
//!
//! let mut rp = RegParams::new("downsample");
//! rp.compare_values(2.0, mean as f64, 0.0);
//! assert!(rp.cleanup());
//! ```
//!
//! # Environment Variables
//!
//! - `REGTEST_MODE`: Set to "compare" (default) or "display"

mod error;
mod params;

pub use error::{TestError, TestResult};
pub use params::{RegParams, RegTestMode};

use std::fs;
use std::path::PathBuf;
use volpyr_core::{Shape3, Volume, Voxel};

/// Get the path to the workspace root
fn workspace_root() -> PathBuf {
    // volpyr-test is at crates/volpyr-test, so go up two directories
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..")
}

/// Get the path to the regout (regression output) directory
pub fn regout_dir() -> PathBuf {
    workspace_root().join("tests/regout")
}

/// Create an empty per-test directory under the regout directory
///
/// Any previous contents are removed first.
pub fn scratch_dir(name: &str) -> TestResult<PathBuf> {
    let dir = regout_dir().join(name);
    if dir.exists() {
        fs::remove_dir_all(&dir)?;
    }
    fs::create_dir_all(&dir).map_err(|e| TestError::DirectoryCreate {
        path: dir.display().to_string(),
        message: e.to_string(),
    })?;
    Ok(dir)
}

/// Volume whose voxel at (z, y, x) is `z * 10000 + y * 100 + x`,
/// truncated to `T`
///
/// Distinct for every coordinate below (6, 100, 100) with `u16` voxels.
pub fn ramp_volume<T: Voxel>(shape: Shape3) -> TestResult<Volume<T>> {
    let max = T::MAX.to_u64() + 1;
    Ok(Volume::from_fn(shape, |z, y, x| {
        let v = (z * 10000 + y * 100 + x) % max;
        T::from_u64(v).unwrap_or_default()
    })?)
}

/// Deterministic pseudo-random volume
///
/// Each voxel is a hash of its coordinate and `seed`, spread over the full
/// value range of `T`.
pub fn hashed_volume<T: Voxel>(shape: Shape3, seed: u64) -> TestResult<Volume<T>> {
    let max = T::MAX.to_u64() + 1;
    Ok(Volume::from_fn(shape, |z, y, x| {
        let mut h = seed ^ 0x9e37_79b9_7f4a_7c15;
        for v in [z, y, x] {
            h = (h ^ v).wrapping_mul(0x0000_0100_0000_01b3);
            h ^= h >> 29;
        }
        T::from_u64(h % max).unwrap_or_default()
    })?)
}
