//! Observation hooks
//!
//! Long-running operations (ingestion, each downsample step, persisting a
//! level, exporting) report to an [`Observer`] before and after they run.
//! [`LogObserver`] writes timings through the `log` facade; callers that
//! want wall-clock or memory accounting implement their own observer.

use crate::shape::Shape3;
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// An observed unit of work
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Building level 0 from `slices` input slices
    Ingest { slices: usize },
    /// Producing `level` with the given output shape
    Downsample { level: u32, shape: Shape3 },
    /// Writing a level to disk
    Persist { path: PathBuf },
    /// Writing exported files
    Export { path: PathBuf },
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Ingest { slices } => write!(f, "ingest {slices} slices"),
            Operation::Downsample { level, shape } => {
                write!(f, "downsample to level {level} ({shape})")
            }
            Operation::Persist { path } => write!(f, "persist {}", path.display()),
            Operation::Export { path } => write!(f, "export {}", path.display()),
        }
    }
}

/// Measurements for a completed operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub elapsed: Duration,
    /// Logical size of the data produced
    pub bytes: u64,
}

/// Receiver for operation events
pub trait Observer: Send + Sync {
    fn before(&self, _op: &Operation) {}

    fn after(&self, op: &Operation, observation: &Observation);
}

/// Observer that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn after(&self, _op: &Operation, _observation: &Observation) {}
}

/// Observer that logs each completed operation at info level
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn before(&self, op: &Operation) {
        log::debug!("start {op}");
    }

    fn after(&self, op: &Operation, observation: &Observation) {
        log::info!(
            "{op}: {:.3}s, {} bytes",
            observation.elapsed.as_secs_f64(),
            observation.bytes
        );
    }
}

/// Run `f` between `observer.before` and `observer.after`
///
/// `bytes` computes the reported size from the result. Failed runs are
/// not reported to `after`.
pub fn observe<R, E, F, B>(observer: &dyn Observer, op: Operation, bytes: B, f: F) -> Result<R, E>
where
    F: FnOnce() -> Result<R, E>,
    B: FnOnce(&R) -> u64,
{
    observer.before(&op);
    let start = Instant::now();
    let out = f()?;
    let observation = Observation {
        elapsed: start.elapsed(),
        bytes: bytes(&out),
    };
    observer.after(&op, &observation);
    Ok(out)
}
