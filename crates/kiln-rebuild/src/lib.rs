//! # kiln-rebuild
//!
//! Cooperative rebuild scheduling for derived data.
//!
//! Derived data (precomputed properties hung off content items) is not safe
//! for concurrent mutation, so a [`RebuildScheduler`] owns exactly one job
//! slot. A new trigger first stops and joins the running job, then decides
//! from a [`RebuildContext`] whether a rebuild is needed at all, and finally
//! runs a fresh [`RebuildJob`] on the caller thread or a background worker.
//!
//! ```text
//! trigger ──► stop + join old job ──► skip? ──► snapshot targets
//!                  │ timeout                      │
//!                  ▼                              ▼
//!           RebuildError::StuckJob     warm-up (parallel) ──► sequential pass
//! ```

use std::io;
use std::time::Duration;

use thiserror::Error;

mod job;
mod priority;
mod reason;
mod scheduler;
mod target;

pub use job::{default_warmup_threads, JobOutcome, RebuildJob};
pub use reason::{RebuildContext, RebuildReason, Side};
pub use scheduler::{RebuildScheduler, SchedulerOptions, TriggerOutcome};
pub use target::{DerivedTarget, TargetSource};

/// Errors raised by the scheduler.
#[derive(Error, Debug)]
pub enum RebuildError {
    /// The running job ignored its stop flag for the whole supersede window.
    /// Unrecoverable: the job stays in the slot and no other job may start.
    #[error("rebuild job did not stop within {timeout:?}")]
    StuckJob { timeout: Duration },

    #[error("failed to spawn rebuild worker: {0}")]
    Spawn(#[source] io::Error),

    #[error("failed to build warm-up pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, RebuildError>;
