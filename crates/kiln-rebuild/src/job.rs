//! A single rebuild pass over a snapshot of targets.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use kiln_config::{log_rebuild_debug, log_rebuild_info};
use rayon::prelude::*;
use rayon::ThreadPool;

use crate::{DerivedTarget, Result};

/// Warm-up pool size when none is configured: all cores but one.
pub fn default_warmup_threads() -> usize {
    num_cpus::get().saturating_sub(1).max(1)
}

/// How a job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Every target was rebuilt.
    Completed { rebuilt: usize, elapsed: Duration },
    /// The stop flag was observed between items.
    Cancelled { rebuilt: usize },
}

impl JobOutcome {
    pub fn rebuilt(&self) -> usize {
        match *self {
            JobOutcome::Completed { rebuilt, .. } | JobOutcome::Cancelled { rebuilt } => rebuilt,
        }
    }
}

struct Warmup {
    pool: ThreadPool,
    targets: Vec<Arc<dyn DerivedTarget>>,
}

/// Ordered targets plus a shared stop flag.
pub struct RebuildJob {
    targets: Vec<Arc<dyn DerivedTarget>>,
    warmup: Option<Warmup>,
    stop: Arc<AtomicBool>,
}

impl RebuildJob {
    /// Build a job. Targets whose group is in `warmup_groups` are
    /// precomputed on a dedicated pool before the sequential pass; the pool
    /// is only created when at least one target qualifies.
    pub fn new(
        targets: Vec<Arc<dyn DerivedTarget>>,
        warmup_groups: &[String],
        warmup_threads: Option<usize>,
    ) -> Result<Self> {
        let warm: Vec<Arc<dyn DerivedTarget>> = targets
            .iter()
            .filter(|t| warmup_groups.iter().any(|g| g == t.group()))
            .cloned()
            .collect();

        let warmup = if warm.is_empty() {
            None
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(warmup_threads.unwrap_or_else(default_warmup_threads))
                .thread_name(|i| format!("kiln-warmup-{}", i))
                .build()?;
            Some(Warmup { pool, targets: warm })
        };

        Ok(Self {
            targets,
            warmup,
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Shared flag; setting it cancels the job at the next item boundary.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Run to completion or until stopped.
    pub fn run(self) -> JobOutcome {
        let started = Instant::now();

        if let Some(warmup) = &self.warmup {
            let stop = &self.stop;
            warmup.pool.install(|| {
                warmup.targets.par_iter().for_each(|target| {
                    if !stop.load(Ordering::Acquire) {
                        target.warm_up();
                    }
                });
            });
            log_rebuild_debug!("Warm-up finished", targets = warmup.targets.len());
        }

        let mut rebuilt = 0;
        for target in &self.targets {
            if self.stopped() {
                log_rebuild_debug!("Rebuild cancelled", rebuilt = rebuilt, total = self.targets.len());
                return JobOutcome::Cancelled { rebuilt };
            }
            target.rebuild();
            rebuilt += 1;
        }

        let elapsed = started.elapsed();
        log_rebuild_info!(
            "Derived data rebuilt",
            targets = rebuilt,
            seconds = elapsed.as_secs_f64()
        );
        JobOutcome::Completed { rebuilt, elapsed }
    }
}
