//! The single-slot scheduler.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, TryRecvError};
use kiln_config::{log_rebuild_debug, log_rebuild_error, log_rebuild_warn, RebuildConfig};
use parking_lot::Mutex;

use crate::priority::lower_current_thread;
use crate::{JobOutcome, RebuildContext, RebuildError, RebuildJob, RebuildReason, Result, TargetSource};

/// Scheduler tuning, normally taken from `[rebuild]` in the config.
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    pub background: bool,
    pub supersede_timeout: Duration,
    pub warmup_groups: Vec<String>,
    pub warmup_threads: Option<usize>,
    pub thread_name: String,
}

impl SchedulerOptions {
    pub fn from_config(config: &RebuildConfig) -> Self {
        Self {
            background: config.background,
            supersede_timeout: config.supersede_timeout(),
            warmup_groups: config.warmup_groups.clone(),
            warmup_threads: config.warmup_threads,
            thread_name: "kiln-rebuild".to_string(),
        }
    }
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self::from_config(&RebuildConfig::default())
    }
}

/// Result of a successful [`RebuildScheduler::trigger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// Skipped for the given reason; nothing ran.
    Deferred(RebuildReason),
    /// A background worker is running the new job.
    Started,
    /// The job ran on the caller thread.
    Finished(JobOutcome),
}

struct ActiveJob {
    id: u64,
    stop: Arc<AtomicBool>,
    done: Receiver<JobOutcome>,
    /// `None` while the job runs on a triggering thread.
    worker: Option<JoinHandle<()>>,
}

impl ActiveJob {
    fn is_finished(&self) -> bool {
        match &self.worker {
            Some(handle) => handle.is_finished(),
            // A foreground job that unwound dropped its sender without a result.
            None => {
                !self.done.is_empty() || matches!(self.done.try_recv(), Err(TryRecvError::Disconnected))
            }
        }
    }

    fn join(self) {
        if let Some(handle) = self.worker {
            if handle.join().is_err() {
                log_rebuild_warn!("Rebuild worker panicked", job = self.id);
            }
        }
    }
}

/// Owns at most one rebuild job at a time.
pub struct RebuildScheduler {
    source: Arc<dyn TargetSource>,
    options: SchedulerOptions,
    slot: Mutex<Option<ActiveJob>>,
    next_id: AtomicU64,
}

impl RebuildScheduler {
    pub fn new(source: Arc<dyn TargetSource>, options: SchedulerOptions) -> Self {
        Self {
            source,
            options,
            slot: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    /// Scheduler using the global `[rebuild]` configuration.
    pub fn from_config(source: Arc<dyn TargetSource>) -> Self {
        let options = SchedulerOptions::from_config(&kiln_config::config().rebuild);
        Self::new(source, options)
    }

    pub fn options(&self) -> &SchedulerOptions {
        &self.options
    }

    /// Request a rebuild.
    ///
    /// Any running job is stopped and joined first, bounded by the
    /// supersede timeout. Without `force`, contexts that defer return
    /// [`TriggerOutcome::Deferred`] after that.
    ///
    /// # Errors
    ///
    /// [`RebuildError::StuckJob`] if the old job outlives the timeout. The
    /// old job keeps the slot, so every later trigger fails the same way
    /// until it stops.
    pub fn trigger(&self, force: bool, context: RebuildContext) -> Result<TriggerOutcome> {
        let mut slot = self.slot.lock();

        if let Some(active) = slot.take() {
            log_rebuild_warn!("Interrupting previous rebuild", job = active.id);
            if let Err(stuck) = self.stop_and_join(active) {
                *slot = Some(stuck);
                return Err(RebuildError::StuckJob {
                    timeout: self.options.supersede_timeout,
                });
            }
        }

        if !force && context.should_defer() {
            log_rebuild_warn!(
                "Deferred rebuild",
                reason = debug(context.reason),
                side = debug(context.side)
            );
            return Ok(TriggerOutcome::Deferred(context.reason));
        }

        let job = RebuildJob::new(
            self.source.snapshot(),
            &self.options.warmup_groups,
            self.options.warmup_threads,
        )?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let stop = job.stop_flag();
        let (done_tx, done_rx) = bounded(1);
        log_rebuild_debug!(
            "Starting rebuild",
            job = id,
            targets = job.len(),
            background = self.options.background
        );

        if self.options.background {
            let worker = thread::Builder::new()
                .name(self.options.thread_name.clone())
                .spawn(move || {
                    lower_current_thread();
                    let _ = done_tx.send(job.run());
                })
                .map_err(RebuildError::Spawn)?;

            *slot = Some(ActiveJob {
                id,
                stop,
                done: done_rx,
                worker: Some(worker),
            });
            return Ok(TriggerOutcome::Started);
        }

        // Foreground: occupy the slot so a concurrent trigger can still stop us.
        *slot = Some(ActiveJob {
            id,
            stop,
            done: done_rx,
            worker: None,
        });
        drop(slot);

        let outcome = job.run();
        let _ = done_tx.send(outcome);
        drop(done_tx);

        let mut slot = self.slot.lock();
        if slot.as_ref().is_some_and(|active| active.id == id) {
            *slot = None;
        }
        Ok(TriggerOutcome::Finished(outcome))
    }

    /// Stop the running job, if any, and wait for it like a supersede would.
    pub fn shutdown(&self) -> Result<()> {
        let mut slot = self.slot.lock();
        if let Some(active) = slot.take() {
            if let Err(stuck) = self.stop_and_join(active) {
                *slot = Some(stuck);
                return Err(RebuildError::StuckJob {
                    timeout: self.options.supersede_timeout,
                });
            }
        }
        Ok(())
    }

    /// Whether a job currently occupies the slot and has not finished.
    pub fn is_running(&self) -> bool {
        self.slot
            .lock()
            .as_ref()
            .is_some_and(|active| !active.is_finished())
    }

    /// Wait up to `timeout` for the current job to end on its own.
    ///
    /// Returns `true` when the slot is idle afterwards.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let (id, done) = match self.slot.lock().as_ref() {
            Some(active) => (active.id, active.done.clone()),
            None => return true,
        };

        match done.recv_timeout(timeout) {
            Ok(_) | Err(RecvTimeoutError::Disconnected) => {
                let mut slot = self.slot.lock();
                if slot.as_ref().is_some_and(|active| active.id == id) {
                    if let Some(active) = slot.take() {
                        active.join();
                    }
                }
                slot.is_none()
            }
            Err(RecvTimeoutError::Timeout) => false,
        }
    }

    fn stop_and_join(&self, active: ActiveJob) -> std::result::Result<(), ActiveJob> {
        active.stop.store(true, Ordering::Release);

        match active.done.recv_timeout(self.options.supersede_timeout) {
            Ok(outcome) => {
                log_rebuild_debug!("Previous rebuild exited", job = active.id, rebuilt = outcome.rebuilt());
            }
            // Sender dropped without a result: the worker is gone.
            Err(RecvTimeoutError::Disconnected) => {
                log_rebuild_debug!("Previous rebuild exited", job = active.id);
            }
            Err(RecvTimeoutError::Timeout) => {
                log_rebuild_error!(
                    "Rebuild job has hung",
                    job = active.id,
                    timeout_ms = self.options.supersede_timeout.as_millis() as u64
                );
                return Err(active);
            }
        }

        active.join();
        Ok(())
    }
}

impl Drop for RebuildScheduler {
    fn drop(&mut self) {
        if let Some(active) = self.slot.get_mut().as_ref() {
            active.stop.store(true, Ordering::Release);
        }
    }
}

impl std::fmt::Debug for RebuildScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RebuildScheduler")
            .field("options", &self.options)
            .field("running", &self.is_running())
            .finish()
    }
}
