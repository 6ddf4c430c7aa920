use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;

use kiln_rebuild::{
    DerivedTarget, JobOutcome, RebuildContext, RebuildError, RebuildReason, RebuildScheduler,
    SchedulerOptions, Side, TargetSource, TriggerOutcome,
};

type Log = Arc<Mutex<Vec<(usize, usize)>>>;

struct RecordedTarget {
    job: usize,
    index: usize,
    group: &'static str,
    delay: Duration,
    log: Log,
    warmed: Arc<Mutex<Vec<String>>>,
    threads: Arc<Mutex<Vec<Option<String>>>>,
    gate: Option<(Sender<()>, Receiver<()>)>,
}

impl DerivedTarget for RecordedTarget {
    fn group(&self) -> &str {
        self.group
    }

    fn warm_up(&self) {
        self.warmed.lock().push(format!("{}#{}", self.group, self.index));
    }

    fn rebuild(&self) {
        if let Some((entered, release)) = &self.gate {
            let _ = entered.try_send(());
            let _ = release.recv();
        }
        thread::sleep(self.delay);
        self.threads
            .lock()
            .push(thread::current().name().map(str::to_string));
        self.log.lock().push((self.job, self.index));
    }
}

/// Hands out a fresh numbered batch of targets on every snapshot.
struct RecordingSource {
    snapshots: AtomicUsize,
    count: usize,
    delay: Duration,
    groups: Vec<&'static str>,
    log: Log,
    warmed: Arc<Mutex<Vec<String>>>,
    threads: Arc<Mutex<Vec<Option<String>>>>,
    gate: Mutex<Option<(Sender<()>, Receiver<()>)>>,
}

impl RecordingSource {
    fn new(count: usize, delay: Duration) -> Arc<Self> {
        Self::with_groups(count, delay, vec!["plain"])
    }

    fn with_groups(count: usize, delay: Duration, groups: Vec<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            snapshots: AtomicUsize::new(0),
            count,
            delay,
            groups,
            log: Arc::default(),
            warmed: Arc::default(),
            threads: Arc::default(),
            gate: Mutex::new(None),
        })
    }

    /// Make the first target of the next snapshot block until released.
    fn gate_next(&self) -> (Receiver<()>, Sender<()>) {
        let (entered_tx, entered_rx) = bounded(1);
        let (release_tx, release_rx) = bounded::<()>(0);
        *self.gate.lock() = Some((entered_tx, release_rx));
        (entered_rx, release_tx)
    }

    fn snapshots(&self) -> usize {
        self.snapshots.load(Ordering::SeqCst)
    }

    fn rebuilt_by(&self, job: usize) -> Vec<usize> {
        self.log
            .lock()
            .iter()
            .filter(|(j, _)| *j == job)
            .map(|(_, i)| *i)
            .collect()
    }
}

impl TargetSource for RecordingSource {
    fn snapshot(&self) -> Vec<Arc<dyn DerivedTarget>> {
        let job = self.snapshots.fetch_add(1, Ordering::SeqCst) + 1;
        let gate = self.gate.lock().take();
        (0..self.count)
            .map(|index| {
                Arc::new(RecordedTarget {
                    job,
                    index,
                    group: self.groups[index % self.groups.len()],
                    delay: self.delay,
                    log: Arc::clone(&self.log),
                    warmed: Arc::clone(&self.warmed),
                    threads: Arc::clone(&self.threads),
                    gate: if index == 0 { gate.clone() } else { None },
                }) as Arc<dyn DerivedTarget>
            })
            .collect()
    }
}

fn options(background: bool) -> SchedulerOptions {
    SchedulerOptions {
        background,
        supersede_timeout: Duration::from_secs(5),
        warmup_groups: Vec::new(),
        warmup_threads: Some(2),
        thread_name: "kiln-rebuild-test".to_string(),
    }
}

fn ctx(reason: RebuildReason) -> RebuildContext {
    RebuildContext::new(reason, Side::Server)
}

fn wait_until(deadline: Duration, mut check: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    check()
}

#[test]
fn cold_start_is_deferred_without_work() {
    let source = RecordingSource::new(5, Duration::ZERO);
    let scheduler = RebuildScheduler::new(source.clone(), options(false));

    let outcome = scheduler.trigger(false, ctx(RebuildReason::ColdStart)).unwrap();

    assert_eq!(outcome, TriggerOutcome::Deferred(RebuildReason::ColdStart));
    assert_eq!(source.snapshots(), 0);
    assert!(source.log.lock().is_empty());
    assert!(!scheduler.is_running());
}

#[test]
fn forced_trigger_ignores_skip_conditions() {
    let source = RecordingSource::new(5, Duration::ZERO);
    let scheduler = RebuildScheduler::new(source.clone(), options(false));

    let outcome = scheduler.trigger(true, ctx(RebuildReason::ColdStart)).unwrap();

    assert!(matches!(
        outcome,
        TriggerOutcome::Finished(JobOutcome::Completed { rebuilt: 5, .. })
    ));
    assert_eq!(source.rebuilt_by(1), vec![0, 1, 2, 3, 4]);
}

#[test]
fn local_snapshot_defers_only_on_client() {
    let source = RecordingSource::new(1, Duration::ZERO);
    let scheduler = RebuildScheduler::new(source.clone(), options(false));

    let client = RebuildContext::new(RebuildReason::LocalSnapshot, Side::Client);
    let server = RebuildContext::new(RebuildReason::LocalSnapshot, Side::Server);

    assert!(matches!(
        scheduler.trigger(false, client).unwrap(),
        TriggerOutcome::Deferred(_)
    ));
    assert!(matches!(
        scheduler.trigger(false, server).unwrap(),
        TriggerOutcome::Finished(_)
    ));
    assert_eq!(source.snapshots(), 1);
}

#[test]
fn foreground_job_runs_on_caller_thread() {
    let source = RecordingSource::new(3, Duration::ZERO);
    let scheduler = RebuildScheduler::new(source.clone(), options(false));

    let caller = thread::Builder::new()
        .name("host-main".to_string())
        .spawn(move || scheduler.trigger(false, ctx(RebuildReason::Manual)).unwrap())
        .unwrap()
        .join()
        .unwrap();

    assert!(matches!(caller, TriggerOutcome::Finished(_)));
    assert!(source
        .threads
        .lock()
        .iter()
        .all(|name| name.as_deref() == Some("host-main")));
}

#[test]
fn background_job_runs_on_named_worker() {
    let source = RecordingSource::new(3, Duration::from_millis(5));
    let scheduler = RebuildScheduler::new(source.clone(), options(true));

    assert_eq!(
        scheduler.trigger(false, ctx(RebuildReason::ContentReload)).unwrap(),
        TriggerOutcome::Started
    );
    assert!(scheduler.wait_idle(Duration::from_secs(5)));
    assert!(!scheduler.is_running());

    assert_eq!(source.rebuilt_by(1).len(), 3);
    assert!(source
        .threads
        .lock()
        .iter()
        .all(|name| name.as_deref() == Some("kiln-rebuild-test")));
}

#[test]
fn supersede_stops_old_job_before_new_one_starts() {
    let source = RecordingSource::new(40, Duration::from_millis(10));
    let scheduler = RebuildScheduler::new(source.clone(), options(true));

    scheduler.trigger(false, ctx(RebuildReason::Manual)).unwrap();
    assert!(wait_until(Duration::from_secs(5), || !source.rebuilt_by(1).is_empty()));

    scheduler.trigger(false, ctx(RebuildReason::Manual)).unwrap();
    assert!(scheduler.wait_idle(Duration::from_secs(10)));

    let log = source.log.lock().clone();
    let first_of_new = log.iter().position(|(job, _)| *job == 2).unwrap();
    assert!(log[..first_of_new].iter().all(|(job, _)| *job == 1));
    assert!(log[first_of_new..].iter().all(|(job, _)| *job == 2));

    assert!(source.rebuilt_by(1).len() < 40);
    assert_eq!(source.rebuilt_by(2).len(), 40);
}

#[test]
fn stuck_job_is_fatal_and_keeps_the_slot() {
    let source = RecordingSource::new(3, Duration::ZERO);
    let mut opts = options(true);
    opts.supersede_timeout = Duration::from_millis(100);
    let scheduler = RebuildScheduler::new(source.clone(), opts);

    let (entered, release) = source.gate_next();
    scheduler.trigger(false, ctx(RebuildReason::Manual)).unwrap();
    entered.recv_timeout(Duration::from_secs(5)).unwrap();

    let err = scheduler.trigger(true, ctx(RebuildReason::Manual)).unwrap_err();
    assert!(matches!(err, RebuildError::StuckJob { timeout } if timeout == Duration::from_millis(100)));
    assert!(scheduler.is_running());
    assert_eq!(source.snapshots(), 1, "no second job may start");

    assert!(matches!(
        scheduler.trigger(true, ctx(RebuildReason::Manual)),
        Err(RebuildError::StuckJob { .. })
    ));

    // Unblock the hung item; the old job then sees its stop flag.
    drop(release);
    let outcome = scheduler.trigger(true, ctx(RebuildReason::Manual)).unwrap();
    assert_eq!(outcome, TriggerOutcome::Started);
    assert!(scheduler.wait_idle(Duration::from_secs(5)));

    assert_eq!(source.rebuilt_by(1), vec![0]);
    assert_eq!(source.rebuilt_by(2).len(), 3);
}

#[test]
fn shutdown_stops_the_running_job() {
    let source = RecordingSource::new(200, Duration::from_millis(5));
    let scheduler = RebuildScheduler::new(source.clone(), options(true));

    scheduler.trigger(false, ctx(RebuildReason::Manual)).unwrap();
    assert!(wait_until(Duration::from_secs(5), || !source.rebuilt_by(1).is_empty()));

    scheduler.shutdown().unwrap();
    assert!(!scheduler.is_running());

    let done = source.rebuilt_by(1).len();
    assert!(done < 200);
    thread::sleep(Duration::from_millis(30));
    assert_eq!(source.rebuilt_by(1).len(), done);
}

#[test]
fn warm_up_covers_only_allow_listed_groups() {
    let source = RecordingSource::with_groups(6, Duration::ZERO, vec!["storage", "plain", "cables"]);
    let mut opts = options(false);
    opts.warmup_groups = vec!["storage".to_string(), "cables".to_string()];
    let scheduler = RebuildScheduler::new(source.clone(), opts);

    scheduler.trigger(false, ctx(RebuildReason::Manual)).unwrap();

    let mut warmed = source.warmed.lock().clone();
    warmed.sort();
    assert_eq!(warmed, vec!["cables#2", "cables#5", "storage#0", "storage#3"]);
    assert_eq!(source.rebuilt_by(1).len(), 6);
}

#[test]
fn idle_scheduler_reports_idle() {
    let source = RecordingSource::new(0, Duration::ZERO);
    let scheduler = RebuildScheduler::new(source, options(true));

    assert!(!scheduler.is_running());
    assert!(scheduler.wait_idle(Duration::from_millis(10)));
    scheduler.shutdown().unwrap();
}

#[test]
fn foreground_job_is_superseded_by_a_later_trigger() {
    let source = RecordingSource::new(40, Duration::from_millis(5));
    let scheduler = RebuildScheduler::new(source.clone(), options(false));

    let first = thread::scope(|s| {
        let running = s.spawn(|| scheduler.trigger(false, ctx(RebuildReason::Manual)).unwrap());
        assert!(wait_until(Duration::from_secs(5), || !source.rebuilt_by(1).is_empty()));

        let second = scheduler.trigger(false, ctx(RebuildReason::Manual)).unwrap();
        assert!(matches!(
            second,
            TriggerOutcome::Finished(JobOutcome::Completed { rebuilt: 40, .. })
        ));
        running.join().unwrap()
    });

    assert!(matches!(first, TriggerOutcome::Finished(JobOutcome::Cancelled { .. })));
    assert!(source.rebuilt_by(1).len() < 40);

    let log = source.log.lock().clone();
    let first_of_new = log.iter().position(|(job, _)| *job == 2).unwrap();
    assert!(log[..first_of_new].iter().all(|(job, _)| *job == 1));
    assert!(log[first_of_new..].iter().all(|(job, _)| *job == 2));
    assert!(!scheduler.is_running());
}

#[test]
fn deferred_trigger_still_stops_the_running_job() {
    let source = RecordingSource::new(200, Duration::from_millis(5));
    let scheduler = RebuildScheduler::new(source.clone(), options(true));

    scheduler.trigger(false, ctx(RebuildReason::Manual)).unwrap();
    assert!(wait_until(Duration::from_secs(5), || !source.rebuilt_by(1).is_empty()));

    let outcome = scheduler.trigger(false, ctx(RebuildReason::ColdStart)).unwrap();
    assert_eq!(outcome, TriggerOutcome::Deferred(RebuildReason::ColdStart));
    assert!(!scheduler.is_running());
    assert_eq!(source.snapshots(), 1);

    let done = source.rebuilt_by(1).len();
    assert!(done < 200);
    thread::sleep(Duration::from_millis(30));
    assert_eq!(source.rebuilt_by(1).len(), done);
}

struct Exploding;

impl DerivedTarget for Exploding {
    fn group(&self) -> &str {
        "plain"
    }

    fn rebuild(&self) {
        panic!("derived data blew up");
    }
}

#[test]
fn panicked_foreground_job_does_not_look_running() {
    let source = Arc::new(|| vec![Arc::new(Exploding) as Arc<dyn DerivedTarget>]);
    let scheduler = RebuildScheduler::new(source, options(false));

    let joined = thread::scope(|s| {
        s.spawn(|| scheduler.trigger(true, ctx(RebuildReason::Manual)))
            .join()
    });
    assert!(joined.is_err());

    assert!(!scheduler.is_running());
    assert!(scheduler.wait_idle(Duration::from_millis(100)));
    scheduler.shutdown().unwrap();
}
