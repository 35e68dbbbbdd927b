//! Watch loop for filesort
//!
//! Binds an [`EventSource`] to the [`Organizer`]. One dispatcher thread
//! admits creation notifications into the [`Debouncer`] and wakes up at the
//! earliest pending deadline; due paths are claimed in the [`ProcessedSet`]
//! and handed to a small pool of worker threads that re-check and move them.
//! A slow move therefore never delays admission of new events.

use crate::debounce::{
    check_ready, settle_window, Admission, Debouncer, PendingEvent, ProcessedSet, Readiness,
};
use crate::error::{Error, Result};
use crate::organizer::{OrganizeResult, Organizer};
use crate::source::{EventSource, SourceEvent};
use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

// ────── configuration ─────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Quiescence window between a creation event and the organize attempt
    pub debounce: Duration,
    /// Worker threads running re-verification + organize
    pub workers: usize,
    /// How many extra windows a file that is still being written may get
    pub max_settle_checks: u32,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(2),
            workers: 4,
            max_settle_checks: 10,
        }
    }
}

// ────── public state/useful telemetry ────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Idle,
    Watching,
    Stopping,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct WatcherStatus {
    pub state: WatcherState,
    pub events_received: usize,
    pub duplicates_dropped: usize,
    pub ignored: usize,
    pub dropped_not_ready: usize,
    pub organized: usize,
    pub failed: usize,
    pub pending: usize,
    pub in_flight: usize,
    pub start_time: Option<Instant>,
    pub watched_path: PathBuf,
}

#[derive(Debug, Default)]
struct Counters {
    events_received: AtomicUsize,
    duplicates_dropped: AtomicUsize,
    ignored: AtomicUsize,
    dropped_not_ready: AtomicUsize,
    organized: AtomicUsize,
    failed: AtomicUsize,
    pending: AtomicUsize,
}

impl Counters {
    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

/// Work handed from the dispatcher to a worker.
struct Job {
    event: PendingEvent,
}

/// What a worker tells the dispatcher after looking at a due path.
enum Verdict {
    Done,
    StillBusy(PendingEvent),
}

// ────── main watcher struct ───────────────────────────────────────────────────
pub struct FileWatcher {
    state: Arc<Mutex<WatcherState>>,
    config: WatcherConfig,
    organizer: Organizer,
    processed: ProcessedSet,
    counters: Arc<Counters>,
    stop_flag: Arc<AtomicBool>,
    stop_tx: Option<Sender<()>>,
    dispatcher: Option<JoinHandle<()>>,
    result_tx: Option<Sender<OrganizeResult>>,
    start_time: Option<Instant>,
}

impl FileWatcher {
    pub fn new(organizer: Organizer, config: WatcherConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(WatcherState::Idle)),
            config,
            organizer,
            processed: ProcessedSet::new(),
            counters: Arc::new(Counters::default()),
            stop_flag: Arc::new(AtomicBool::new(false)),
            stop_tx: None,
            dispatcher: None,
            result_tx: None,
            start_time: None,
        }
    }

    /// Every `OrganizeResult` is also sent here (after being logged).
    pub fn on_result(&mut self, tx: Sender<OrganizeResult>) -> &mut Self {
        self.result_tx = Some(tx);
        self
    }

    pub fn processed(&self) -> &ProcessedSet {
        &self.processed
    }

    /// Attach `source` to the organizer's root and start dispatching.
    /// `Idle → Watching`; on attach failure the watcher stays `Idle`.
    pub fn start(&mut self, mut source: Box<dyn EventSource>) -> Result<()> {
        {
            let g = self.lock_state()?;
            match *g {
                WatcherState::Idle => {}
                WatcherState::Watching => return Ok(()), // idempotent
                other => return Err(Error::InvalidState(format!("cannot start from {other:?}"))),
            }
        }

        let root = self.organizer.root().to_path_buf();
        let events = source.subscribe(&root).map_err(|e| match e {
            Error::Attach(_) => e,
            other => Error::Attach(other.to_string()),
        })?;

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let ctx = DispatchContext {
            config: self.config.clone(),
            organizer: self.organizer.clone(),
            processed: self.processed.clone(),
            counters: self.counters.clone(),
            stop_flag: self.stop_flag.clone(),
            result_tx: self.result_tx.clone(),
            state: self.state.clone(),
        };

        *self.lock_state()? = WatcherState::Watching;
        let handle = match thread::Builder::new()
            .name("filesort-dispatch".into())
            .spawn(move || ctx.run(source, events, stop_rx))
        {
            Ok(h) => h,
            Err(e) => {
                *self.lock_state()? = WatcherState::Idle;
                return Err(e.into());
            }
        };

        self.start_time = Some(Instant::now());
        info!(
            dir = %root.display(),
            debounce_ms = self.config.debounce.as_millis() as u64,
            workers = self.config.workers,
            "watching"
        );

        self.stop_tx = Some(stop_tx);
        self.dispatcher = Some(handle);
        Ok(())
    }

    /// `Watching → Stopping → Stopped`. Pending timers are abandoned, jobs
    /// already running are allowed to finish.
    pub fn stop(&mut self) -> Result<()> {
        {
            let mut g = self.lock_state()?;
            match *g {
                WatcherState::Stopped => return Ok(()),
                WatcherState::Idle => {
                    *g = WatcherState::Stopped;
                    return Ok(());
                }
                _ => *g = WatcherState::Stopping,
            }
        }

        self.stop_flag.store(true, Ordering::SeqCst);
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.try_send(());
        }
        if let Some(h) = self.dispatcher.take() {
            if h.join().is_err() {
                warn!("dispatcher thread panicked");
            }
        }

        *self.lock_state()? = WatcherState::Stopped;
        info!("watcher stopped");
        Ok(())
    }

    pub fn status(&self) -> Result<WatcherStatus> {
        let state = *self.lock_state()?;
        let c = &self.counters;
        Ok(WatcherStatus {
            state,
            events_received: c.events_received.load(Ordering::SeqCst),
            duplicates_dropped: c.duplicates_dropped.load(Ordering::SeqCst),
            ignored: c.ignored.load(Ordering::SeqCst),
            dropped_not_ready: c.dropped_not_ready.load(Ordering::SeqCst),
            organized: c.organized.load(Ordering::SeqCst),
            failed: c.failed.load(Ordering::SeqCst),
            pending: c.pending.load(Ordering::SeqCst),
            in_flight: self.processed.len(),
            start_time: self.start_time,
            watched_path: self.organizer.root().to_path_buf(),
        })
    }

    fn lock_state(&self) -> Result<std::sync::MutexGuard<'_, WatcherState>> {
        self.state
            .lock()
            .map_err(|_| Error::InvalidState("watcher state mutex poisoned".into()))
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        let _ = self.stop(); // ignore errors during drop
    }
}

// ────── dispatcher ───────────────────────────────────────────────────────────

struct DispatchContext {
    config: WatcherConfig,
    organizer: Organizer,
    processed: ProcessedSet,
    counters: Arc<Counters>,
    stop_flag: Arc<AtomicBool>,
    result_tx: Option<Sender<OrganizeResult>>,
    state: Arc<Mutex<WatcherState>>,
}

impl DispatchContext {
    fn run(
        self,
        mut source: Box<dyn EventSource>,
        events: Receiver<SourceEvent>,
        stop_rx: Receiver<()>,
    ) {
        let mut debouncer = Debouncer::new(self.config.debounce, self.processed.clone());
        let (job_tx, job_rx) = unbounded::<Job>();
        let (verdict_tx, verdict_rx) = unbounded::<Verdict>();
        let workers = self.spawn_workers(job_rx, verdict_tx);
        let mut events = Some(events);
        // jobs sent to workers whose verdict has not come back yet
        let mut outstanding = 0usize;

        loop {
            let timeout = debouncer
                .next_deadline()
                .map(|d| d.saturating_duration_since(Instant::now()))
                .unwrap_or(Duration::from_secs(3600));
            let event_rx = events.clone().unwrap_or_else(crossbeam_channel::never);

            select! {
                recv(stop_rx) -> _ => break,
                recv(event_rx) -> msg => match msg {
                    Ok(ev) => self.admit(&mut debouncer, ev),
                    Err(_) => {
                        warn!("event source disconnected");
                        events = None;
                    }
                },
                recv(verdict_rx) -> msg => {
                    outstanding = outstanding.saturating_sub(1);
                    if let Ok(Verdict::StillBusy(ev)) = msg {
                        debouncer.rearm(ev, Instant::now());
                    }
                },
                default(timeout) => {},
            }

            for ev in debouncer.take_due(Instant::now()) {
                if self.dispatch(ev, &job_tx) {
                    outstanding += 1;
                }
            }
            self.counters.pending.store(debouncer.len(), Ordering::SeqCst);

            // source gone and nothing left to wait for
            if events.is_none() && debouncer.is_empty() && outstanding == 0 {
                break;
            }
        }

        // ── shutdown ──────────────────────────────────────────────────────────
        if let Ok(mut g) = self.state.lock() {
            if *g == WatcherState::Watching {
                *g = WatcherState::Stopping;
            }
        }
        source.unsubscribe();
        let abandoned = debouncer.abandon_all();
        if abandoned > 0 {
            info!(abandoned, "abandoned pending files on shutdown");
        }
        self.counters.pending.store(0, Ordering::SeqCst);
        drop(job_tx);
        for w in workers {
            if w.join().is_err() {
                warn!("worker thread panicked");
            }
        }
        if let Ok(mut g) = self.state.lock() {
            *g = WatcherState::Stopped;
        }
    }

    fn admit(&self, debouncer: &mut Debouncer, event: SourceEvent) {
        let path = match event {
            SourceEvent::Created(p) => p,
            SourceEvent::Other(_) => return,
            SourceEvent::Error(e) => {
                warn!(error = %e, "event source error");
                return;
            }
        };
        Counters::bump(&self.counters.events_received);

        if self.organizer.ignore_list().is_ignored(&path) {
            Counters::bump(&self.counters.ignored);
            debug!(path = %path.display(), "ignored");
            return;
        }

        match debouncer.admit(path.clone(), Instant::now()) {
            Admission::Scheduled => debug!(path = %path.display(), "pending"),
            Admission::Rearmed | Admission::DuplicateInFlight => {
                Counters::bump(&self.counters.duplicates_dropped);
                debug!(path = %path.display(), "duplicate creation event dropped");
            }
        }
    }

    /// Claim the path and queue it for a worker. `false` if nothing was
    /// queued.
    fn dispatch(&self, event: PendingEvent, job_tx: &Sender<Job>) -> bool {
        if !self.processed.claim(&event.path) {
            Counters::bump(&self.counters.duplicates_dropped);
            return false;
        }
        match job_tx.send(Job { event }) {
            Ok(()) => true,
            Err(e) => {
                // workers are gone; we are shutting down
                self.processed.release(&e.0.event.path);
                false
            }
        }
    }

    fn spawn_workers(&self, jobs: Receiver<Job>, verdicts: Sender<Verdict>) -> Vec<JoinHandle<()>> {
        (0..self.config.workers.max(1))
            .filter_map(|i| {
                let worker = Worker {
                    organizer: self.organizer.clone(),
                    processed: self.processed.clone(),
                    counters: self.counters.clone(),
                    stop_flag: self.stop_flag.clone(),
                    result_tx: self.result_tx.clone(),
                    settle: settle_window(self.config.debounce),
                    max_settle_checks: self.config.max_settle_checks,
                };
                let jobs = jobs.clone();
                let verdicts = verdicts.clone();
                thread::Builder::new()
                    .name(format!("filesort-worker-{i}"))
                    .spawn(move || worker.run(jobs, verdicts))
                    .map_err(|e| warn!(error = %e, "could not spawn worker"))
                    .ok()
            })
            .collect()
    }
}

// ────── workers ──────────────────────────────────────────────────────────────

struct Worker {
    organizer: Organizer,
    processed: ProcessedSet,
    counters: Arc<Counters>,
    stop_flag: Arc<AtomicBool>,
    result_tx: Option<Sender<OrganizeResult>>,
    settle: Duration,
    max_settle_checks: u32,
}

impl Worker {
    fn run(self, jobs: Receiver<Job>, verdicts: Sender<Verdict>) {
        for Job { event } in jobs.iter() {
            let path = event.path.clone();
            if self.stop_flag.load(Ordering::SeqCst) {
                debug!(path = %path.display(), "shutting down, job abandoned");
                self.processed.release(&path);
                continue;
            }
            let verdict = self.handle(event);
            self.processed.release(&path);
            let _ = verdicts.send(verdict);
        }
    }

    fn handle(&self, event: PendingEvent) -> Verdict {
        match check_ready(&event.path, self.settle) {
            Readiness::Ready => {}
            Readiness::Gone => {
                Counters::bump(&self.counters.dropped_not_ready);
                debug!(path = %event.path.display(), "gone before organizing, dropped");
                return Verdict::Done;
            }
            Readiness::Busy(why) if event.settle_checks < self.max_settle_checks => {
                debug!(path = %event.path.display(), reason = %why, "still being written");
                return Verdict::StillBusy(event);
            }
            Readiness::Busy(why) => {
                Counters::bump(&self.counters.dropped_not_ready);
                warn!(
                    path = %event.path.display(),
                    reason = %why,
                    checks = event.settle_checks,
                    "file never settled, leaving it in place"
                );
                return Verdict::Done;
            }
        }

        let result = self.organizer.organize(&event.path);
        result.log();
        match &result {
            OrganizeResult::Moved { .. } => Counters::bump(&self.counters.organized),
            OrganizeResult::Failed { .. } => Counters::bump(&self.counters.failed),
            OrganizeResult::Skipped { .. } => Counters::bump(&self.counters.ignored),
        }
        if let Some(tx) = &self.result_tx {
            let _ = tx.send(result);
        }
        Verdict::Done
    }
}
