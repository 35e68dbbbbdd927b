//! Event debouncing and duplicate suppression.
//!
//! Creation events fire as soon as the writer opens the file, usually long
//! before it has finished writing. Each admitted path therefore waits for a
//! quiescence window and is re-checked before anyone touches it. Waiting is
//! a deadline in a priority queue, never a sleep, so one slow file does not
//! hold up the others.

use chrono::{DateTime, Local};
use priority_queue::PriorityQueue;
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant, SystemTime};

/// Longest quiescence window the debouncer will wait.
pub const MAX_QUIESCENCE: Duration = Duration::from_secs(3600);

// ────── processed set ────────────────────────────────────────────────────────

/// Paths that have been handed to the organizer and are not finished yet.
///
/// Entries are claimed at dispatch time and released once the organize
/// attempt (or drop) has completed, so the set only ever holds in-flight
/// paths.
#[derive(Debug, Clone, Default)]
pub struct ProcessedSet {
    inner: Arc<Mutex<HashSet<PathBuf>>>,
}

impl ProcessedSet {
    pub fn new() -> Self {
        Self::default()
    }

    // A poisoned lock only means a worker panicked mid-insert; the set itself
    // is still a valid HashSet.
    fn lock(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.lock().contains(path)
    }

    /// Returns `false` when the path was already claimed.
    pub fn claim(&self, path: &Path) -> bool {
        self.lock().insert(path.to_path_buf())
    }

    pub fn release(&self, path: &Path) -> bool {
        self.lock().remove(path)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

// ────── pending events ───────────────────────────────────────────────────────

/// A creation notification waiting out its quiescence window.
#[derive(Debug, Clone)]
pub struct PendingEvent {
    pub path: PathBuf,
    pub detected_at: DateTime<Local>,
    pub deadline: Instant,
    /// How many times the file was found still being written.
    pub settle_checks: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// New path, deadline scheduled
    Scheduled,
    /// Path was already waiting; its window starts over
    Rearmed,
    /// Path is being organized right now
    DuplicateInFlight,
}

/// Deadline queue keyed by path.
///
/// Owned by the dispatcher thread only; the [`ProcessedSet`] is the part
/// shared with the workers.
#[derive(Debug)]
pub struct Debouncer {
    quiescence: Duration,
    queue: PriorityQueue<PathBuf, Reverse<Instant>>,
    pending: HashMap<PathBuf, PendingEvent>,
    processed: ProcessedSet,
}

impl Debouncer {
    /// `quiescence` is capped at [`MAX_QUIESCENCE`].
    pub fn new(quiescence: Duration, processed: ProcessedSet) -> Self {
        Self {
            quiescence: quiescence.min(MAX_QUIESCENCE),
            queue: PriorityQueue::new(),
            pending: HashMap::new(),
            processed,
        }
    }

    pub fn quiescence(&self) -> Duration {
        self.quiescence
    }

    pub fn processed(&self) -> &ProcessedSet {
        &self.processed
    }

    pub fn admit(&mut self, path: PathBuf, now: Instant) -> Admission {
        if self.processed.contains(&path) {
            return Admission::DuplicateInFlight;
        }

        let deadline = self.deadline_after(now);
        if let Some(existing) = self.pending.get_mut(&path) {
            existing.deadline = deadline;
            self.queue.change_priority(&path, Reverse(deadline));
            return Admission::Rearmed;
        }

        self.queue.push(path.clone(), Reverse(deadline));
        self.pending.insert(
            path.clone(),
            PendingEvent {
                path,
                detected_at: Local::now(),
                deadline,
                settle_checks: 0,
            },
        );
        Admission::Scheduled
    }

    /// Put an expired event back for one more window (file still busy).
    pub fn rearm(&mut self, mut event: PendingEvent, now: Instant) {
        event.deadline = self.deadline_after(now);
        event.settle_checks += 1;
        self.queue.push(event.path.clone(), Reverse(event.deadline));
        self.pending.insert(event.path.clone(), event);
    }

    fn deadline_after(&self, now: Instant) -> Instant {
        now.checked_add(self.quiescence).unwrap_or(now)
    }

    /// Pop every event whose deadline is at or before `now`, earliest first.
    pub fn take_due(&mut self, now: Instant) -> Vec<PendingEvent> {
        let mut due = Vec::new();
        while let Some((_, Reverse(deadline))) = self.queue.peek() {
            if *deadline > now {
                break;
            }
            if let Some((path, _)) = self.queue.pop() {
                if let Some(ev) = self.pending.remove(&path) {
                    due.push(ev);
                }
            }
        }
        due
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.queue.peek().map(|(_, Reverse(d))| *d)
    }

    /// Forget everything still waiting (shutdown). Returns how many were
    /// abandoned.
    pub fn abandon_all(&mut self) -> usize {
        let n = self.pending.len();
        self.queue.clear();
        self.pending.clear();
        n
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

// ────── re-verification ──────────────────────────────────────────────────────

#[derive(Debug, PartialEq, Eq)]
pub enum Readiness {
    /// Existing, readable regular file that has stopped changing
    Ready,
    /// Deleted, renamed away or not a regular file: drop it
    Gone,
    /// Still being written or locked by the writer
    Busy(String),
}

/// How long a file must have gone unmodified to count as written.
///
/// Shorter than the window itself: a file whose last write landed just after
/// its creation event is already settled when the deadline fires.
pub fn settle_window(quiescence: Duration) -> Duration {
    quiescence / 2
}

/// Check `path` after its quiescence window elapsed.
///
/// A file modified less than `settle` ago is still being written.
pub fn check_ready(path: &Path, settle: Duration) -> Readiness {
    let meta = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Readiness::Gone,
        Err(e) => return Readiness::Busy(e.to_string()),
    };
    if !meta.is_file() {
        return Readiness::Gone;
    }

    if let Ok(modified) = meta.modified() {
        // mtime in the future (clock skew) counts as "just written"
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        if age < settle {
            return Readiness::Busy(format!("modified {}ms ago", age.as_millis()));
        }
    }

    match File::open(path) {
        Ok(_) => Readiness::Ready,
        Err(e) if e.kind() == io::ErrorKind::NotFound => Readiness::Gone,
        Err(e) => Readiness::Busy(e.to_string()),
    }
}
