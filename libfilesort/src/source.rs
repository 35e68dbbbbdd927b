//! Filesystem event sources.
//!
//! The watch loop only needs "give me creation notifications for this
//! directory". [`NotifySource`] gets them from the OS through `notify`;
//! [`ChannelSource`] lets tests inject them by hand.

use crate::error::{Error, Result};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcherTrait};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Upper bound on OS events buffered between the notify thread and the
/// dispatcher.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    Created(PathBuf),
    /// Deletion, modification, rename, access: not acted upon
    Other(PathBuf),
    /// The backend reported a problem; the watch keeps going
    Error(String),
}

pub trait EventSource: Send {
    /// Start delivering events for `directory` (non-recursive).
    fn subscribe(&mut self, directory: &Path) -> Result<Receiver<SourceEvent>>;

    /// Detach from the directory. Senders are dropped, so the receiver
    /// returned by `subscribe` disconnects once drained.
    fn unsubscribe(&mut self);
}

// ────── notify-backed source ─────────────────────────────────────────────────

pub struct NotifySource {
    capacity: usize,
    watcher: Option<RecommendedWatcher>,
    watched: Option<PathBuf>,
}

impl NotifySource {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            watcher: None,
            watched: None,
        }
    }
}

impl Default for NotifySource {
    fn default() -> Self {
        Self::new()
    }
}

fn translate(event: Event) -> Vec<SourceEvent> {
    match event.kind {
        EventKind::Create(_) => event.paths.into_iter().map(SourceEvent::Created).collect(),
        _ => event.paths.into_iter().map(SourceEvent::Other).collect(),
    }
}

impl EventSource for NotifySource {
    fn subscribe(&mut self, directory: &Path) -> Result<Receiver<SourceEvent>> {
        if self.watcher.is_some() {
            return Err(Error::InvalidState("source already subscribed".into()));
        }

        let (tx, rx) = bounded(self.capacity);
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let events = match res {
                    Ok(ev) => translate(ev),
                    Err(e) => vec![SourceEvent::Error(e.to_string())],
                };
                for ev in events {
                    if tx.try_send(ev).is_err() {
                        warn!("event channel full or closed, dropping notification");
                    }
                }
            },
            notify::Config::default(),
        )?;

        watcher
            .watch(directory, RecursiveMode::NonRecursive)
            .map_err(|e| Error::Attach(format!("cannot watch {}: {e}", directory.display())))?;

        debug!(dir = %directory.display(), "notify watcher attached");
        self.watcher = Some(watcher);
        self.watched = Some(directory.to_path_buf());
        Ok(rx)
    }

    fn unsubscribe(&mut self) {
        if let (Some(mut w), Some(dir)) = (self.watcher.take(), self.watched.take()) {
            if let Err(e) = w.unwatch(&dir) {
                debug!(error = %e, "unwatch failed (directory probably gone)");
            }
        }
    }
}

// ────── synthetic source ─────────────────────────────────────────────────────

/// Event source fed by hand. Keep the [`ChannelSourceHandle`] to push events;
/// nothing touches the filesystem.
pub struct ChannelSource {
    rx: Option<Receiver<SourceEvent>>,
    fail_with: Option<String>,
}

#[derive(Clone)]
pub struct ChannelSourceHandle {
    tx: Sender<SourceEvent>,
}

impl ChannelSource {
    pub fn new() -> (Self, ChannelSourceHandle) {
        let (tx, rx) = unbounded();
        (
            Self {
                rx: Some(rx),
                fail_with: None,
            },
            ChannelSourceHandle { tx },
        )
    }

    /// A source whose `subscribe` always fails, for attach-error paths.
    pub fn failing(reason: &str) -> Self {
        Self {
            rx: None,
            fail_with: Some(reason.to_string()),
        }
    }
}

impl EventSource for ChannelSource {
    fn subscribe(&mut self, directory: &Path) -> Result<Receiver<SourceEvent>> {
        if let Some(reason) = &self.fail_with {
            return Err(Error::Attach(format!("{}: {reason}", directory.display())));
        }
        self.rx
            .take()
            .ok_or_else(|| Error::InvalidState("source already subscribed".into()))
    }

    fn unsubscribe(&mut self) {
        self.rx = None;
    }
}

impl ChannelSourceHandle {
    pub fn created(&self, path: impl Into<PathBuf>) {
        let _ = self.tx.send(SourceEvent::Created(path.into()));
    }

    pub fn other(&self, path: impl Into<PathBuf>) {
        let _ = self.tx.send(SourceEvent::Other(path.into()));
    }

    pub fn send(&self, event: SourceEvent) {
        let _ = self.tx.send(event);
    }
}
