//! libfilesort – public API surface for the filesort core.
//!
//! Down-stream crates (`cli-bin`, tests) should go through the [`Filesort`]
//! façade and the types re-exported here.

pub mod categories;
pub mod classify;
pub mod config;
pub mod debounce;
pub mod error;
pub mod ignore;
pub mod logging;
pub mod mover;
pub mod organizer;
pub mod resolve;
pub mod source;
pub mod utils;
pub mod watcher;

#[cfg(test)]
mod test_utils;
#[cfg(test)]
mod categories_tests;
#[cfg(test)]
mod watcher_tests;

pub use categories::{CategoryTable, ExtensionIndex};
pub use config::{Config, Settings};
pub use error::{Error, Result};
pub use organizer::{OrganizeResult, Organizer};
pub use source::{ChannelSource, EventSource, NotifySource};
pub use watcher::{FileWatcher, WatcherConfig, WatcherState, WatcherStatus};

use std::path::{Path, PathBuf};

/// Primary façade – validate a configuration once, then sweep, classify or
/// watch.
#[derive(Debug, Clone)]
pub struct Filesort {
    settings: Settings,
    organizer: Organizer,
}

impl Filesort {
    /// Validate `config`. Fails with [`Error::Config`] for anything that
    /// would stop the watcher from starting.
    pub fn new(config: &Config) -> Result<Self> {
        let settings = config.validate()?;
        let organizer = Organizer::new(
            settings.root.clone(),
            settings.index.clone(),
            settings.ignore.clone(),
        );
        Ok(Self {
            settings,
            organizer,
        })
    }

    pub fn root(&self) -> &Path {
        &self.settings.root
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn organizer(&self) -> &Organizer {
        &self.organizer
    }

    /// Category `path` would be filed under.
    pub fn classify(&self, path: &Path) -> &str {
        self.settings.index.category_for(path)
    }

    /// Organize what is already sitting in the watched directory.
    pub fn sweep(&self) -> Vec<OrganizeResult> {
        self.organizer.sweep()
    }

    /// Organize a single file right now, without debouncing.
    pub fn organize(&self, path: &Path) -> OrganizeResult {
        let res = self.organizer.organize(path);
        res.log();
        res
    }

    /// Start watching with the OS event source.
    pub fn watch(&self) -> Result<FileWatcher> {
        self.watch_with(Box::new(NotifySource::new()))
    }

    /// Start watching with any event source (tests use [`ChannelSource`]).
    pub fn watch_with(&self, source: Box<dyn EventSource>) -> Result<FileWatcher> {
        let mut watcher = FileWatcher::new(self.organizer.clone(), self.settings.watcher.clone());
        watcher.start(source)?;
        Ok(watcher)
    }

    /// Watcher that has not been started yet, for callers that want to hook
    /// up [`FileWatcher::on_result`] first.
    pub fn watcher(&self) -> FileWatcher {
        FileWatcher::new(self.organizer.clone(), self.settings.watcher.clone())
    }

    /// Category directories that exist right now under the root.
    pub fn existing_category_dirs(&self) -> Vec<PathBuf> {
        self.settings
            .index
            .category_names()
            .into_iter()
            .map(|c| self.organizer.category_dir(c))
            .filter(|p| p.is_dir())
            .collect()
    }
}
