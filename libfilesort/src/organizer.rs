//! classify → resolve → move, one file at a time.

use crate::categories::ExtensionIndex;
use crate::error::Error;
use crate::ignore::IgnoreList;
use crate::mover::{self, MoveMethod};
use crate::resolve::resolve;
use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// How often a destination that got taken between resolve and move is
/// re-resolved before giving up.
const MAX_RESOLVE_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotARegularFile,
    Ignored,
    OutsideRoot,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotARegularFile => "not a regular file",
            Self::Ignored => "matches an ignore pattern",
            Self::OutsideRoot => "not directly inside the watched directory",
        }
    }
}

/// Outcome of one organize attempt.
#[derive(Debug)]
pub enum OrganizeResult {
    Moved {
        source: PathBuf,
        category: String,
        destination: PathBuf,
        method: MoveMethod,
        at: DateTime<Local>,
    },
    Skipped {
        source: PathBuf,
        reason: SkipReason,
    },
    Failed {
        source: PathBuf,
        category: Option<String>,
        error: Error,
    },
}

impl OrganizeResult {
    pub fn source(&self) -> &Path {
        match self {
            Self::Moved { source, .. }
            | Self::Skipped { source, .. }
            | Self::Failed { source, .. } => source,
        }
    }

    pub fn destination(&self) -> Option<&Path> {
        match self {
            Self::Moved { destination, .. } => Some(destination),
            _ => None,
        }
    }

    pub fn is_moved(&self) -> bool {
        matches!(self, Self::Moved { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// One structured log line per attempt.
    pub fn log(&self) {
        match self {
            Self::Moved {
                source,
                category,
                destination,
                method,
                at,
            } => info!(
                at = %at.to_rfc3339(),
                source = %source.display(),
                category = %category,
                destination = %destination.display(),
                method = method.as_str(),
                "organized"
            ),
            Self::Skipped { source, reason } => debug!(
                source = %source.display(),
                reason = reason.as_str(),
                "skipped"
            ),
            Self::Failed {
                source,
                category,
                error,
            } => warn!(
                at = %Local::now().to_rfc3339(),
                source = %source.display(),
                category = category.as_deref().unwrap_or("-"),
                kind = error.kind(),
                error = %error,
                "organize failed"
            ),
        }
    }
}

/// Moves files from the watched root into `<root>/<category>/`.
///
/// Cheap to clone; every worker thread holds one.
#[derive(Debug, Clone)]
pub struct Organizer {
    root: Arc<PathBuf>,
    index: Arc<ExtensionIndex>,
    ignore: Arc<IgnoreList>,
    dir_locks: Arc<DirLocks>,
}

/// One mutex per category directory. Picking a free name and taking it has
/// to happen under the same lock, or two workers can pick the same name.
#[derive(Debug, Default)]
struct DirLocks {
    inner: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl DirLocks {
    fn for_dir(&self, dir: &Path) -> Arc<Mutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        map.entry(dir.to_path_buf()).or_default().clone()
    }
}

impl Organizer {
    pub fn new(root: PathBuf, index: ExtensionIndex, ignore: IgnoreList) -> Self {
        Self {
            root: Arc::new(root),
            index: Arc::new(index),
            ignore: Arc::new(ignore),
            dir_locks: Arc::default(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index(&self) -> &ExtensionIndex {
        &self.index
    }

    pub fn ignore_list(&self) -> &IgnoreList {
        &self.ignore
    }

    pub fn category_dir(&self, category: &str) -> PathBuf {
        self.root.join(category)
    }

    /// Organize a single file. Never panics, never returns an error: every
    /// failure ends up in the returned `OrganizeResult`.
    pub fn organize(&self, path: &Path) -> OrganizeResult {
        let source = path.to_path_buf();

        if path.parent() != Some(self.root.as_path()) {
            return OrganizeResult::Skipped {
                source,
                reason: SkipReason::OutsideRoot,
            };
        }
        if self.ignore.is_ignored(path) {
            return OrganizeResult::Skipped {
                source,
                reason: SkipReason::Ignored,
            };
        }

        // follows symlinks: a link to a directory is skipped like a directory
        match fs::metadata(path) {
            Ok(m) if m.is_file() => {}
            Ok(_) => {
                return OrganizeResult::Skipped {
                    source,
                    reason: SkipReason::NotARegularFile,
                }
            }
            Err(e) => {
                return OrganizeResult::Failed {
                    source,
                    category: None,
                    error: vanished_or_io(path, e),
                }
            }
        }

        let category = self.index.category_for(path).to_string();
        match self.move_into(path, &category) {
            Ok((destination, method)) => OrganizeResult::Moved {
                source,
                category,
                destination,
                method,
                at: Local::now(),
            },
            Err(error) => OrganizeResult::Failed {
                source,
                category: Some(category),
                error,
            },
        }
    }

    fn move_into(&self, path: &Path, category: &str) -> Result<(PathBuf, MoveMethod), Error> {
        self.move_into_with(path, category, resolve)
    }

    /// `pick` chooses the destination inside the category directory; it is
    /// asked again whenever the chosen name turns out to be taken.
    pub(crate) fn move_into_with<F>(
        &self,
        path: &Path,
        category: &str,
        mut pick: F,
    ) -> Result<(PathBuf, MoveMethod), Error>
    where
        F: FnMut(&Path, &Path) -> io::Result<PathBuf>,
    {
        let dest_dir = self.ensure_category_dir(category)?;
        let Some(file_name) = path.file_name() else {
            return Err(Error::Transient(format!("{} has no file name", path.display())));
        };

        let lock = self.dir_locks.for_dir(&dest_dir);
        let _guard = lock.lock().unwrap_or_else(|p| p.into_inner());

        for attempt in 1..=MAX_RESOLVE_ATTEMPTS {
            let destination = pick(&dest_dir, Path::new(file_name)).map_err(|e| {
                Error::Move(format!("probing {}: {e}", dest_dir.display()))
            })?;
            match mover::move_file(path, &destination) {
                Ok(method) => return Ok((destination, method)),
                Err(Error::Io(e)) if e.kind() == io::ErrorKind::AlreadyExists => {
                    debug!(
                        destination = %destination.display(),
                        attempt,
                        "destination taken before move, resolving again"
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Err(Error::Transient(format!(
            "destination for {} kept being taken",
            path.display()
        )))
    }

    /// Create `<root>/<category>` if needed. Losing a creation race to
    /// another worker is fine; anything that is not a directory is not.
    pub fn ensure_category_dir(&self, category: &str) -> Result<PathBuf, Error> {
        let dir = self.category_dir(category);
        match fs::create_dir(&dir) {
            Ok(()) => {
                info!(dir = %dir.display(), "created category directory");
                Ok(dir)
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                if dir.is_dir() {
                    Ok(dir)
                } else {
                    Err(Error::Move(format!(
                        "{} exists but is not a directory",
                        dir.display()
                    )))
                }
            }
            Err(e) => Err(Error::Move(format!("create {}: {e}", dir.display()))),
        }
    }

    /// Organize every regular file already sitting directly in the root.
    pub fn sweep(&self) -> Vec<OrganizeResult> {
        let mut results = Vec::new();
        for entry in WalkDir::new(self.root.as_path())
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| match e {
                Ok(e) => Some(e),
                Err(err) => {
                    warn!(error = %err, "sweep: unreadable entry");
                    None
                }
            })
            // symlinks are followed by organize(), so only skip real dirs here
            .filter(|e| !e.file_type().is_dir())
        {
            let res = self.organize(entry.path());
            res.log();
            results.push(res);
        }
        info!(
            root = %self.root.display(),
            moved = results.iter().filter(|r| r.is_moved()).count(),
            failed = results.iter().filter(|r| r.is_failed()).count(),
            "sweep complete"
        );
        results
    }
}

fn vanished_or_io(path: &Path, e: io::Error) -> Error {
    if e.kind() == io::ErrorKind::NotFound {
        Error::Transient(format!("{} vanished", path.display()))
    } else {
        Error::Transient(format!("{}: {e}", path.display()))
    }
}
