//! Misc shared helpers.

use std::path::{Path, PathBuf};

/// Expand a leading `~` the way a shell would.
pub fn expand_path(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(s) => PathBuf::from(shellexpand::tilde(s).into_owned()),
        None => path.to_path_buf(),
    }
}

/// Canonicalize, falling back to the path as given when that fails.
///
/// Event backends report canonical paths on some platforms (`/private/var`
/// on macOS), so the watched root has to be canonical too for parent
/// comparisons to work.
pub fn canonicalize_lossy<P: AsRef<Path>>(p: P) -> PathBuf {
    let p = p.as_ref();
    p.canonicalize().unwrap_or_else(|_| p.to_path_buf())
}
