//! Collision-free destination paths.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

/// Return a path inside `destination_dir` for `filename` that does not exist
/// right now. Collisions get a ` (n)` suffix before the extension:
/// `report.pdf`, `report (1).pdf`, `report (2).pdf`, ...
///
/// Only reads the filesystem. An error from the existence check (e.g. the
/// directory is unreadable) is returned instead of being taken as "free".
pub fn resolve(destination_dir: &Path, filename: &Path) -> io::Result<PathBuf> {
    let candidate = destination_dir.join(filename);
    if !candidate.try_exists()? {
        return Ok(candidate);
    }

    let (stem, ext) = split_name(filename);
    let mut n: u64 = 1;
    loop {
        let mut name = stem.clone();
        name.push(format!(" ({n})"));
        if let Some(ext) = &ext {
            name.push(".");
            name.push(ext);
        }
        let candidate = destination_dir.join(name);
        if !candidate.try_exists()? {
            return Ok(candidate);
        }
        n += 1;
    }
}

/// `archive.tar.gz` → (`archive.tar`, `gz`); `README` → (`README`, None).
fn split_name(filename: &Path) -> (OsString, Option<OsString>) {
    let stem = filename
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| filename.as_os_str().to_os_string());
    let ext = filename.extension().map(|e| e.to_os_string());
    (stem, ext)
}
