//! tests/util.rs
//! Small helpers shared across integration tests.

#![allow(dead_code)]

use assert_cmd::Command;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Absolute path to the freshly-built `filesort` binary.
pub fn bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_filesort"))
}

/// Write `json` to `<tmp>/config.json` and return its path.
pub fn write_config(tmp: &TempDir, json: &str) -> PathBuf {
    let path = tmp.path().join("config.json");
    std::fs::write(&path, json).unwrap();
    path
}

/// Build a `Command` for `filesort` whose `FILESORT_CONFIG` is
/// `<tmp>/config.json` (an empty object unless the test wrote one), so the
/// user's real config never leaks in.
pub fn filesort(tmp: &TempDir) -> Command {
    let cfg: &Path = &tmp.path().join("config.json");
    if !cfg.exists() {
        std::fs::write(cfg, "{}").unwrap();
    }
    let mut cmd = Command::new(bin());
    cmd.env("FILESORT_CONFIG", cfg);
    cmd.env_remove("RUST_LOG");
    cmd
}

/// A `downloads/` directory inside the temp dir.
pub fn downloads(tmp: &TempDir) -> PathBuf {
    let dir = tmp.path().join("downloads");
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
