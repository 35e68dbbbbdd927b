//! End-to-end: run the real binary, drop a file in, Ctrl+C it.

#![cfg(unix)]

use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::tempdir;

mod util;
use util::{bin, downloads};

#[test]
fn watch_binary_sorts_and_exits_cleanly_on_sigint() {
    let tmp = tempdir().unwrap();
    let dir = downloads(&tmp);
    let cfg = tmp.path().join("config.json");
    std::fs::write(&cfg, "{}").unwrap();

    let mut child = Command::new(bin())
        .env("FILESORT_CONFIG", &cfg)
        .args(["watch", &dir.to_string_lossy(), "--debounce-secs", "0.3"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    thread::sleep(Duration::from_millis(800));
    std::fs::write(dir.join("archive.tar.gz"), "not really").unwrap();
    std::fs::write(dir.join("movie.mkv"), "frames").unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    let want = [dir.join("Other/archive.tar.gz"), dir.join("Videos/movie.mkv")];
    while Instant::now() < deadline && !want.iter().all(|p| p.is_file()) {
        thread::sleep(Duration::from_millis(50));
    }

    unsafe {
        libc::kill(child.id() as libc::pid_t, libc::SIGINT);
    }
    let status = child.wait().unwrap();

    for p in &want {
        assert!(p.is_file(), "{} not created", p.display());
    }
    assert!(status.success(), "exit status {status:?}");
}
