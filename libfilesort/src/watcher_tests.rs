// libfilesort/src/watcher_tests.rs
//! End-to-end behaviour of the watch loop, driven by a synthetic event
//! source so no OS notifications are involved (except in the last test).

use super::categories::{CategoryTable, ExtensionIndex, DEFAULT_CATCH_ALL};
use super::ignore::{IgnoreList, DEFAULT_IGNORE_PATTERNS};
use super::organizer::{OrganizeResult, Organizer};
use super::source::{ChannelSource, ChannelSourceHandle, NotifySource, SourceEvent};
use super::watcher::{FileWatcher, WatcherConfig, WatcherState};
use crate::error::Error;
use crate::test_utils::wait_until;
use crossbeam_channel::{unbounded, Receiver};
use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tempfile::{tempdir, TempDir};

const DEBOUNCE: Duration = Duration::from_millis(150);

struct Harness {
    _tmp: TempDir,
    root: PathBuf,
    watcher: FileWatcher,
    events: ChannelSourceHandle,
    results: Receiver<OrganizeResult>,
}

fn harness() -> Harness {
    let tmp = tempdir().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    let organizer = Organizer::new(
        root.clone(),
        ExtensionIndex::build(&CategoryTable::default(), DEFAULT_CATCH_ALL).unwrap(),
        IgnoreList::new(DEFAULT_IGNORE_PATTERNS).unwrap(),
    );
    let mut watcher = FileWatcher::new(
        organizer,
        WatcherConfig {
            debounce: DEBOUNCE,
            workers: 2,
            max_settle_checks: 5,
        },
    );
    let (tx, results) = unbounded();
    watcher.on_result(tx);

    let (source, events) = ChannelSource::new();
    watcher.start(Box::new(source)).unwrap();

    Harness {
        _tmp: tmp,
        root,
        watcher,
        events,
        results,
    }
}

fn next_result(h: &Harness) -> OrganizeResult {
    h.results
        .recv_timeout(Duration::from_secs(5))
        .expect("no organize result within 5s")
}

fn assert_no_more_results(h: &Harness) {
    let extra = h.results.recv_timeout(DEBOUNCE * 4);
    assert!(extra.is_err(), "unexpected extra result: {:?}", extra);
}

#[test]
fn created_file_is_moved_after_the_debounce_window() {
    let mut h = harness();
    let src = h.root.join("report.PDF");
    fs::write(&src, "%PDF").unwrap();
    h.events.created(&src);

    // still there right after the event
    thread::sleep(DEBOUNCE / 3);
    assert!(src.exists());

    let res = next_result(&h);
    assert_eq!(
        res.destination(),
        Some(h.root.join("Documents").join("report.PDF").as_path())
    );
    assert!(!src.exists());

    h.watcher.stop().unwrap();
    let status = h.watcher.status().unwrap();
    assert_eq!(status.state, WatcherState::Stopped);
    assert_eq!(status.organized, 1);
    assert_eq!(status.failed, 0);
}

#[test]
fn collision_in_category_dir_gets_suffix() {
    let mut h = harness();
    fs::create_dir(h.root.join("Documents")).unwrap();
    fs::write(h.root.join("Documents/report.pdf"), "first").unwrap();

    let src = h.root.join("report.pdf");
    fs::write(&src, "second").unwrap();
    h.events.created(&src);

    let res = next_result(&h);
    assert_eq!(
        res.destination(),
        Some(h.root.join("Documents/report (1).pdf").as_path())
    );
    assert_eq!(
        fs::read_to_string(h.root.join("Documents/report.pdf")).unwrap(),
        "first"
    );
    h.watcher.stop().unwrap();
}

#[test]
fn unknown_extension_lands_in_catch_all() {
    let mut h = harness();
    let src = h.root.join("archive.xyz");
    fs::write(&src, "?").unwrap();
    h.events.created(&src);

    let res = next_result(&h);
    assert_eq!(
        res.destination(),
        Some(h.root.join("Other/archive.xyz").as_path())
    );
    h.watcher.stop().unwrap();
}

#[test]
fn duplicate_events_within_window_organize_once() {
    let mut h = harness();
    let src = h.root.join("notes.txt");
    fs::write(&src, "draft").unwrap();

    h.events.created(&src);
    thread::sleep(DEBOUNCE / 3);
    h.events.created(&src);

    let res = next_result(&h);
    assert!(res.is_moved());
    assert_no_more_results(&h);

    h.watcher.stop().unwrap();
    let status = h.watcher.status().unwrap();
    assert_eq!(status.events_received, 2);
    assert_eq!(status.duplicates_dropped, 1);
    assert_eq!(status.organized, 1);
}

#[test]
fn event_for_in_flight_path_is_dropped() {
    let mut h = harness();
    let src = h.root.join("clip.mp4");
    fs::write(&src, "video").unwrap();

    // pretend a worker already owns this path
    assert!(h.watcher.processed().claim(&src));
    h.events.created(&src);
    assert_no_more_results(&h);
    assert!(src.exists());

    h.watcher.processed().release(&src);
    h.events.created(&src);
    assert!(next_result(&h).is_moved());

    h.watcher.stop().unwrap();
    assert_eq!(h.watcher.status().unwrap().duplicates_dropped, 1);
}

#[test]
fn file_deleted_during_window_is_dropped_quietly() {
    let mut h = harness();
    let src = h.root.join("temp.docx");
    fs::write(&src, "x").unwrap();
    h.events.created(&src);
    fs::remove_file(&src).unwrap();

    assert_no_more_results(&h);
    assert!(wait_until(Duration::from_secs(2), || {
        h.watcher.status().unwrap().dropped_not_ready == 1
    }));
    assert!(!h.root.join("Documents").exists());

    let status = h.watcher.status().unwrap();
    assert_eq!(status.state, WatcherState::Watching);
    assert_eq!(status.failed, 0);
    h.watcher.stop().unwrap();
}

#[test]
fn processed_set_is_empty_once_work_is_done() {
    let mut h = harness();
    for name in ["a.png", "b.mp3", "c.csv", "d.bin"] {
        let p = h.root.join(name);
        fs::write(&p, name).unwrap();
        h.events.created(&p);
    }
    for _ in 0..4 {
        assert!(next_result(&h).is_moved());
    }
    assert!(wait_until(Duration::from_secs(1), || h
        .watcher
        .processed()
        .is_empty()));
    h.watcher.stop().unwrap();
    assert_eq!(h.watcher.status().unwrap().in_flight, 0);
}

#[test]
fn non_creation_events_and_ignored_names_do_nothing() {
    let mut h = harness();
    let src = h.root.join("keep.pdf");
    fs::write(&src, "x").unwrap();
    h.events.other(&src);
    h.events.send(SourceEvent::Error("backend hiccup".into()));

    let partial = h.root.join("big.iso.crdownload");
    fs::write(&partial, "x").unwrap();
    h.events.created(&partial);

    assert_no_more_results(&h);
    assert!(src.exists());
    assert!(partial.exists());

    h.watcher.stop().unwrap();
    let status = h.watcher.status().unwrap();
    assert_eq!(status.events_received, 1);
    assert_eq!(status.ignored, 1);
}

#[test]
fn directories_are_not_moved() {
    let mut h = harness();
    let dir = h.root.join("album.jpg");
    fs::create_dir(&dir).unwrap();
    h.events.created(&dir);

    assert_no_more_results(&h);
    assert!(dir.is_dir());
    h.watcher.stop().unwrap();
}

#[test]
fn file_still_being_written_waits_for_another_window() {
    let mut h = harness();
    let src = h.root.join("download.zip");
    fs::write(&src, "part 1").unwrap();
    h.events.created(&src);

    // keep touching the file past the first deadline
    for i in 0..10 {
        thread::sleep(DEBOUNCE / 5);
        fs::write(&src, format!("part {i}")).unwrap();
    }
    let res = next_result(&h);
    assert!(res.is_moved());
    assert_eq!(
        fs::read_to_string(h.root.join("Other/download.zip")).unwrap(),
        "part 9"
    );
    h.watcher.stop().unwrap();
}

#[test]
fn stop_abandons_pending_files() {
    let mut h = harness();
    let src = h.root.join("late.txt");
    fs::write(&src, "x").unwrap();
    h.events.created(&src);

    h.watcher.stop().unwrap();
    thread::sleep(DEBOUNCE * 2);
    assert!(src.exists(), "pending file must not be moved after stop");
    let status = h.watcher.status().unwrap();
    assert_eq!(status.state, WatcherState::Stopped);
    assert_eq!(status.pending, 0);
}

#[test]
fn lifecycle_transitions() {
    let tmp = tempdir().unwrap();
    let organizer = Organizer::new(
        tmp.path().canonicalize().unwrap(),
        ExtensionIndex::build(&CategoryTable::default(), DEFAULT_CATCH_ALL).unwrap(),
        IgnoreList::default(),
    );
    let mut watcher = FileWatcher::new(organizer, WatcherConfig::default());
    assert_eq!(watcher.status().unwrap().state, WatcherState::Idle);

    let (source, _handle) = ChannelSource::new();
    watcher.start(Box::new(source)).unwrap();
    assert_eq!(watcher.status().unwrap().state, WatcherState::Watching);

    // already watching: no-op
    let (again, _h2) = ChannelSource::new();
    watcher.start(Box::new(again)).unwrap();

    watcher.stop().unwrap();
    assert_eq!(watcher.status().unwrap().state, WatcherState::Stopped);
    watcher.stop().unwrap();

    let (late, _h3) = ChannelSource::new();
    assert!(matches!(
        watcher.start(Box::new(late)),
        Err(Error::InvalidState(_))
    ));
}

#[test]
fn attach_failure_leaves_watcher_idle() {
    let tmp = tempdir().unwrap();
    let organizer = Organizer::new(
        tmp.path().canonicalize().unwrap(),
        ExtensionIndex::build(&CategoryTable::default(), DEFAULT_CATCH_ALL).unwrap(),
        IgnoreList::default(),
    );
    let mut watcher = FileWatcher::new(organizer, WatcherConfig::default());
    let err = watcher
        .start(Box::new(ChannelSource::failing("too many watches")))
        .unwrap_err();
    assert!(matches!(err, Error::Attach(_)));
    assert_eq!(watcher.status().unwrap().state, WatcherState::Idle);
}

#[test]
fn source_disconnect_winds_the_loop_down() {
    let Harness {
        _tmp,
        root,
        mut watcher,
        events,
        results,
    } = harness();
    let src = root.join("last.wav");
    fs::write(&src, "x").unwrap();
    events.created(&src);
    drop(events);

    // pending work still completes before the loop winds down
    assert!(results.recv_timeout(Duration::from_secs(5)).unwrap().is_moved());
    assert!(wait_until(Duration::from_secs(2), || {
        watcher.status().unwrap().state == WatcherState::Stopped
    }));
    watcher.stop().unwrap();
}

#[test]
fn real_notify_source_moves_new_files() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    let organizer = Organizer::new(
        root.clone(),
        ExtensionIndex::build(&CategoryTable::default(), DEFAULT_CATCH_ALL).unwrap(),
        IgnoreList::new(DEFAULT_IGNORE_PATTERNS).unwrap(),
    );
    let mut watcher = FileWatcher::new(
        organizer,
        WatcherConfig {
            debounce: Duration::from_millis(200),
            ..Default::default()
        },
    );
    let (tx, results) = unbounded();
    watcher.on_result(tx);
    watcher.start(Box::new(NotifySource::new())).unwrap();
    thread::sleep(Duration::from_millis(200));

    fs::write(root.join("song.MP3"), "la la").unwrap();

    let res = results
        .recv_timeout(Duration::from_secs(10))
        .expect("notify never delivered the creation");
    assert_eq!(res.destination(), Some(root.join("Audio/song.MP3").as_path()));

    watcher.stop().unwrap();
    assert_eq!(watcher.status().unwrap().state, WatcherState::Stopped);
}
