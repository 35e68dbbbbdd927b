// src/cli/watch.rs

use anyhow::{Context, Result};
use clap::Args;
use crossbeam_channel::{bounded, select, Receiver};
use libfilesort::{Config, FileWatcher, Filesort, WatcherState};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;

/// How often the run loop logs a status line.
const STATUS_EVERY: Duration = Duration::from_secs(10);

#[derive(Args, Debug, Clone, Default)]
pub struct WatchOpts {
    /// Directory to watch (defaults to the configured one, then ~/Downloads)
    pub path: Option<PathBuf>,

    /// Quiescence delay in seconds before a new file is moved
    #[arg(long)]
    pub debounce_secs: Option<f64>,

    /// Folder name for files whose extension matches no category
    #[arg(long)]
    pub catch_all: Option<String>,

    /// Number of worker threads moving files
    #[arg(long)]
    pub workers: Option<usize>,

    /// Sort files already in the directory before watching
    #[arg(long)]
    pub sweep: bool,
}

impl WatchOpts {
    /// Command-line values win over the configuration file.
    pub fn apply(&self, cfg: &mut Config) {
        if let Some(p) = &self.path {
            cfg.watched_directory = Some(p.clone());
        }
        if let Some(d) = self.debounce_secs {
            cfg.debounce_seconds = d;
        }
        if let Some(c) = &self.catch_all {
            cfg.catch_all_category = c.clone();
        }
        if let Some(w) = self.workers {
            cfg.workers = w;
        }
    }
}

/// Install the Ctrl+C handler and return the channel it signals on.
pub fn ctrlc_channel() -> Result<Receiver<()>> {
    let (tx, rx) = bounded(1);
    ctrlc::set_handler(move || {
        info!("Ctrl+C received. Signaling watcher to stop...");
        let _ = tx.try_send(());
    })
    .context("installing Ctrl+C handler")?;
    Ok(rx)
}

/// Validate, attach, then (with `--sweep`) tidy what is already there.
/// Attaching first means a file arriving during the sweep still gets an
/// event.
pub fn start(opts: &WatchOpts, mut cfg: Config) -> Result<FileWatcher> {
    opts.apply(&mut cfg);
    let app = Filesort::new(&cfg)?;
    let watcher = app.watch()?;
    if opts.sweep {
        app.sweep();
    }
    Ok(watcher)
}

/// Run the watcher until `stop` fires (or the watcher dies on its own).
pub fn run(opts: &WatchOpts, cfg: Config, stop: Receiver<()>) -> Result<()> {
    let mut watcher = start(opts, cfg)?;
    info!("Watcher started. Press Ctrl+C to stop watching.");

    let start_time = Instant::now();
    loop {
        select! {
            recv(stop) -> _ => break,
            default(STATUS_EVERY) => {
                let status = watcher.status()?;
                if status.state == WatcherState::Stopped {
                    info!("Watcher has stopped on its own. Exiting loop.");
                    break;
                }
                info!(
                    uptime_s = start_time.elapsed().as_secs(),
                    organized = status.organized,
                    failed = status.failed,
                    pending = status.pending,
                    in_flight = status.in_flight,
                    "watcher running"
                );
            }
        }
    }

    watcher.stop()?;
    let status = watcher.status()?;
    info!(
        organized = status.organized,
        failed = status.failed,
        duplicates = status.duplicates_dropped,
        "Watcher instance fully stopped."
    );
    Ok(())
}
