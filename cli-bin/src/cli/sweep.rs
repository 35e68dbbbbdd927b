// src/cli/sweep.rs

use crate::cli::Format;
use anyhow::Result;
use clap::Args;
use libfilesort::{Config, Filesort, OrganizeResult};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Args, Debug, Clone, Default)]
pub struct SweepOpts {
    /// Directory to tidy (defaults to the configured one, then ~/Downloads)
    pub path: Option<PathBuf>,

    /// Folder name for files whose extension matches no category
    #[arg(long)]
    pub catch_all: Option<String>,
}

#[derive(Serialize)]
struct Row<'a> {
    source: String,
    status: &'a str,
    category: Option<&'a str>,
    destination: Option<String>,
    error: Option<String>,
}

fn row(res: &OrganizeResult) -> Row<'_> {
    match res {
        OrganizeResult::Moved {
            source,
            category,
            destination,
            ..
        } => Row {
            source: source.display().to_string(),
            status: "moved",
            category: Some(category.as_str()),
            destination: Some(destination.display().to_string()),
            error: None,
        },
        OrganizeResult::Skipped { source, reason } => Row {
            source: source.display().to_string(),
            status: "skipped",
            category: None,
            destination: None,
            error: Some(reason.as_str().to_string()),
        },
        OrganizeResult::Failed {
            source,
            category,
            error,
        } => Row {
            source: source.display().to_string(),
            status: "failed",
            category: category.as_deref(),
            destination: None,
            error: Some(error.to_string()),
        },
    }
}

/// Returns the number of files that failed to move.
pub fn run(opts: &SweepOpts, mut cfg: Config, format: Format) -> Result<usize> {
    if let Some(p) = &opts.path {
        cfg.watched_directory = Some(p.clone());
    }
    if let Some(c) = &opts.catch_all {
        cfg.catch_all_category = c.clone();
    }
    let app = Filesort::new(&cfg)?;
    let results = app.sweep();
    let rows: Vec<Row> = results.iter().map(row).collect();

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        Format::Text => {
            for r in &rows {
                match (r.status, &r.destination, &r.error) {
                    ("moved", Some(dst), _) => println!("{} -> {}", r.source, dst),
                    (status, _, Some(err)) => println!("{} ({status}: {err})", r.source),
                    (status, _, None) => println!("{} ({status})", r.source),
                }
            }
        }
    }

    Ok(results.iter().filter(|r| r.is_failed()).count())
}
