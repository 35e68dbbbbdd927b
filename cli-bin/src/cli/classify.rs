// src/cli/classify.rs

use crate::cli::Format;
use anyhow::Result;
use clap::Args;
use libfilesort::classify::extension_of;
use libfilesort::{CategoryTable, Config, ExtensionIndex};
use serde_json::json;
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
pub struct ClassifyOpts {
    /// Files (or bare file names) to classify; nothing is moved
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

/// Build the index straight from the table so `classify` works without a
/// watched directory.
pub fn index_for(cfg: &Config) -> Result<(CategoryTable, ExtensionIndex)> {
    let table = cfg.category_table();
    let index = ExtensionIndex::build(&table, &cfg.catch_all_category)?;
    Ok((table, index))
}

pub fn run(opts: &ClassifyOpts, cfg: &Config, format: Format) -> Result<()> {
    let (_, index) = index_for(cfg)?;
    match format {
        Format::Text => {
            for f in &opts.files {
                println!("{}\t{}", index.category_for(f), f.display());
            }
        }
        Format::Json => {
            let rows: Vec<_> = opts
                .files
                .iter()
                .map(|f| {
                    json!({
                        "path": f.display().to_string(),
                        "extension": extension_of(f),
                        "category": index.category_for(f),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
    }
    Ok(())
}
