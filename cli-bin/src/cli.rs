// src/cli.rs

pub mod categories;
pub mod classify;
pub mod sweep;
pub mod watch;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use libfilesort::logging::LogFormat;
use libfilesort::Config;

/// Output format for commands that print results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Text,
    Json,
}

/// filesort – keep a downloads folder tidy by sorting new files into
/// category folders
#[derive(Parser, Debug)]
#[command(name = "filesort", author, version, about)]
pub struct Cli {
    /// JSON configuration file (overrides $FILESORT_CONFIG and the
    /// per-user config file)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Output format for printed results
    #[arg(long, value_enum, default_value_t = Format::Text, global = true)]
    pub format: Format,

    /// Log line format on stderr
    #[arg(long, value_enum, default_value_t = LogStyle::Text, global = true)]
    pub log_format: LogStyle,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogStyle {
    Text,
    Json,
}

impl From<LogStyle> for LogFormat {
    fn from(s: LogStyle) -> Self {
        match s {
            LogStyle::Text => LogFormat::Text,
            LogStyle::Json => LogFormat::Json,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch a directory and sort every new file into its category folder
    ///
    /// Example:
    ///     filesort watch ~/Downloads --debounce-secs 3
    Watch(watch::WatchOpts),

    /// Sort the files already sitting in a directory, then exit
    Sweep(sweep::SweepOpts),

    /// Show which category folder files would be sorted into
    Classify(classify::ClassifyOpts),

    /// Print the effective category table
    Categories,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Load the configuration the same way for every command: explicit
/// `--config` first, then [`Config::load`].
pub fn load_config(explicit: Option<&PathBuf>) -> Result<Config> {
    match explicit {
        Some(p) => Config::from_file(p)
            .with_context(|| format!("loading --config {}", p.display())),
        None => Config::load(),
    }
}
