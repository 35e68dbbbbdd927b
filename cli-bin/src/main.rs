//! filesort CLI entry-point
//!
//! All heavy lifting lives in the `libfilesort` crate; this file handles
//! argument parsing, logging and dispatch.

use filesort_cli::cli::{self, Cli, Commands};
use libfilesort::logging;

use anyhow::{bail, Result};
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use std::io;

fn main() -> Result<()> {
    /* ── CLI parsing & logging ────────────────────────────────── */
    let args = Cli::parse();
    logging::init(args.log_format.into(), args.verbose);

    /* ── shell-completion shortcut ────────────────────────────── */
    if let Commands::Completions { shell } = &args.command {
        let mut cmd = Cli::command();
        generate(*shell, &mut cmd, "filesort", &mut io::stdout());
        return Ok(());
    }

    /* ── config ──────────────────────────────────────────────── */
    let cfg = cli::load_config(args.config.as_ref())?;

    /* ── command dispatch ────────────────────────────────────── */
    match &args.command {
        Commands::Completions { .. } => {} // handled above

        Commands::Watch(opts) => {
            let stop = cli::watch::ctrlc_channel()?;
            cli::watch::run(opts, cfg, stop)?;
        }

        Commands::Sweep(opts) => {
            let failed = cli::sweep::run(opts, cfg, args.format)?;
            if failed > 0 {
                bail!("{failed} file(s) could not be moved");
            }
        }

        Commands::Classify(opts) => cli::classify::run(opts, &cfg, args.format)?,
        Commands::Categories => cli::categories::run(&cfg, args.format)?,
    }

    Ok(())
}
