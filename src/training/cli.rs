//! Command-line interface for the disaster message classifier trainer.

use super::config::Config;
use super::train::run_training;
use crate::error::{Result, TriageError};
use clap::error::ErrorKind;
use clap::Parser;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Process exit status for a completed run (and for `--help`).
pub const EXIT_SUCCESS: u8 = 0;
/// Any fatal runtime error: data access, fitting, persistence, configuration.
pub const EXIT_FAILURE: u8 = 1;
/// Wrong arguments; nothing was read or written.
pub const EXIT_USAGE: u8 = 2;

/// Configuration read when `--config` is not given; it may be absent.
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

const EXAMPLE: &str = "Example: disaster-triage ../data/DisasterResponse.db classifier.json";

/// Train a multi-label classifier for disaster response messages.
#[derive(Debug, Parser)]
#[command(name = "disaster-triage", version, after_help = EXAMPLE)]
pub struct Cli {
    /// SQLite database holding the cleaned messages table
    pub database_filepath: PathBuf,
    /// File the trained model is written to
    pub model_filepath: PathBuf,
    /// Training configuration (grid, split, seeds) [default: config.toml]
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Print command-line usage information.
pub fn print_usage() {
    println!(
        "Please provide the filepath of the disaster messages database as the first \
         argument and the filepath of the model file to save the model to as the \
         second argument.\n\n{}",
        EXAMPLE
    );
}

/// Parse arguments (including program name) without touching the filesystem.
pub fn parse_args<I, T>(args: I) -> std::result::Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    Cli::try_parse_from(args)
}

/// Load the configuration named on the command line.
///
/// An explicit `--config` path must exist. Without the flag, a missing
/// `config.toml` falls back to the defaults.
pub fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => Config::load(path),
        None => Config::load_or_default(Path::new(DEFAULT_CONFIG_PATH)),
    }
}

fn execute(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    run_training(&cli.database_filepath, &cli.model_filepath, &config)?;
    Ok(())
}

/// Main entry point for the CLI; returns the process exit status.
///
/// # Arguments
///
/// * `args` - Command-line arguments (including program name)
pub fn run<I, T>(args: I) -> u8
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match parse_args(args) {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return EXIT_SUCCESS;
        }
        Err(e) => {
            eprintln!("{}", TriageError::Usage(e.kind().to_string()));
            print_usage();
            return EXIT_USAGE;
        }
    };

    match execute(&cli) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            EXIT_FAILURE
        }
    }
}
