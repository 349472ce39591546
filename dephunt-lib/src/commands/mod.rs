//! Command-line interface for dephunt
//!
//! This module turns command-line arguments and an optional TOML configuration
//! file into a harvest run, then prints one summary line per ecosystem.
//!
//! # Implementation Model
//!
//! The `run` function parses arguments with clap and hands them to
//! `process_download`, which:
//!
//! 1. Sets up logging and loads the configuration
//! 2. Decides which packages to fetch (explicit list, previous failures, or discovery)
//! 3. Runs the harvest for each selected ecosystem with a progress bar on stderr
//! 4. Reports per-ecosystem counts to the host's output stream and errors to its error stream

mod common;
mod config;
mod download;
mod host;
mod progress_reporter;
mod run;

#[cfg(debug_assertions)]
pub use config::Config;

pub use download::{DownloadArgs, process_download};
pub use host::Host;
pub use progress_reporter::ProgressReporter;
pub use run::run;
