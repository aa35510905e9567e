//! Command-line arguments of the `microtest` tool.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "microtest",
    version,
    about = "Inspect and compare golden reference data recorded by microtest."
)]
pub struct MicrotestArgs {
    /// Disable coloured output.
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// An enumeration of all available CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compare two JSON files by decoded value and show a three-way diff.
    Diff {
        /// The reference document.
        #[arg(required = true)]
        expected: PathBuf,
        /// The document to check against it.
        #[arg(required = true)]
        actual: PathBuf,
    },
    /// Check that every testdata/**/results.json under a directory decodes.
    Check {
        /// The directory to search.
        #[arg(default_value = ".")]
        root: PathBuf,
    },
}
