pub mod config;
pub mod inspect;
pub mod run;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "tally",
    about = "Consolidate per-site income statements and balance sheets into a master workbook."
)]
pub struct Cli {
    /// Emit debug diagnostics on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
    /// On failure, print every underlying cause
    #[arg(long, global = true)]
    pub trace: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Merge source statements, budget and last year's figures into the template.
    Run(run::RunArgs),
    /// Show what would be extracted from one source workbook.
    Inspect {
        /// Source workbook, e.g. fs2025Bedford.xlsx
        file: PathBuf,
        /// Reporting year used for site resolution (default: current year)
        #[arg(long)]
        year: Option<i32>,
    },
    /// View or change saved settings.
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print current settings.
    Show,
    /// Set the default fuzzy-match threshold (0-100).
    SetThreshold {
        value: u8,
    },
    /// Map a source filename to a template site header.
    Alias {
        /// Source filename, e.g. fs2025Kingston.xlsx
        filename: String,
        /// Site header as written in the template, e.g. "12 Kingston"
        site: String,
    },
}
