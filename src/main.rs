mod balance;
mod budget;
mod cli;
mod error;
mod fmt;
mod fuzzy;
mod income;
mod log;
mod merge;
mod models;
mod normalizer;
mod pipeline;
mod rules;
mod settings;
mod site;
mod workbook;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, ConfigCommands};

fn main() {
    let cli = Cli::parse();

    // diagnostics go to stderr so stdout stays clean for reports
    let default_filter = if cli.verbose { "debug" } else { "warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter)
        .init();

    let trace = cli.trace;
    let result = match cli.command {
        Commands::Run(args) => cli::run::run(args),
        Commands::Inspect { file, year } => cli::inspect::run(&file, year),
        Commands::Config { command } => match command {
            ConfigCommands::Show => cli::config::show(),
            ConfigCommands::SetThreshold { value } => cli::config::set_threshold(value),
            ConfigCommands::Alias { filename, site } => cli::config::alias(&filename, &site),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        if trace {
            let mut cause = std::error::Error::source(&e);
            while let Some(inner) = cause {
                eprintln!("  caused by: {inner}");
                cause = inner.source();
            }
        }
        std::process::exit(1);
    }
}
