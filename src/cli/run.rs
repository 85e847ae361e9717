use std::path::{Path, PathBuf};

use chrono::Datelike;
use clap::Args;
use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::error::{Result, TallyError};
use crate::log::Level;
use crate::models::Month;
use crate::pipeline::{consolidate, RunConfig, RunInputs, SourceFile};
use crate::settings::{load_settings, shellexpand_path};

#[derive(Args)]
pub struct RunArgs {
    /// Per-site source workbooks (fs<year><site>.xlsx)
    #[arg(required = true)]
    pub sources: Vec<PathBuf>,
    /// Consolidation template workbook
    #[arg(long)]
    pub template: PathBuf,
    /// Budget workbook with a "Consolidated <year>" sheet
    #[arg(long)]
    pub budget: PathBuf,
    /// Last year's consolidated workbook
    #[arg(long = "last-year")]
    pub last_year: PathBuf,
    /// Reporting year (default: current year)
    #[arg(long)]
    pub year: Option<i32>,
    /// Reporting month: Jan..Dec (default: current month)
    #[arg(long)]
    pub month: Option<String>,
    /// Fuzzy-match threshold 0-100 (default: from settings)
    #[arg(long)]
    pub threshold: Option<u8>,
    /// Output directory (default: from settings)
    #[arg(long = "output-dir")]
    pub output_dir: Option<PathBuf>,
    /// Print the full processing log
    #[arg(long)]
    pub log: bool,
}

fn read(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| TallyError::Other(format!("Cannot read {}: {e}", path.display())))
}

fn read_source(path: &Path) -> Result<SourceFile> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    Ok(SourceFile {
        name,
        bytes: read(path)?,
    })
}

pub fn run(args: RunArgs) -> Result<()> {
    let settings = load_settings();
    let now = chrono::Local::now();
    let year = args.year.unwrap_or(now.year());
    let month = args
        .month
        .unwrap_or_else(|| Month::ALL[now.month0() as usize].to_string());

    let mut config = RunConfig::new(year, &month, args.threshold.unwrap_or(settings.threshold))?;
    config.layout = settings.layout.clone();
    config.site_aliases = settings.site_aliases.clone();

    let inputs = RunInputs {
        sources: args
            .sources
            .iter()
            .map(|p| read_source(p))
            .collect::<Result<Vec<_>>>()?,
        template: read(&args.template)?,
        budget: read(&args.budget)?,
        prior_year: read(&args.last_year)?,
    };

    let report = consolidate(&config, &inputs)?;

    let dir = args
        .output_dir
        .unwrap_or_else(|| shellexpand_path(&settings.output_dir));
    std::fs::create_dir_all(&dir)?;
    let path = dir.join(&report.file_name);
    std::fs::write(&path, &report.output)?;

    let mut table = Table::new();
    table.set_header(vec!["Site", "File", "Column", "Exact", "Fuzzy", "Zeroed"]);
    for site in &report.sites {
        table.add_row(vec![
            Cell::new(&site.site),
            Cell::new(&site.filename),
            Cell::new(site.column),
            Cell::new(site.stats.exact),
            Cell::new(site.stats.fuzzy),
            Cell::new(site.stats.zeroed),
        ]);
    }
    println!("Income statements\n{table}");
    println!(
        "{} balance-sheet cells, {} budget rows, {} last-year rows, {} last-year balances",
        report.balance_cells,
        report.comparatives.budget_rows,
        report.comparatives.prior_rows,
        report.prior_balances
    );
    if !report.duplicates.is_empty() {
        println!("Skipped duplicate uploads: {}", report.duplicates.join(", "));
    }

    if args.log {
        for entry in report.log.entries() {
            let level = match entry.level {
                Level::Error => entry.level.to_string().red(),
                Level::Warn => entry.level.to_string().yellow(),
                _ => entry.level.to_string().normal(),
            };
            println!("{level:<7} {}", entry.message);
        }
    } else {
        let warnings = report.log.warnings();
        if warnings > 0 {
            println!("{}", format!("{warnings} warnings (rerun with --log to see them)").yellow());
        }
    }

    println!("{} {}", "Wrote".green().bold(), path.display());
    Ok(())
}
