use std::path::Path;

use chrono::Datelike;
use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::balance::parse_balance_sheet;
use crate::error::{Result, TallyError};
use crate::fmt::line;
use crate::income::{find_anchors, find_income_sheet, parse_sections, Pass};
use crate::log::{Level, ProcessingLog};
use crate::models::{BalanceSheetSummary, IncomeSections};
use crate::settings::load_settings;
use crate::site::SiteResolver;
use crate::workbook::Workbook;

fn row_or_missing(row: Option<u32>) -> String {
    row.map_or_else(|| "not found".to_string(), |r| format!("row {r}"))
}

fn print_sections(title: &str, sections: &IncomeSections) {
    let mut table = Table::new();
    table.set_header(vec!["Line item", "Amount"]);
    for (heading, items) in [
        ("REVENUE", &sections.revenue),
        ("EXPENSES", &sections.expenses),
        ("INCOME", &sections.income),
    ] {
        table.add_row(vec![Cell::new(heading.bold()), Cell::new("")]);
        for (label, amount) in items.iter() {
            table.add_row(line(&format!("  {label}"), *amount));
        }
    }
    println!("{title}\n{table}");
}

fn print_balance(summary: &BalanceSheetSummary) {
    let mut table = Table::new();
    table.set_header(vec!["Category", "Amount"]);
    for (heading, items) in summary.sections() {
        table.add_row(vec![Cell::new(heading.bold()), Cell::new("")]);
        for (label, amount) in items.iter() {
            table.add_row(line(&format!("  {label}"), *amount));
        }
    }
    println!("Balance sheet\n{table}");
}

pub fn run(file: &Path, year: Option<i32>) -> Result<()> {
    let bytes = std::fs::read(file)
        .map_err(|e| TallyError::Other(format!("Cannot read {}: {e}", file.display())))?;
    let workbook = Workbook::from_bytes(&bytes)?;
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let settings = load_settings();
    let year = year.unwrap_or(chrono::Local::now().year());
    let resolver = SiteResolver::new(year, &settings.site_aliases);
    let record = resolver.resolve(&name);
    println!("File:     {name}");
    println!("Site:     {}", record.site);
    println!("Sheets:   {}", workbook.sheet_names().join(", "));

    let mut log = ProcessingLog::new();
    match find_income_sheet(&workbook) {
        None => println!("{}", "No income sheet found".yellow()),
        Some(sheet) => {
            let anchors = find_anchors(sheet);
            println!("Income:   '{}'", sheet.name());
            println!(
                "Anchors:  revenue {}, expenses {}, income {}",
                row_or_missing(anchors.revenue),
                row_or_missing(anchors.expenses),
                row_or_missing(anchors.income)
            );
            for pass in [Pass::Ytd, Pass::Month] {
                let col = pass.value_column(sheet);
                let sections = parse_sections(sheet, &anchors, col, &mut log);
                print_sections(&format!("{} (column {col})", pass.name()), &sections);
            }
        }
    }

    match parse_balance_sheet(&workbook, &mut log) {
        Ok(summary) => print_balance(&summary),
        Err(e) => println!("{} {e}", "Balance sheet:".yellow()),
    }

    for entry in log.at_least(Level::Warn) {
        println!("{} {}", "warning:".yellow(), entry.message);
    }
    Ok(())
}
