//! Balance-sheet section parser.
//!
//! A section runs from its marker row (e.g. "ASSETS") to the first following
//! row whose label contains its total label (e.g. "TOTAL ASSETS"). Inside it,
//! rows are read by a cursor that is either on ordinary rows or inside a
//! group, where a header row without figures collects the sum-column values
//! of the rows under it.

use crate::error::{Result, TallyError};
use crate::log::ProcessingLog;
use crate::models::{BalanceSheetSummary, LineItems};
use crate::rules::{ACCOUNTS_PAYABLE, ACCOUNTS_PAYABLE_FALLBACK, BALANCE_RENAMES};
use crate::workbook::{CellValue, Grid, Workbook};

pub const BALANCE_SHEET_NAMES: &[&str] = &["BALANCE SHEET", "BALANCESHEET"];

/// (marker, total label) per section, in parse order.
pub const SECTIONS: [(&str, &str); 3] = [
    ("ASSETS", "TOTAL ASSETS"),
    ("LIABILITIES", "TOTAL LIABILITIES"),
    ("EQUITY", "TOTAL EQUITY"),
];

const ACCOUNTS_RECEIVABLE: &str = "ACCOUNTS RECEIVABLE";

#[derive(Debug, Clone, PartialEq)]
enum RowKind {
    /// No string label.
    Unlabeled,
    /// "ACCOUNTS RECEIVABLE - ..." sub-line, with its contribution.
    ReceivableLine(f64),
    /// The bare "ACCOUNTS RECEIVABLE" heading.
    ReceivableHeading,
    /// Category with its own figure (last non-zero number on the row).
    Item(String, f64),
    /// Category without a figure; its rows follow.
    GroupHeader(String),
}

enum State {
    Ordinary,
    Group { header: String, total: f64 },
}

fn numbers(row: &[CellValue]) -> impl Iterator<Item = f64> + '_ {
    row.iter().skip(1).filter_map(CellValue::as_number)
}

fn last_non_zero(row: &[CellValue]) -> Option<f64> {
    numbers(row).filter(|v| *v != 0.0).last()
}

fn classify(row: &[CellValue]) -> RowKind {
    let Some(label) = row.first().and_then(CellValue::as_text) else {
        return RowKind::Unlabeled;
    };
    let header = label.trim();
    let upper = header.to_uppercase();
    if upper.starts_with(ACCOUNTS_RECEIVABLE) && upper != ACCOUNTS_RECEIVABLE {
        return RowKind::ReceivableLine(last_non_zero(row).unwrap_or(0.0));
    }
    if upper == ACCOUNTS_RECEIVABLE {
        return RowKind::ReceivableHeading;
    }
    match last_non_zero(row) {
        Some(v) => RowKind::Item(header.to_string(), v),
        None => RowKind::GroupHeader(header.to_string()),
    }
}

/// A string-labelled row with no digit anywhere closes the current group.
fn closes_group(row: &[CellValue]) -> bool {
    let labelled = matches!(row.first(), Some(CellValue::Text(s)) if !s.is_empty());
    let has_digit = row.iter().any(|cell| match cell {
        CellValue::Number(n) => !n.is_nan(),
        CellValue::Text(s) => s.chars().any(|c| c.is_ascii_digit()),
        _ => false,
    });
    labelled && !has_digit
}

/// First column after the label column holding any number within `rows`; 1 if none.
fn sum_column(grid: &Grid, rows: std::ops::Range<usize>) -> usize {
    (1..grid.n_cols())
        .find(|&col| rows.clone().any(|r| grid.get(r, col).as_number().is_some()))
        .unwrap_or(1)
}

/// Parse one section into category -> amount. A missing marker or total row
/// is logged and yields an empty map.
pub fn parse_section(
    grid: &Grid,
    start_label: &str,
    total_label: &str,
    log: &mut ProcessingLog,
) -> LineItems {
    let Some(start) = grid.find_label(start_label) else {
        log.warn(format!("Could not find '{start_label}' in balance sheet"));
        return LineItems::new();
    };
    let total_upper = total_label.to_uppercase();
    let end = (start + 1..grid.n_rows()).find(|&r| {
        grid.get(r, 0)
            .to_string()
            .to_uppercase()
            .contains(&total_upper)
    });
    let Some(end) = end else {
        log.warn(format!("Could not find '{total_label}' in balance sheet"));
        return LineItems::new();
    };
    parse_rows(grid, start + 1..end)
}

fn parse_rows(grid: &Grid, rows: std::ops::Range<usize>) -> LineItems {
    let sum_col = sum_column(grid, rows.clone());
    let mut result = LineItems::new();
    let mut state = State::Ordinary;
    let mut i = rows.start;

    while i < rows.end {
        let row = grid.row(i);
        state = match state {
            State::Ordinary => {
                i += 1;
                match classify(row) {
                    RowKind::Unlabeled => State::Ordinary,
                    RowKind::ReceivableLine(v) => {
                        result.accumulate(ACCOUNTS_RECEIVABLE, v);
                        State::Ordinary
                    }
                    RowKind::ReceivableHeading => {
                        if !result.contains_key(ACCOUNTS_RECEIVABLE) {
                            result.insert(ACCOUNTS_RECEIVABLE, 0.0);
                        }
                        State::Ordinary
                    }
                    RowKind::Item(label, v) => {
                        result.insert(label, v);
                        State::Ordinary
                    }
                    RowKind::GroupHeader(header) => State::Group { header, total: 0.0 },
                }
            }
            State::Group { header, total } if closes_group(row) => {
                // cursor stays put: the closing row is read again as an ordinary row
                result.insert(header, total);
                State::Ordinary
            }
            State::Group { header, total } => {
                let value = grid.get(i, sum_col).as_number().unwrap_or(0.0);
                i += 1;
                State::Group {
                    header,
                    total: total + value,
                }
            }
        };
    }
    if let State::Group { header, total } = state {
        result.insert(header, total);
    }
    result
}

/// Fold HST-recoverable into accounts payable and rename intercompany lines.
pub fn apply_relabels(summary: &mut BalanceSheetSummary) {
    let liabilities = &mut summary.liabilities;
    let hst_keys: Vec<String> = liabilities
        .keys()
        .filter(|k| {
            let upper = k.to_uppercase();
            upper.contains("HST") && upper.contains("RECOVERABLE")
        })
        .map(str::to_string)
        .collect();
    let payable_key = liabilities
        .keys()
        .find(|k| k.to_uppercase().contains(ACCOUNTS_PAYABLE) && !hst_keys.iter().any(|h| h == k))
        .map(str::to_string);

    match payable_key {
        Some(payable) => {
            for hst in &hst_keys {
                let amount = liabilities.remove(hst).unwrap_or(0.0);
                liabilities.accumulate(payable.as_str(), amount);
            }
        }
        None => {
            if let Some(first) = hst_keys.first() {
                let amount = liabilities.remove(first).unwrap_or(0.0);
                liabilities.insert(ACCOUNTS_PAYABLE_FALLBACK, amount);
            }
        }
    }

    for (section, from, to) in BALANCE_RENAMES {
        let items = match *section {
            "ASSETS" => &mut summary.assets,
            "LIABILITIES" => &mut summary.liabilities,
            _ => &mut summary.equity,
        };
        if let Some(amount) = items.remove(from) {
            items.insert(*to, amount);
        }
    }
}

/// Parse the balance sheet of one source workbook.
///
/// Fails when the sheet or any of the ASSETS / LIABILITIES / EQUITY markers is
/// missing; a missing total row only empties that section.
pub fn parse_balance_sheet(workbook: &Workbook, log: &mut ProcessingLog) -> Result<BalanceSheetSummary> {
    let sheet = BALANCE_SHEET_NAMES
        .iter()
        .find_map(|name| workbook.sheet(name))
        .ok_or_else(|| TallyError::missing_sheet(BALANCE_SHEET_NAMES[0], &workbook.sheet_names()))?;
    let grid = sheet.to_grid();

    for (marker, _) in SECTIONS {
        if grid.find_label(marker).is_none() {
            return Err(TallyError::MissingRow(format!(
                "'{marker}' section not found in balance sheet"
            )));
        }
    }

    let [assets, liabilities, equity] =
        SECTIONS.map(|(marker, total)| parse_section(&grid, marker, total, log));
    let mut summary = BalanceSheetSummary {
        assets,
        liabilities,
        equity,
    };
    apply_relabels(&mut summary);
    Ok(summary)
}
