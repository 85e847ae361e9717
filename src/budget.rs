//! Budget and prior-year comparatives for the `Income_statement` and
//! `Balance sheet` template sheets.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::error::{Result, TallyError};
use crate::fuzzy::{best_match, Scorer};
use crate::log::ProcessingLog;
use crate::merge::TemplateLayout;
use crate::models::{BudgetFigures, LineItems, Month, PriorYearFigures};
use crate::rules::{
    COMBINED_LINES, COMPARATIVE_LABEL_ALIASES, COMPARATIVE_SKIP_ROWS, INJECTED_MONTHLY_RATES,
    INJECTED_ROW_LABELS, INTERCOMPANY_LABEL,
};
use crate::workbook::{CellValue, Grid, Rgb, Sheet, Workbook};

/// Minimum weighted-ratio score for comparative labels and markers.
pub const COMPARATIVE_THRESHOLD: u8 = 95;

const FIRST_MONTH_COL: usize = 2;
const MONTH_COUNT: usize = 12;
const START_LABEL: &str = "Rental Revenue";
const END_LABELS: [&str; 2] = ["NET PROFIT/(LOSS)", "NET RENTAL INCOME (LOSS)"];
const PRIOR_START_LABEL: &str = "RENTAL INCOME";
/// Month and YTD columns of last year's statement.
const PRIOR_MONTH_COL: usize = 1;
const PRIOR_YTD_COL: usize = 7;

pub const PRIOR_BALANCE_SHEETS: [&str; 3] = ["Balance sheet", "BALANCE SHEET", "BalanceSheet"];
const PRIOR_BALANCE_VALUE_COL: usize = 2;
/// Columns filled across the intercompany row.
const INTERCOMPANY_SPAN: u32 = 15;

fn non_numeric() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^0-9.\-]").expect("valid strip pattern"))
}

fn number_or_zero(cell: &CellValue) -> f64 {
    cell.coerce_number().unwrap_or(0.0)
}

fn is_year(cell: &CellValue, year: i32) -> bool {
    match cell {
        CellValue::Number(n) => *n == f64::from(year),
        CellValue::Text(s) => s.trim() == year.to_string(),
        _ => false,
    }
}

/// Sum each pair of [`COMBINED_LINES`] under the first label.
fn combine_pairs<V>(items: &mut LineItems<V>)
where
    V: std::ops::Add<Output = V> + Copy,
{
    for (base, extra) in COMBINED_LINES {
        if items.contains_key(base) && items.contains_key(extra) {
            if let (Some(a), Some(b)) = (items.remove(base), items.remove(extra)) {
                items.insert(*base, a + b);
            }
        }
    }
}

/// Budget month / YTD / annual figures per label from the `Consolidated <year>` grid.
///
/// The header row has the year in column 0 and "Jan" in column 2, with the
/// twelve month labels in columns 2..=13 and the annual total right after
/// them. Amortization and depreciation come from fixed monthly rates.
pub fn parse_budget(grid: &Grid, year: i32, month: Month) -> Result<LineItems<BudgetFigures>> {
    let header = (0..grid.n_rows())
        .find(|&r| is_year(grid.get(r, 0), year) && grid.get(r, 2).as_text() == Some("Jan"))
        .ok_or_else(|| TallyError::MissingRow(format!("budget header row for {year} with 'Jan'")))?;

    let month_cols = FIRST_MONTH_COL..FIRST_MONTH_COL + MONTH_COUNT;
    let sel_col = month_cols
        .clone()
        .find(|&c| grid.get(header, c).as_text().map(str::trim) == Some(month.abbrev()))
        .ok_or_else(|| TallyError::MissingRow(format!("budget month column '{month}'")))?;
    let total_col = month_cols.end;

    let start = grid
        .find_label(START_LABEL)
        .ok_or_else(|| TallyError::MissingRow(format!("'{START_LABEL}' in budget")))?;
    let end = END_LABELS
        .iter()
        .find_map(|label| grid.find_label_from(start, label))
        .ok_or_else(|| TallyError::MissingRow(format!("'{}' in budget", END_LABELS.join("' or '"))))?;

    let mut results = LineItems::new();
    for r in start..=end {
        let Some(label) = grid.get(r, 0).as_text() else {
            continue;
        };
        let ytd: f64 = (FIRST_MONTH_COL..=sel_col)
            .filter_map(|c| grid.get(r, c).coerce_number())
            .sum();
        results.insert(
            label.trim(),
            BudgetFigures {
                month: number_or_zero(grid.get(r, sel_col)),
                ytd,
                annual: number_or_zero(grid.get(r, total_col)),
            },
        );
    }
    combine_pairs(&mut results);

    let elapsed = (sel_col - FIRST_MONTH_COL + 1) as f64;
    for (label, rate) in INJECTED_MONTHLY_RATES {
        results.insert(
            *label,
            BudgetFigures {
                month: *rate,
                ytd: rate * elapsed,
                annual: rate * 12.0,
            },
        );
    }
    Ok(results)
}

/// Row of the best weighted-ratio match for `label` in column 0.
fn find_marker(grid: &Grid, labels: &[String], label: &str) -> Result<usize> {
    let (hit, score) = best_match(label, labels.iter().map(String::as_str), Scorer::Weighted)
        .unwrap_or(("", 0));
    if score < COMPARATIVE_THRESHOLD {
        return Err(TallyError::LowConfidence {
            label: label.to_string(),
            score,
        });
    }
    (0..grid.n_rows())
        .find(|&r| grid.get(r, 0).to_string() == hit)
        .ok_or_else(|| TallyError::MissingRow(format!("'{hit}' in last year's statement")))
}

/// Month / YTD figures per label from last year's `Income_statement` grid.
///
/// The start and end rows are located by fuzzy match and must score at least
/// [`COMPARATIVE_THRESHOLD`].
pub fn parse_prior_year(grid: &Grid) -> Result<LineItems<PriorYearFigures>> {
    let labels: Vec<String> = (0..grid.n_rows())
        .map(|r| grid.get(r, 0))
        .filter(|cell| !cell.is_empty())
        .map(CellValue::to_string)
        .collect();

    let start = find_marker(grid, &labels, PRIOR_START_LABEL)?;
    let end = match find_marker(grid, &labels, END_LABELS[0]) {
        Ok(row) => row,
        Err(TallyError::LowConfidence { .. }) => find_marker(grid, &labels, END_LABELS[1])?,
        Err(e) => return Err(e),
    };

    let mut results = LineItems::new();
    for r in start..=end {
        let Some(label) = grid.get(r, 0).as_text() else {
            continue;
        };
        results.insert(
            label.trim(),
            PriorYearFigures {
                month: number_or_zero(grid.get(r, PRIOR_MONTH_COL)),
                ytd: number_or_zero(grid.get(r, PRIOR_YTD_COL)),
            },
        );
    }
    combine_pairs(&mut results);
    Ok(results)
}

/// Upper-cased column-A text -> row. Repeated labels keep their last row.
fn template_rows(sheet: &Sheet) -> LineItems<u32> {
    let mut rows = LineItems::new();
    for row in 1..=sheet.max_row() {
        if let Some(text) = sheet.get(row, 1).as_text() {
            rows.insert(text.trim().to_uppercase(), row);
        }
    }
    rows
}

/// Template row label for a budget or prior-year label: alias table, then the
/// label itself, then a weighted-ratio match. `None` means the line is dropped.
fn resolve_label(label: &str, rows: &LineItems<u32>) -> Option<String> {
    let key = label.trim().to_uppercase();
    let alias = COMPARATIVE_LABEL_ALIASES
        .iter()
        .find(|(from, _)| from.trim().to_uppercase() == key);
    let target = match alias {
        Some((_, target)) => target.map(|t| t.trim().to_uppercase())?,
        None if rows.contains_key(&key) => key,
        None => {
            let (hit, score) = best_match(&key, rows.keys(), Scorer::Weighted)?;
            if score < COMPARATIVE_THRESHOLD {
                return None;
            }
            hit.to_string()
        }
    };
    (!COMPARATIVE_SKIP_ROWS.contains(&target.as_str())).then_some(target)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ComparativeStats {
    pub budget_rows: usize,
    pub prior_rows: usize,
    pub dropped: usize,
}

/// Write budget and prior-year figures into the template `Income_statement`.
pub fn write_comparatives(
    sheet: &mut Sheet,
    budget: &LineItems<BudgetFigures>,
    prior: &LineItems<PriorYearFigures>,
    layout: &TemplateLayout,
    log: &mut ProcessingLog,
) -> ComparativeStats {
    let rows = template_rows(sheet);
    let mut stats = ComparativeStats::default();
    let mut target_row = |label: &str, stats: &mut ComparativeStats| {
        let row = resolve_label(label, &rows).and_then(|t| rows.get(&t).copied());
        if row.is_none() {
            log.debug(format!("Comparative line '{label}' has no template row"));
            stats.dropped += 1;
        }
        row
    };

    for (label, figures) in budget.iter() {
        if let Some(row) = target_row(label, &mut stats) {
            sheet.set(row, layout.budget_month_col, figures.month);
            sheet.set(row, layout.budget_ytd_col, figures.ytd);
            sheet.set(row, layout.annual_col, figures.annual);
            stats.budget_rows += 1;
        }
    }
    for (label, figures) in prior.iter() {
        if let Some(row) = target_row(label, &mut stats) {
            sheet.set(row, layout.prior_month_col, figures.month);
            sheet.set(row, layout.prior_ytd_col, figures.ytd);
            stats.prior_rows += 1;
        }
    }
    stats
}

/// Flag the injected amortization/depreciation labels.
pub fn highlight_injected_rows(sheet: &mut Sheet) {
    let rows = template_rows(sheet);
    for label in INJECTED_ROW_LABELS {
        if let Some(&row) = rows.get(label) {
            sheet.set_fill(row, 1, Rgb::YELLOW);
        }
    }
}

/// Flag the first intercompany row of the template `Balance_sheet`.
pub fn highlight_intercompany(sheet: &mut Sheet) -> Option<u32> {
    let row = (1..=sheet.max_row())
        .find(|&r| sheet.label(r, 1).trim().eq_ignore_ascii_case(INTERCOMPANY_LABEL))?;
    for col in 1..=INTERCOMPANY_SPAN {
        sheet.set_fill(row, col, Rgb::YELLOW);
    }
    Some(row)
}

/// Label -> closing balance from last year's balance sheet.
///
/// Column C is read after dropping everything but digits, `.` and `-`; pairs
/// are taken from the first row holding a number there.
pub fn parse_prior_balance(workbook: &Workbook) -> Result<LineItems> {
    let sheet = PRIOR_BALANCE_SHEETS
        .iter()
        .find_map(|name| workbook.sheet(name))
        .ok_or_else(|| TallyError::missing_sheet(PRIOR_BALANCE_SHEETS[0], &workbook.sheet_names()))?;
    let grid = sheet.to_grid();

    let values: Vec<Option<f64>> = (0..grid.n_rows())
        .map(|r| {
            let raw = grid.get(r, PRIOR_BALANCE_VALUE_COL).to_string();
            non_numeric().replace_all(&raw, "").parse::<f64>().ok()
        })
        .collect();
    let first = values
        .iter()
        .position(Option::is_some)
        .ok_or_else(|| TallyError::Other("No numeric data in column C of last year's balance sheet".into()))?;

    let mut balances = LineItems::new();
    for (r, value) in values.iter().enumerate().skip(first) {
        let label = grid.get(r, 0).to_string();
        let label = label.trim();
        match value {
            Some(v) if !label.is_empty() => balances.insert(label, *v),
            _ => {}
        }
    }
    Ok(balances)
}

/// Write `balances` into `col` of every row whose trimmed column-A text matches a label exactly.
pub fn write_prior_balance(sheet: &mut Sheet, balances: &LineItems, col: u32) -> usize {
    let mut written = 0;
    for row in 1..=sheet.max_row() {
        let Some(label) = sheet.get(row, 1).as_text().map(str::trim) else {
            continue;
        };
        if let Some(&value) = balances.get(label) {
            sheet.set(row, col, value);
            written += 1;
        }
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;

    fn budget_row(label: &str, monthly: f64, total: f64) -> Vec<CellValue> {
        let mut cells = vec![label.into(), CellValue::Empty];
        cells.extend((0..12).map(|_| CellValue::Number(monthly)));
        cells.push(total.into());
        cells
    }

    fn budget_grid() -> Grid {
        let mut header = vec![CellValue::Number(2025.0), CellValue::Empty];
        header.extend(Month::ALL.iter().map(|m| CellValue::from(m.abbrev())));
        header.push("Total".into());
        let mut rent = vec!["Rental Revenue".into(), CellValue::Empty];
        rent.extend((1..=12).map(|m| CellValue::Number(m as f64 * 100.0)));
        rent.push(7800.0.into());
        Grid::new(vec![
            vec!["Consolidated budget".into()],
            header,
            rent,
            budget_row("Mortgage /Loan Interest", 10.0, 120.0),
            budget_row("Loan Interest (CSIT to Family Mortgage)", 5.0, 60.0),
            budget_row("Advertising", 1.0, 12.0),
            budget_row("NET PROFIT/(LOSS)", 50.0, 600.0),
            budget_row("Below the line", 9.0, 9.0),
        ])
    }

    #[test]
    fn test_parse_budget_ytd_spans_elapsed_months() {
        let budget = parse_budget(&budget_grid(), 2025, Month::Jun).unwrap();
        let rent = budget.get("Rental Revenue").unwrap();
        assert_eq!(rent.month, 600.0);
        // Jan..Jun inclusive
        assert_eq!(rent.ytd, 2100.0);
        assert_eq!(rent.annual, 7800.0);
        assert!(budget.get("Below the line").is_none());
        assert!(budget.contains_key("NET PROFIT/(LOSS)"));
    }

    #[test]
    fn test_parse_budget_combines_pairs_and_injects_rates() {
        let budget = parse_budget(&budget_grid(), 2025, Month::Mar).unwrap();
        let mortgage = budget.get("Mortgage /Loan Interest").unwrap();
        assert_eq!(*mortgage, BudgetFigures { month: 15.0, ytd: 45.0, annual: 180.0 });
        assert!(!budget.contains_key("Loan Interest (CSIT to Family Mortgage)"));
        let amort = budget.get("Amortization").unwrap();
        assert_eq!(*amort, BudgetFigures { month: 26500.0, ytd: 79500.0, annual: 318000.0 });
        assert_eq!(budget.get("Depreciation").unwrap().ytd, 121963.0 * 3.0);
    }

    #[test]
    fn test_parse_budget_missing_header() {
        let err = parse_budget(&budget_grid(), 2024, Month::Jan).unwrap_err();
        assert!(err.to_string().contains("2024"));
    }

    fn prior_row(label: &str, month: f64, ytd: f64) -> Vec<CellValue> {
        let mut cells = vec![CellValue::Empty; 8];
        cells[0] = label.into();
        cells[1] = month.into();
        cells[7] = ytd.into();
        cells
    }

    #[test]
    fn test_parse_prior_year() {
        let grid = Grid::new(vec![
            vec!["Statement of income".into()],
            prior_row("RENTAL INCOME", 10.0, 70.0),
            prior_row("CP Rail Lease (Laird)", 2.0, 14.0),
            prior_row("Rent PUD/CSITPM Head Office", 1.0, 7.0),
            prior_row("NET RENTAL INCOME (LOSS)", 3.0, 21.0),
            prior_row("Memo", 1.0, 1.0),
        ]);
        let prior = parse_prior_year(&grid).unwrap();
        assert_eq!(prior.get("RENTAL INCOME"), Some(&PriorYearFigures { month: 10.0, ytd: 70.0 }));
        assert_eq!(prior.get("CP Rail Lease (Laird)"), Some(&PriorYearFigures { month: 3.0, ytd: 21.0 }));
        assert!(!prior.contains_key("Memo"));
    }

    #[test]
    fn test_parse_prior_year_rejects_weak_start_marker() {
        let grid = Grid::new(vec![prior_row("Widgets", 1.0, 1.0), prior_row("Sprockets", 1.0, 1.0)]);
        match parse_prior_year(&grid) {
            Err(TallyError::LowConfidence { label, score }) => {
                assert_eq!(label, "RENTAL INCOME");
                assert!(score < COMPARATIVE_THRESHOLD);
            }
            other => panic!("expected low confidence, got {other:?}"),
        }
    }

    fn income_statement() -> Sheet {
        let mut sheet = Sheet::new("Income_statement");
        for (row, label) in [
            (10, "RENTAL INCOME"),
            (11, "ADVERTISING"),
            (12, "TOTAL REVENUE"),
            (13, "AMORTIZATION"),
            (20, "ADVERTISING"),
        ] {
            sheet.set(row, 1, label);
        }
        sheet
    }

    #[test]
    fn test_write_comparatives() {
        let mut sheet = income_statement();
        let mut budget = LineItems::new();
        let figures = |m: f64| BudgetFigures { month: m, ytd: m * 6.0, annual: m * 12.0 };
        budget.insert("Rental Revenue", figures(100.0));
        budget.insert("Advertisng", figures(5.0));
        budget.insert("TOTAL REVENUE", figures(999.0));
        budget.insert("Truck and Labour (Mobile)", figures(1.0));
        budget.insert("Amortization", figures(26500.0));
        let mut prior = LineItems::new();
        prior.insert("RENTAL INCOME", PriorYearFigures { month: 90.0, ytd: 540.0 });

        let layout = TemplateLayout::default();
        let stats = write_comparatives(&mut sheet, &budget, &prior, &layout, &mut ProcessingLog::new());

        assert_eq!(sheet.get(10, 3).as_number(), Some(100.0));
        assert_eq!(sheet.get(10, 9).as_number(), Some(600.0));
        assert_eq!(sheet.get(10, 15).as_number(), Some(1200.0));
        assert_eq!(sheet.get(10, 5).as_number(), Some(90.0));
        assert_eq!(sheet.get(10, 11).as_number(), Some(540.0));
        // repeated label resolves to its last row
        assert_eq!(sheet.get(20, 3).as_number(), Some(5.0));
        assert!(sheet.get(11, 3).is_empty());
        assert!(sheet.get(12, 3).is_empty());
        assert_eq!(sheet.get(13, 3).as_number(), Some(26500.0));
        assert_eq!(stats, ComparativeStats { budget_rows: 3, prior_rows: 1, dropped: 2 });
    }

    #[test]
    fn test_highlights() {
        let mut sheet = income_statement();
        highlight_injected_rows(&mut sheet);
        assert_eq!(sheet.fill(13, 1), Some(Rgb::YELLOW));
        assert_eq!(sheet.fill(10, 1), None);

        let mut bs = Sheet::new("Balance_sheet");
        bs.set(8, 1, " Intercompany ");
        bs.set(9, 1, "INTERCOMPANY");
        assert_eq!(highlight_intercompany(&mut bs), Some(8));
        assert_eq!(bs.fill(8, 15), Some(Rgb::YELLOW));
        assert_eq!(bs.fill(8, 16), None);
        assert_eq!(bs.fill(9, 1), None);
    }

    #[test]
    fn test_prior_balance_round_trip() {
        let mut wb = Workbook::new();
        wb.add_sheet(Sheet::from_rows(
            "BALANCE SHEET",
            vec![
                vec!["Company".into(), "".into(), "As at".into()],
                vec!["CASH ".into(), "".into(), "$1,200.50".into()],
                vec!["RECEIVABLES".into(), "".into(), 300.0.into()],
                vec!["".into(), "".into(), 5.0.into()],
            ],
        ));
        let balances = parse_prior_balance(&wb).unwrap();
        assert_eq!(balances.len(), 2);
        assert_eq!(balances.get("CASH"), Some(&1200.5));

        let mut template = Sheet::new("Balance sheet");
        template.set(7, 1, "CASH");
        template.set(8, 1, "RECEIVABLES ");
        template.set(9, 1, "OTHER");
        assert_eq!(write_prior_balance(&mut template, &balances, 5), 2);
        assert_eq!(template.get(8, 5).as_number(), Some(300.0));
        assert!(template.get(9, 5).is_empty());
    }

    #[test]
    fn test_prior_balance_without_numbers_fails() {
        let mut wb = Workbook::new();
        wb.add_sheet(Sheet::from_rows("Balance sheet", vec![vec!["CASH".into(), "".into(), "n/a".into()]]));
        assert!(parse_prior_balance(&wb).is_err());
        assert!(matches!(parse_prior_balance(&Workbook::new()), Err(TallyError::MissingSheet { .. })));
    }
}
