//! Locates the Revenue / Expenses / Income bands of a source income sheet and
//! extracts their line items.

use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;

use crate::log::ProcessingLog;
use crate::models::{AnchorSet, IncomeSections, LineItems};
use crate::normalizer::normalize;
use crate::workbook::{Sheet, Workbook};

/// Label column of source income sheets.
const LABEL_COL: u32 = 1;
const DEFAULT_YTD_COL: u32 = 8;
const DEFAULT_MONTH_COL: u32 = 2;
/// Rows scanned for column headers.
const HEADER_ROWS: Range<u32> = 1..6;

/// Sentinel line items that sit one row below a missing section header.
const REVENUE_SENTINEL: &str = "rental income";
const EXPENSES_SENTINEL: &str = "advertising";
const INCOME_SENTINEL: &str = "management fee";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Ytd,
    Month,
}

impl Pass {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ytd => "YTD",
            Self::Month => "Monthly",
        }
    }

    pub fn value_column(&self, sheet: &Sheet) -> u32 {
        match self {
            Self::Ytd => find_ytd_column(sheet),
            Self::Month => find_month_column(sheet),
        }
    }
}

fn ytd_header() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)y\.?t\.?d").expect("valid ytd pattern"))
}

fn month_header() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)month").expect("valid month pattern"))
}

fn total_revenue() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\btotal revenue\b").expect("valid pattern"))
}

fn total_expenses() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\btotal operating expenses\b").expect("valid pattern"))
}

fn income_terminator() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\btotal\b|\bnet rental income\b").expect("valid pattern"))
}

/// First sheet whose name contains "income", case-insensitively.
pub fn find_income_sheet(workbook: &Workbook) -> Option<&Sheet> {
    workbook
        .sheet_names()
        .iter()
        .find(|name| name.to_lowercase().contains("income"))
        .and_then(|name| workbook.sheet(name))
}

/// Scan once top to bottom for the three section headers, then fall back to
/// sentinel line items for any header that is missing.
pub fn find_anchors(sheet: &Sheet) -> AnchorSet {
    let mut anchors = AnchorSet::default();
    let max_row = sheet.max_row();

    for row in 1..=max_row {
        let label = sheet.label(row, LABEL_COL);
        let label = label.trim();
        if anchors.revenue.is_none() && label.eq_ignore_ascii_case("revenue") {
            anchors.revenue = Some(row);
        } else if anchors.expenses.is_none() && label.eq_ignore_ascii_case("expenses") {
            anchors.expenses = Some(row);
        } else if anchors.income.is_none() && label.eq_ignore_ascii_case("income") {
            anchors.income = Some(row);
        }
        if anchors.revenue.is_some() && anchors.expenses.is_some() && anchors.income.is_some() {
            break;
        }
    }

    let find_sentinel = |from: u32, sentinel: &str| {
        (from..=max_row).find(|&r| normalize(&sheet.label(r, LABEL_COL)) == sentinel)
    };

    if anchors.revenue.is_none() {
        anchors.revenue = find_sentinel(1, REVENUE_SENTINEL).map(|r| r.saturating_sub(1).max(1));
    }
    if let (None, Some(rev)) = (anchors.expenses, anchors.revenue) {
        anchors.expenses = find_sentinel(rev + 1, EXPENSES_SENTINEL).map(|r| (r - 1).max(rev + 1));
    }
    if let (None, Some(exp)) = (anchors.income, anchors.expenses) {
        anchors.income = find_sentinel(exp + 1, INCOME_SENTINEL).map(|r| (r - 1).max(exp + 1));
    }
    anchors
}

fn find_header_column(sheet: &Sheet, pattern: &Regex) -> Option<u32> {
    let max_col = sheet.max_column();
    HEADER_ROWS.into_iter().find_map(|row| {
        (1..=max_col).find(|&col| {
            sheet
                .get(row, col)
                .as_text()
                .is_some_and(|text| pattern.is_match(text))
        })
    })
}

pub fn find_ytd_column(sheet: &Sheet) -> u32 {
    find_header_column(sheet, ytd_header()).unwrap_or(DEFAULT_YTD_COL)
}

pub fn find_month_column(sheet: &Sheet) -> u32 {
    find_header_column(sheet, month_header()).unwrap_or(DEFAULT_MONTH_COL)
}

/// Extract the three bands' line items from `value_col`.
///
/// Rows with a blank label are skipped in the revenue and expense bands; the
/// income band has no closing header and ends at the first blank, "total" or
/// "net rental income" row. Any missing anchor yields empty sections.
pub fn parse_sections(
    sheet: &Sheet,
    anchors: &AnchorSet,
    value_col: u32,
    log: &mut ProcessingLog,
) -> IncomeSections {
    let Some((rev, exp, inc)) = anchors.complete() else {
        log.debug(format!(
            "Missing anchor rows: rev={:?}, exp={:?}, inc={:?}",
            anchors.revenue, anchors.expenses, anchors.income
        ));
        return IncomeSections::default();
    };
    log.debug(format!(
        "Parsing column {value_col}: revenue rows {}..{}, expense rows {}..{}, income from row {}",
        rev + 1,
        exp - 1,
        exp + 1,
        inc - 1,
        inc + 1
    ));

    let mut sections = IncomeSections::default();
    accumulate_band(sheet, rev + 1..exp, value_col, total_revenue(), &mut sections.revenue, log);
    accumulate_band(sheet, exp + 1..inc, value_col, total_expenses(), &mut sections.expenses, log);

    for row in inc + 1..=sheet.max_row() {
        let label = sheet.label(row, LABEL_COL);
        if label.is_empty() || income_terminator().is_match(&label) {
            log.debug(format!("Income band stops at row {row}: '{label}'"));
            break;
        }
        sections
            .income
            .accumulate(normalize(&label), cell_amount(sheet, row, value_col));
    }

    log.debug(format!(
        "Parsed {} revenue, {} expense, {} income items",
        sections.revenue.len(),
        sections.expenses.len(),
        sections.income.len()
    ));
    sections
}

fn accumulate_band(
    sheet: &Sheet,
    rows: Range<u32>,
    value_col: u32,
    total: &Regex,
    items: &mut LineItems,
    log: &mut ProcessingLog,
) {
    for row in rows {
        let label = sheet.label(row, LABEL_COL);
        if label.is_empty() {
            continue;
        }
        if total.is_match(&label) {
            log.debug(format!("Skipping total row {row}: '{label}'"));
            continue;
        }
        items.accumulate(normalize(&label), cell_amount(sheet, row, value_col));
    }
}

fn cell_amount(sheet: &Sheet, row: u32, col: u32) -> f64 {
    sheet.get(row, col).coerce_number().unwrap_or(0.0)
}

/// Anchors, column choice and sections for one pass over a source sheet.
pub fn parse_pass(sheet: &Sheet, pass: Pass, log: &mut ProcessingLog) -> IncomeSections {
    let anchors = find_anchors(sheet);
    let col = pass.value_column(sheet);
    log.debug(format!("{} pass on '{}' uses column {col}", pass.name(), sheet.name()));
    parse_sections(sheet, &anchors, col, log)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workbook::CellValue;

    fn row(label: &str, month: f64, ytd: f64) -> Vec<CellValue> {
        let mut cells = vec![CellValue::Empty; 8];
        cells[0] = label.into();
        cells[1] = month.into();
        cells[7] = ytd.into();
        cells
    }

    fn header(label: &str) -> Vec<CellValue> {
        vec![label.into()]
    }

    fn income_sheet() -> Sheet {
        Sheet::from_rows(
            "INCOME",
            vec![
                vec!["".into(), "Month".into(), "".into(), "".into(), "".into(), "".into(), "".into(), "Y.T.D.".into()],
                header("Revenue"),
                row("Industrial Rent", 100.0, 1000.0),
                row("Rental Revenue", 50.0, 500.0),
                row("Total Revenue", 150.0, 1500.0),
                header("Expenses"),
                row("Advertising", 10.0, 60.0),
                row("Realty Tax", 20.0, 120.0),
                row("Total Operating Expenses", 30.0, 180.0),
                header("Income"),
                row("Management Fee", 5.0, 30.0),
                row("Other Income", 1.0, 6.0),
                row("Net Rental Income", 99.0, 999.0),
                row("Interest", 7.0, 7.0),
            ],
        )
    }

    #[test]
    fn test_find_anchors_by_header() {
        let anchors = find_anchors(&income_sheet());
        assert_eq!(anchors.complete(), Some((2, 6, 10)));
    }

    #[test]
    fn test_find_anchors_fallback_to_sentinels() {
        let sheet = Sheet::from_rows(
            "Income",
            vec![
                header("Statement of Operations"),
                header("Receipts"),
                row("Rental Income", 1.0, 1.0),
                header("Costs"),
                row("Advertising", 1.0, 1.0),
                header("Other"),
                row("Management Fee", 1.0, 1.0),
            ],
        );
        let anchors = find_anchors(&sheet);
        assert_eq!(anchors.complete(), Some((2, 4, 6)));
    }

    #[test]
    fn test_sentinel_right_below_previous_anchor_is_clamped() {
        let sheet = Sheet::from_rows(
            "Income",
            vec![
                header("Revenue"),
                row("Advertising", 1.0, 1.0),
                row("Management Fee", 1.0, 1.0),
            ],
        );
        let anchors = find_anchors(&sheet);
        // each sentinel's row-above would collide with the anchor before it
        assert_eq!(anchors.complete(), Some((1, 2, 3)));
    }

    #[test]
    fn test_anchor_order_when_complete() {
        let sheets = [income_sheet(), Sheet::from_rows("x", vec![header("Income"), header("Revenue"), header("Expenses")])];
        for sheet in &sheets {
            if let Some((rev, exp, inc)) = find_anchors(sheet).complete() {
                assert!(rev < exp && exp < inc);
            }
        }
    }

    #[test]
    fn test_column_detection() {
        let sheet = income_sheet();
        assert_eq!(find_ytd_column(&sheet), 8);
        assert_eq!(find_month_column(&sheet), 2);
        let bare = Sheet::from_rows("x", vec![header("Revenue")]);
        assert_eq!(find_ytd_column(&bare), DEFAULT_YTD_COL);
        assert_eq!(find_month_column(&bare), DEFAULT_MONTH_COL);
    }

    #[test]
    fn test_parse_sections_accumulates_and_skips_totals() {
        let sheet = income_sheet();
        let mut log = ProcessingLog::new();
        let sections = parse_pass(&sheet, Pass::Ytd, &mut log);
        // "Industrial Rent" and "Rental Revenue" both fold to "rental income"
        assert_eq!(sections.revenue.len(), 1);
        assert_eq!(sections.revenue.get("rental income"), Some(&1500.0));
        assert_eq!(sections.expenses.get("realty taxes"), Some(&120.0));
        assert!(!sections.expenses.keys().any(|k| k.contains("total")));
        // stops at "Net Rental Income", never reaches "Interest"
        assert_eq!(sections.income.len(), 2);
        assert_eq!(sections.income.get("management fee"), Some(&30.0));
        assert!(sections.income.get("interest").is_none());
    }

    #[test]
    fn test_month_pass_reads_month_column() {
        let sections = parse_pass(&income_sheet(), Pass::Month, &mut ProcessingLog::new());
        assert_eq!(sections.revenue.get("rental income"), Some(&150.0));
        assert_eq!(sections.income.get("other income"), Some(&1.0));
    }

    #[test]
    fn test_non_numeric_values_count_as_zero() {
        let mut sheet = income_sheet();
        sheet.set(7, 8, "n/a");
        let sections = parse_pass(&sheet, Pass::Ytd, &mut ProcessingLog::new());
        assert_eq!(sections.expenses.get("advertising"), Some(&0.0));
    }

    #[test]
    fn test_missing_anchor_gives_empty_sections() {
        let sheet = Sheet::from_rows("Income", vec![header("Revenue"), row("Rent", 1.0, 1.0)]);
        let sections = parse_pass(&sheet, Pass::Ytd, &mut ProcessingLog::new());
        assert!(sections.is_empty());
    }

    #[test]
    fn test_find_income_sheet() {
        let mut wb = Workbook::new();
        wb.add_sheet(Sheet::new("BALANCE SHEET"));
        wb.add_sheet(Sheet::new("Statement of INCOME"));
        assert_eq!(find_income_sheet(&wb).map(|s| s.name()), Some("Statement of INCOME"));
    }
}
