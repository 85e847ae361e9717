//! Writes extracted line items into the consolidation template.

use std::ops::AddAssign;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::fuzzy::{best_match, Scorer};
use crate::income::{find_income_sheet, parse_pass, Pass};
use crate::log::ProcessingLog;
use crate::models::{BalanceSheetSummary, IncomeSections, LineItems};
use crate::normalizer::normalize;
use crate::site::{find_site_column, ownership_share, SiteResolver};
use crate::workbook::{Rgb, Sheet, Workbook};

/// Inclusive template row range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowBand {
    pub first: u32,
    pub last: u32,
}

impl RowBand {
    pub const fn new(first: u32, last: u32) -> Self {
        Self { first, last }
    }

    pub fn shifted(self, by: u32) -> Self {
        Self::new(self.first + by, self.last + by)
    }
}

/// Fixed coordinates of the consolidation template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateLayout {
    /// Site header row, shared by the `Income` and `Balance_sheet` sheets.
    pub header_row: u32,
    /// Revenue, expense and income bands of the YTD block.
    pub ytd_bands: [RowBand; 3],
    /// Same for the month block. The revenue band moves down one row when its
    /// first row is blank or a "Revenue" heading.
    pub month_bands: [RowBand; 3],
    pub budget_month_col: u32,
    pub budget_ytd_col: u32,
    pub annual_col: u32,
    pub prior_month_col: u32,
    pub prior_ytd_col: u32,
    /// `Balance sheet` column receiving last year's balances.
    pub prior_balance_col: u32,
}

impl Default for TemplateLayout {
    fn default() -> Self {
        Self {
            header_row: 5,
            ytd_bands: [RowBand::new(6, 16), RowBand::new(19, 33), RowBand::new(38, 46)],
            month_bands: [RowBand::new(53, 65), RowBand::new(67, 81), RowBand::new(86, 94)],
            budget_month_col: 3,
            budget_ytd_col: 9,
            annual_col: 15,
            prior_month_col: 5,
            prior_ytd_col: 11,
            prior_balance_col: 5,
        }
    }
}

impl TemplateLayout {
    /// Revenue, expense and income bands for `pass` on this template sheet.
    pub fn bands(&self, pass: Pass, template: &Sheet) -> [RowBand; 3] {
        match pass {
            Pass::Ytd => self.ytd_bands,
            Pass::Month => {
                let [revenue, expenses, income] = self.month_bands;
                let first = template.label(revenue.first, LABEL_COL);
                let first = first.trim();
                if first.is_empty() || first.to_lowercase().contains("revenue") {
                    [revenue.shifted(1), expenses, income]
                } else {
                    [revenue, expenses, income]
                }
            }
        }
    }
}

const LABEL_COL: u32 = 1;

fn total_word() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\btotal\b").expect("valid total pattern"))
}

/// Fill for a fuzzy match: orange at `threshold`, shading to yellow at 100.
pub fn gradient_fill(score: u8, threshold: u8) -> Rgb {
    if threshold >= 100 {
        return Rgb(0xFF, 0xFF, 0x00);
    }
    let span = u32::from(100 - threshold);
    let above = u32::from(score.saturating_sub(threshold)).min(span);
    Rgb(0xFF, (255 * above / span) as u8, 0x00)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MatchStats {
    pub exact: usize,
    pub fuzzy: usize,
    pub zeroed: usize,
}

impl AddAssign for MatchStats {
    fn add_assign(&mut self, rhs: Self) {
        self.exact += rhs.exact;
        self.fuzzy += rhs.fuzzy;
        self.zeroed += rhs.zeroed;
    }
}

/// Fill `col` of every labelled, non-total row in `band` from `items`.
///
/// Exact normalized keys are written as-is. Otherwise the best token-sort
/// match at or above `threshold` is written with a [`gradient_fill`]; anything
/// weaker writes 0.
pub fn match_and_write(
    sheet: &mut Sheet,
    band: RowBand,
    items: &LineItems,
    col: u32,
    threshold: u8,
) -> MatchStats {
    let mut stats = MatchStats::default();
    for row in band.first..=band.last {
        let raw = sheet.label(row, LABEL_COL);
        let raw = raw.trim();
        let key = normalize(raw);
        if key.is_empty() || total_word().is_match(raw) {
            continue;
        }
        if let Some(&value) = items.get(&key) {
            sheet.set(row, col, value);
            stats.exact += 1;
            continue;
        }
        match best_match(&key, items.keys(), Scorer::TokenSort) {
            Some((hit, score)) if score >= threshold => {
                let value = items.get(hit).copied().unwrap_or(0.0);
                sheet.set(row, col, value);
                sheet.set_fill(row, col, gradient_fill(score, threshold));
                stats.fuzzy += 1;
            }
            _ => {
                sheet.set(row, col, 0.0);
                stats.zeroed += 1;
            }
        }
    }
    stats
}

fn write_sections(
    sheet: &mut Sheet,
    bands: [RowBand; 3],
    sections: &IncomeSections,
    col: u32,
    threshold: u8,
) -> MatchStats {
    let mut stats = MatchStats::default();
    let [revenue, expenses, income] = bands;
    stats += match_and_write(sheet, revenue, &sections.revenue, col, threshold);
    stats += match_and_write(sheet, expenses, &sections.expenses, col, threshold);
    stats += match_and_write(sheet, income, &sections.income, col, threshold);
    stats
}

/// Outcome of merging one source file's income statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteMerge {
    pub filename: String,
    pub site: String,
    pub column: u32,
    pub stats: MatchStats,
}

/// YTD and month passes of one source file into the template `Income` sheet.
///
/// Returns `None` (after logging a warning) when the file has no income
/// sheet, no usable anchors, or no matching site column.
pub fn merge_income_file(
    template: &mut Sheet,
    source: &Workbook,
    filename: &str,
    resolver: &SiteResolver,
    layout: &TemplateLayout,
    threshold: u8,
    log: &mut ProcessingLog,
) -> Option<SiteMerge> {
    let Some(income) = find_income_sheet(source) else {
        log.warn(format!("No 'INCOME' sheet in {filename}. Skipping."));
        return None;
    };
    let ytd = parse_pass(income, Pass::Ytd, log);
    if ytd.is_empty() {
        log.warn(format!("Anchors not found in {filename}. Skipping."));
        return None;
    }

    let record = resolver.resolve(filename);
    let Some(col) = find_site_column(template, layout.header_row, &record.site) else {
        log.warn(format!("Header '{}' not found in template. Skipping.", record.site));
        return None;
    };

    let share = ownership_share(&record.site);
    let month = parse_pass(income, Pass::Month, log);
    let mut stats = MatchStats::default();
    for (pass, mut sections) in [(Pass::Ytd, ytd), (Pass::Month, month)] {
        if share != 1.0 {
            sections.scale(share);
        }
        let bands = layout.bands(pass, template);
        if pass == Pass::Month && bands[0] != layout.month_bands[0] {
            log.debug(format!("Month revenue band starts at row {}", bands[0].first));
        }
        stats += write_sections(template, bands, &sections, col, threshold);
        log.info(format!("{} data written from {} -> column {col}", pass.name(), record.site));
    }

    Some(SiteMerge {
        filename: filename.to_string(),
        site: record.site,
        column: col,
        stats,
    })
}

fn trimmed_text(sheet: &Sheet, row: u32, col: u32) -> Option<String> {
    sheet.get(row, col).as_text().map(|t| t.trim().to_string())
}

/// Position of the best token-set match for `query` among `choices`.
fn locate(query: &str, choices: &[(u32, String)], threshold: u8) -> Option<u32> {
    let (hit, score) = best_match(query, choices.iter().map(|(_, t)| t.as_str()), Scorer::TokenSet)?;
    if score < threshold {
        return None;
    }
    choices.iter().find(|(_, t)| t == hit).map(|(pos, _)| *pos)
}

/// Write every site's balance-sheet categories into the template
/// `Balance_sheet`, matching categories to label rows and sites to header
/// columns by token-set ratio. Returns the number of cells written.
pub fn merge_balance_sheets(
    template: &mut Sheet,
    summaries: &LineItems<BalanceSheetSummary>,
    layout: &TemplateLayout,
    threshold: u8,
    log: &mut ProcessingLog,
) -> usize {
    let header_row = layout.header_row;
    let rows: Vec<(u32, String)> = (header_row + 1..=template.max_row())
        .filter_map(|r| Some((r, trimmed_text(template, r, LABEL_COL)?)))
        .collect();
    let cols: Vec<(u32, String)> = (1..=template.max_column())
        .filter_map(|c| Some((c, trimmed_text(template, header_row, c)?)))
        .collect();
    // shared by all sites; later sites reuse earlier categories' rows
    let mut row_by_category: LineItems<u32> = LineItems::new();
    for (_, summary) in summaries.iter() {
        for (_, items) in summary.sections() {
            for category in items.keys() {
                if let Some(row) = locate(category.trim(), &rows, threshold) {
                    row_by_category.insert(category, row);
                }
            }
        }
    }

    let mut written = 0;
    for (site, summary) in summaries.iter() {
        let Some(col) = locate(site, &cols, threshold) else {
            log.warn(format!("Column for '{site}' not found. Skipping."));
            continue;
        };
        let share = ownership_share(site);
        for (_, items) in summary.sections() {
            for (category, amount) in items.iter() {
                if let Some(&row) = row_by_category.get(category) {
                    template.set(row, col, amount * share);
                    written += 1;
                }
            }
        }
        log.info(format!("Balance sheet written from {site} -> column {col}"));
    }
    written
}
