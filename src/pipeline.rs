//! One consolidation run: source files, budget and last year's figures merged
//! into a copy of the template.

use std::collections::BTreeMap;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::balance::parse_balance_sheet;
use crate::budget::{
    highlight_injected_rows, highlight_intercompany, parse_budget, parse_prior_balance,
    parse_prior_year, write_comparatives, write_prior_balance, ComparativeStats,
};
use crate::error::{Result, StageExt, TallyError};
use crate::log::ProcessingLog;
use crate::merge::{merge_balance_sheets, merge_income_file, SiteMerge, TemplateLayout};
use crate::models::{BalanceSheetSummary, BudgetFigures, LineItems, Month, PriorYearFigures};
use crate::site::SiteResolver;
use crate::workbook::Workbook;

pub const STAGE_TEMPLATE: &str = "Loading template file";
pub const STAGE_BALANCE_WRITE: &str = "Writing balance sheet values";
pub const STAGE_BUDGET: &str = "Processing budget data";
pub const STAGE_PRIOR_INCOME: &str = "Processing last year's income statement";
pub const STAGE_COMPARATIVES: &str = "Writing budget and last year's figures";
pub const STAGE_PRIOR_BALANCE: &str = "Processing last year's balance sheet";
pub const STAGE_PRIOR_BALANCE_WRITE: &str = "Writing last year's balance sheet values";
pub const STAGE_SAVE: &str = "Saving consolidated file";

pub const INCOME_SHEET: &str = "Income";
pub const INCOME_STATEMENT_SHEET: &str = "Income_statement";
pub const PRIOR_BALANCE_SHEET: &str = "Balance sheet";
pub const BALANCE_SHEET: &str = "Balance_sheet";
pub const REQUIRED_TEMPLATE_SHEETS: [&str; 4] =
    [INCOME_SHEET, INCOME_STATEMENT_SHEET, PRIOR_BALANCE_SHEET, BALANCE_SHEET];

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub year: i32,
    pub month: Month,
    /// Minimum fuzzy score (0-100) for line-item, category and site matches.
    pub threshold: u8,
    pub layout: TemplateLayout,
    /// Extra filename -> site aliases over the built-in table.
    pub site_aliases: BTreeMap<String, String>,
}

impl RunConfig {
    pub fn new(year: i32, month: &str, threshold: u8) -> Result<Self> {
        let month = month.parse::<Month>()?;
        if threshold > 100 {
            return Err(TallyError::Other(format!(
                "Fuzzy threshold must be between 0 and 100, got {threshold}"
            )));
        }
        Ok(Self {
            year,
            month,
            threshold,
            layout: TemplateLayout::default(),
            site_aliases: BTreeMap::new(),
        })
    }

    pub fn output_name(&self) -> String {
        format!("Consolidated_Financial_{}_{}.xlsx", self.year, self.month)
    }

    fn budget_sheet(&self) -> String {
        format!("Consolidated {}", self.year)
    }
}

#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct RunInputs {
    pub sources: Vec<SourceFile>,
    pub template: Vec<u8>,
    pub budget: Vec<u8>,
    pub prior_year: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    #[serde(skip)]
    pub output: Vec<u8>,
    pub file_name: String,
    pub sites: Vec<SiteMerge>,
    pub duplicates: Vec<String>,
    pub balance_cells: usize,
    pub comparatives: ComparativeStats,
    pub prior_balances: usize,
    pub log: ProcessingLog,
}

fn compute_checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn load_template(bytes: &[u8]) -> Result<Workbook> {
    let workbook = Workbook::open_template(bytes)?;
    let missing: Vec<&str> = REQUIRED_TEMPLATE_SHEETS
        .into_iter()
        .filter(|name| workbook.sheet(name).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(TallyError::Other(format!(
            "Template file is missing required sheets: {}",
            missing.join(", ")
        )));
    }
    Ok(workbook)
}

/// Parsed sources in upload order, skipping repeated content and unreadable files.
fn load_sources(
    sources: &[SourceFile],
    log: &mut ProcessingLog,
    duplicates: &mut Vec<String>,
) -> Vec<(String, Workbook)> {
    let mut seen: BTreeMap<String, &str> = BTreeMap::new();
    let mut loaded = Vec::new();
    for file in sources {
        let checksum = compute_checksum(&file.bytes);
        if let Some(first) = seen.get(&checksum) {
            log.warn(format!("{} has the same content as {first}. Skipping.", file.name));
            duplicates.push(file.name.clone());
            continue;
        }
        seen.insert(checksum, &file.name);
        match Workbook::from_bytes(&file.bytes) {
            Ok(workbook) => loaded.push((file.name.clone(), workbook)),
            Err(e) => log.error(format!("ERROR processing {}: {e}", file.name)),
        }
    }
    loaded
}

fn load_budget(bytes: &[u8], config: &RunConfig) -> Result<LineItems<BudgetFigures>> {
    let workbook = Workbook::from_bytes(bytes)?;
    let grid = workbook.require_sheet(&config.budget_sheet())?.to_grid();
    parse_budget(&grid, config.year, config.month)
}

fn load_prior_income(workbook: &Workbook) -> Result<LineItems<PriorYearFigures>> {
    let grid = workbook.require_sheet_any_case(INCOME_STATEMENT_SHEET)?.to_grid();
    parse_prior_year(&grid)
}

/// Run every stage against `inputs`. Per-file problems land in the report's
/// log; a missing required sheet or row aborts with [`TallyError::Stage`].
pub fn consolidate(config: &RunConfig, inputs: &RunInputs) -> Result<RunReport> {
    let mut log = ProcessingLog::new();
    let layout = &config.layout;
    let threshold = config.threshold;
    let resolver = SiteResolver::new(config.year, &config.site_aliases);

    let mut template = load_template(&inputs.template).stage(STAGE_TEMPLATE)?;
    log.info(format!(
        "Consolidating {} {} with threshold {threshold}",
        config.month, config.year
    ));

    let mut duplicates = Vec::new();
    let sources = load_sources(&inputs.sources, &mut log, &mut duplicates);

    let mut sites = Vec::new();
    {
        let income = template.require_sheet_mut(INCOME_SHEET).stage(STAGE_TEMPLATE)?;
        for (name, workbook) in &sources {
            let merged =
                merge_income_file(income, workbook, name, &resolver, layout, threshold, &mut log);
            sites.extend(merged);
        }
    }

    let mut summaries: LineItems<BalanceSheetSummary> = LineItems::new();
    for (name, workbook) in &sources {
        let Some(label) = resolver.alias(name) else {
            log.debug(format!("{name} has no site alias; balance sheet not consolidated"));
            continue;
        };
        match parse_balance_sheet(workbook, &mut log) {
            Ok(summary) => summaries.insert(label, summary),
            Err(e) => log.error(format!("ERROR processing balance sheet {name}: {e}")),
        }
    }
    let balance_cells = {
        let sheet = template.require_sheet_mut(BALANCE_SHEET).stage(STAGE_BALANCE_WRITE)?;
        merge_balance_sheets(sheet, &summaries, layout, threshold, &mut log)
    };

    let budget = load_budget(&inputs.budget, config).stage(STAGE_BUDGET)?;
    log.info(format!("Budget: {} lines for {}", budget.len(), config.month));

    let prior_workbook = Workbook::from_bytes(&inputs.prior_year).stage(STAGE_PRIOR_INCOME)?;
    let prior = load_prior_income(&prior_workbook).stage(STAGE_PRIOR_INCOME)?;
    log.info(format!("Last year: {} lines", prior.len()));

    let comparatives = {
        let sheet = template
            .require_sheet_mut(INCOME_STATEMENT_SHEET)
            .stage(STAGE_COMPARATIVES)?;
        let stats = write_comparatives(sheet, &budget, &prior, layout, &mut log);
        highlight_injected_rows(sheet);
        stats
    };
    let balance_sheet = template.require_sheet_mut(BALANCE_SHEET).stage(STAGE_COMPARATIVES)?;
    if let Some(row) = highlight_intercompany(balance_sheet) {
        log.debug(format!("Intercompany row {row} highlighted"));
    }

    let balances = parse_prior_balance(&prior_workbook).stage(STAGE_PRIOR_BALANCE)?;
    let prior_balances = {
        let sheet = template
            .require_sheet_mut(PRIOR_BALANCE_SHEET)
            .stage(STAGE_PRIOR_BALANCE_WRITE)?;
        write_prior_balance(sheet, &balances, layout.prior_balance_col)
    };
    log.info(format!("Last year's balance sheet: {prior_balances} rows written"));

    let output = template.into_bytes().stage(STAGE_SAVE)?;
    Ok(RunReport {
        output,
        file_name: config.output_name(),
        sites,
        duplicates,
        balance_cells,
        comparatives,
        prior_balances,
        log,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workbook::{CellValue, Sheet};

    fn bytes(sheets: Vec<Sheet>) -> Vec<u8> {
        let mut wb = Workbook::new();
        for sheet in sheets {
            wb.add_sheet(sheet);
        }
        wb.into_bytes().unwrap()
    }

    fn template() -> Vec<u8> {
        let mut income = Sheet::new(INCOME_SHEET);
        income.set(5, 3, "BEDFORD");
        income.set(6, 1, "Rental Income");
        let mut statement = Sheet::new(INCOME_STATEMENT_SHEET);
        statement.set(10, 1, "RENTAL INCOME");
        statement.set(11, 1, "AMORTIZATION");
        let mut prior_bs = Sheet::new(PRIOR_BALANCE_SHEET);
        prior_bs.set(7, 1, "CASH");
        let mut bs = Sheet::new(BALANCE_SHEET);
        bs.set(5, 2, "Bedford");
        bs.set(6, 1, "CASH");
        bs.set(9, 1, "INTERCOMPANY");
        bytes(vec![income, statement, prior_bs, bs])
    }

    fn source() -> Vec<u8> {
        let row = |label: &str, ytd: f64| {
            let mut cells = vec![CellValue::Empty; 8];
            cells[0] = label.into();
            cells[1] = (ytd / 10.0).into();
            cells[7] = ytd.into();
            cells
        };
        let income = Sheet::from_rows(
            "INCOME",
            vec![
                vec!["Revenue".into()],
                row("Industrial Rent", 1000.0),
                vec!["Expenses".into()],
                row("Advertising", 50.0),
                vec!["Income".into()],
                row("Management Fee", 20.0),
            ],
        );
        let balance = Sheet::from_rows(
            "BALANCE SHEET",
            vec![
                vec!["ASSETS".into()],
                vec!["CASH".into(), 250.0.into()],
                vec!["TOTAL ASSETS".into(), 250.0.into()],
                vec!["LIABILITIES".into()],
                vec!["TOTAL LIABILITIES".into()],
                vec!["EQUITY".into()],
                vec!["TOTAL EQUITY".into()],
            ],
        );
        bytes(vec![income, balance])
    }

    fn budget() -> Vec<u8> {
        let mut header = vec![CellValue::Number(2025.0), CellValue::Empty];
        header.extend(Month::ALL.iter().map(|m| CellValue::from(m.abbrev())));
        let mut rent = vec!["Rental Revenue".into(), CellValue::Empty];
        rent.extend((0..12).map(|_| CellValue::Number(100.0)));
        rent.push(1200.0.into());
        bytes(vec![Sheet::from_rows(
            "Consolidated 2025",
            vec![header, rent, vec!["NET PROFIT/(LOSS)".into()]],
        )])
    }

    fn prior(start_label: &str) -> Vec<u8> {
        prior_named(INCOME_STATEMENT_SHEET, start_label)
    }

    fn prior_named(sheet_name: &str, start_label: &str) -> Vec<u8> {
        let mut rent = vec![CellValue::Empty; 8];
        rent[0] = start_label.into();
        rent[1] = 80.0.into();
        rent[7] = 480.0.into();
        let statement = Sheet::from_rows(
            sheet_name,
            vec![rent, vec!["NET RENTAL INCOME (LOSS)".into()]],
        );
        let balance = Sheet::from_rows(
            "Balance sheet",
            vec![vec!["CASH".into(), "".into(), "1,000".into()]],
        );
        bytes(vec![statement, balance])
    }

    fn inputs(prior_start: &str) -> RunInputs {
        let bedford = source();
        RunInputs {
            sources: vec![
                SourceFile { name: "fs2025Bedford.xlsx".into(), bytes: bedford.clone() },
                SourceFile { name: "fs2025Bedford (1).xlsx".into(), bytes: bedford },
            ],
            template: template(),
            budget: budget(),
            prior_year: prior(prior_start),
        }
    }

    #[test]
    fn test_run_config_validation() {
        assert!(RunConfig::new(2025, "Jun", 85).is_ok());
        assert!(matches!(RunConfig::new(2025, "June", 85), Err(TallyError::UnknownMonth(_))));
        assert!(RunConfig::new(2025, "Jun", 101).is_err());
        assert_eq!(
            RunConfig::new(2025, "jun", 85).unwrap().output_name(),
            "Consolidated_Financial_2025_Jun.xlsx"
        );
    }

    #[test]
    fn test_consolidate_end_to_end() {
        let config = RunConfig::new(2025, "Jun", 85).unwrap();
        let report = consolidate(&config, &inputs("RENTAL INCOME")).unwrap();
        assert_eq!(report.file_name, "Consolidated_Financial_2025_Jun.xlsx");
        assert_eq!(report.duplicates, vec!["fs2025Bedford (1).xlsx".to_string()]);
        assert_eq!(report.sites.len(), 1);
        assert_eq!(report.balance_cells, 1);
        assert_eq!(report.prior_balances, 1);

        let out = Workbook::from_bytes(&report.output).unwrap();
        let income = out.sheet(INCOME_SHEET).unwrap();
        assert_eq!(income.get(6, 3).as_number(), Some(1000.0));
        let statement = out.sheet(INCOME_STATEMENT_SHEET).unwrap();
        assert_eq!(statement.get(10, 3).as_number(), Some(100.0));
        assert_eq!(statement.get(10, 9).as_number(), Some(600.0));
        assert_eq!(statement.get(10, 15).as_number(), Some(1200.0));
        assert_eq!(statement.get(10, 5).as_number(), Some(80.0));
        assert_eq!(statement.get(11, 9).as_number(), Some(26500.0 * 6.0));
        let bs = out.sheet(BALANCE_SHEET).unwrap();
        assert_eq!(bs.get(6, 2).as_number(), Some(250.0));
        let prior_bs = out.sheet(PRIOR_BALANCE_SHEET).unwrap();
        assert_eq!(prior_bs.get(7, 5).as_number(), Some(1000.0));
    }

    #[test]
    fn test_weak_prior_year_marker_is_fatal() {
        let config = RunConfig::new(2025, "Jun", 85).unwrap();
        let err = consolidate(&config, &inputs("Widgets")).unwrap_err();
        assert_eq!(err.stage(), Some(STAGE_PRIOR_INCOME));
        let source = std::error::Error::source(&err).unwrap();
        assert!(source.to_string().contains("RENTAL INCOME"));
    }

    #[test]
    fn test_prior_income_sheet_name_ignores_case() {
        let config = RunConfig::new(2025, "Jun", 85).unwrap();
        let mut run = inputs("RENTAL INCOME");
        run.prior_year = prior_named("INCOME_STATEMENT", "RENTAL INCOME");
        let report = consolidate(&config, &run).unwrap();
        let out = Workbook::from_bytes(&report.output).unwrap();
        let statement = out.sheet(INCOME_STATEMENT_SHEET).unwrap();
        assert_eq!(statement.get(10, 5).as_number(), Some(80.0));
    }

    #[test]
    fn test_missing_template_sheet_is_fatal() {
        let config = RunConfig::new(2025, "Jun", 85).unwrap();
        let mut run = inputs("RENTAL INCOME");
        run.template = bytes(vec![Sheet::new(INCOME_SHEET)]);
        let err = consolidate(&config, &run).unwrap_err();
        assert_eq!(err.stage(), Some(STAGE_TEMPLATE));
        assert!(err.to_string().contains("Income_statement"));
    }

    #[test]
    fn test_missing_budget_sheet_is_fatal() {
        let config = RunConfig::new(2024, "Jun", 85).unwrap();
        let err = consolidate(&config, &inputs("RENTAL INCOME")).unwrap_err();
        assert_eq!(err.stage(), Some(STAGE_BUDGET));
        assert!(err.to_string().contains("Consolidated 2024"));
    }
}
