//! In-memory spreadsheet document: named sheets of cells addressed 1-based.
//!
//! Values are read with calamine. A template opened with
//! [`Workbook::open_template`] also keeps its umya-spreadsheet document, and
//! saving writes only the edited cells back into it so number formats,
//! fonts, borders, widths and merges survive.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Cursor;

use calamine::{Data, Reader};
use umya_spreadsheet::Spreadsheet;

use crate::error::{Result, TallyError};

#[derive(Debug, Clone, Default, PartialEq)]
pub enum CellValue {
    #[default]
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric cells only.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) if !n.is_nan() => Some(*n),
            _ => None,
        }
    }

    /// Numbers, or text that reads as an amount ("1,234.50", "$40", "(12.00)").
    pub fn coerce_number(&self) -> Option<f64> {
        match self {
            Self::Number(_) => self.as_number(),
            Self::Text(s) => parse_amount(s),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
            Self::Bool(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
        }
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// Parse a text amount; `None` when it isn't one.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let s = raw.replace([',', '"', '$'], "");
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        return inner.trim().parse::<f64>().ok().map(|v| -v);
    }
    if let Some(rest) = s.strip_prefix('-') {
        return rest.trim().parse::<f64>().ok().map(|v| -v);
    }
    s.parse().ok()
}

/// Solid fill color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const YELLOW: Rgb = Rgb(0xFF, 0xFF, 0x00);

    pub fn hex(&self) -> String {
        format!("{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }

    /// Opaque ARGB, as stored in xlsx fills.
    fn argb(&self) -> String {
        format!("FF{}", self.hex())
    }
}

#[derive(Debug, Clone, Default)]
struct Cell {
    value: CellValue,
    formula: Option<String>,
    fill: Option<Rgb>,
    /// Value changed since load.
    edited: bool,
}

static EMPTY: CellValue = CellValue::Empty;

#[derive(Debug, Clone)]
pub struct Sheet {
    name: String,
    cells: BTreeMap<(u32, u32), Cell>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: BTreeMap::new(),
        }
    }

    /// Builds a sheet whose first row/column land on A1.
    pub fn from_rows(name: impl Into<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let mut sheet = Sheet::new(name);
        for (r, row) in rows.into_iter().enumerate() {
            for (c, value) in row.into_iter().enumerate() {
                if !value.is_empty() {
                    sheet.set(r as u32 + 1, c as u32 + 1, value);
                }
            }
        }
        sheet
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, row: u32, col: u32) -> &CellValue {
        self.cells.get(&(row, col)).map_or(&EMPTY, |c| &c.value)
    }

    /// Cell text for label columns: strings as-is, numbers rendered, otherwise empty.
    pub fn label(&self, row: u32, col: u32) -> String {
        match self.get(row, col) {
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => n.to_string(),
            _ => String::new(),
        }
    }

    /// Overwrites the cell value, dropping any formula it held.
    pub fn set(&mut self, row: u32, col: u32, value: impl Into<CellValue>) {
        let cell = self.cells.entry((row, col)).or_default();
        cell.value = value.into();
        cell.formula = None;
        cell.edited = true;
    }

    fn load(&mut self, row: u32, col: u32, value: CellValue) {
        self.cells.entry((row, col)).or_default().value = value;
    }

    pub fn set_formula(&mut self, row: u32, col: u32, formula: impl Into<String>) {
        self.cells.entry((row, col)).or_default().formula = Some(formula.into());
    }

    pub fn formula(&self, row: u32, col: u32) -> Option<&str> {
        self.cells.get(&(row, col)).and_then(|c| c.formula.as_deref())
    }

    pub fn set_fill(&mut self, row: u32, col: u32, color: Rgb) {
        self.cells.entry((row, col)).or_default().fill = Some(color);
    }

    pub fn fill(&self, row: u32, col: u32) -> Option<Rgb> {
        self.cells.get(&(row, col)).and_then(|c| c.fill)
    }

    pub fn max_row(&self) -> u32 {
        self.cells.keys().map(|(r, _)| *r).max().unwrap_or(0)
    }

    pub fn max_column(&self) -> u32 {
        self.cells.keys().map(|(_, c)| *c).max().unwrap_or(0)
    }

    /// Zero-based view of the whole sheet starting at A1.
    pub fn to_grid(&self) -> Grid {
        let (rows, cols) = (self.max_row(), self.max_column());
        let mut grid = vec![vec![CellValue::Empty; cols as usize]; rows as usize];
        for (&(r, c), cell) in &self.cells {
            grid[(r - 1) as usize][(c - 1) as usize] = cell.value.clone();
        }
        Grid { rows: grid }
    }
}

/// Zero-based, header-less table of mixed values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid {
    rows: Vec<Vec<CellValue>>,
}

impl Grid {
    pub fn new(rows: Vec<Vec<CellValue>>) -> Self {
        Self { rows }
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn get(&self, row: usize, col: usize) -> &CellValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY)
    }

    pub fn row(&self, row: usize) -> &[CellValue] {
        self.rows.get(row).map_or(&[][..], Vec::as_slice)
    }

    /// First row whose column-0 text equals `label` exactly.
    pub fn find_label(&self, label: &str) -> Option<usize> {
        self.find_label_from(0, label)
    }

    pub fn find_label_from(&self, from: usize, label: &str) -> Option<usize> {
        (from..self.n_rows()).find(|&r| self.get(r, 0).as_text() == Some(label))
    }
}

#[derive(Default)]
pub struct Workbook {
    sheets: Vec<Sheet>,
    /// Original document for templates; saved edits are written into it.
    document: Option<Box<Spreadsheet>>,
}

impl fmt::Debug for Workbook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workbook")
            .field("sheets", &self.sheet_names())
            .field("document", &self.document.is_some())
            .finish()
    }
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sheet(&mut self, sheet: Sheet) {
        self.sheets.push(sheet);
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|s| s.name == name)
    }

    pub fn require_sheet(&self, name: &str) -> Result<&Sheet> {
        self.sheet(name)
            .ok_or_else(|| TallyError::missing_sheet(name, &self.sheet_names()))
    }

    /// Exact name first, then the first sheet whose name differs only in case.
    pub fn require_sheet_any_case(&self, name: &str) -> Result<&Sheet> {
        self.sheet(name)
            .or_else(|| self.sheets.iter().find(|s| s.name.eq_ignore_ascii_case(name)))
            .ok_or_else(|| TallyError::missing_sheet(name, &self.sheet_names()))
    }

    pub fn require_sheet_mut(&mut self, name: &str) -> Result<&mut Sheet> {
        let available = self.sheet_names();
        self.sheet_mut(name)
            .ok_or_else(|| TallyError::missing_sheet(name, &available))
    }

    /// Open an .xlsx/.xls/.ods document from raw bytes, keeping cached values
    /// and formulas.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = calamine::open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
        let mut workbook = Workbook::new();
        for name in reader.sheet_names() {
            let mut sheet = Sheet::new(&name);
            let range = reader.worksheet_range(&name)?;
            if let Some((r0, c0)) = range.start() {
                for (r, c, data) in range.used_cells() {
                    let value = from_data(data);
                    if !value.is_empty() {
                        sheet.load(r0 + r as u32 + 1, c0 + c as u32 + 1, value);
                    }
                }
            }
            if let Ok(formulas) = reader.worksheet_formula(&name) {
                if let Some((r0, c0)) = formulas.start() {
                    for (r, c, f) in formulas.used_cells() {
                        if !f.is_empty() {
                            sheet.set_formula(r0 + r as u32 + 1, c0 + c as u32 + 1, f.clone());
                        }
                    }
                }
            }
            workbook.add_sheet(sheet);
        }
        Ok(workbook)
    }

    /// Open the consolidation template: values for reading, plus the full
    /// document so saving keeps everything that isn't edited.
    pub fn open_template(bytes: &[u8]) -> Result<Self> {
        let mut workbook = Self::from_bytes(bytes)?;
        let document = umya_spreadsheet::reader::xlsx::read_reader(Cursor::new(bytes.to_vec()), true)
            .map_err(|e| TallyError::Document(e.to_string()))?;
        workbook.document = Some(Box::new(document));
        Ok(workbook)
    }

    /// Serialize as .xlsx.
    ///
    /// A template writes only edited values and new fills into its original
    /// document. Any other workbook is written out in full.
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        let fresh = self.document.is_none();
        let mut book = match self.document {
            Some(document) => *document,
            None => blank_document(&self.sheets)?,
        };
        for sheet in &self.sheets {
            let Some(ws) = book.get_sheet_by_name_mut(&sheet.name) else {
                continue;
            };
            for (&(r, c), cell) in &sheet.cells {
                if fresh || cell.edited || cell.fill.is_some() {
                    write_cell(ws.get_cell_mut((c, r)), cell, fresh);
                }
            }
        }
        let mut out = Cursor::new(Vec::new());
        umya_spreadsheet::writer::xlsx::write_writer(&book, &mut out)
            .map_err(|e| TallyError::Document(e.to_string()))?;
        Ok(out.into_inner())
    }
}

fn blank_document(sheets: &[Sheet]) -> Result<Spreadsheet> {
    let mut book = umya_spreadsheet::new_file_empty_worksheet();
    for sheet in sheets {
        book.new_sheet(sheet.name.as_str())
            .map_err(|e| TallyError::Document(e.to_string()))?;
    }
    Ok(book)
}

fn write_cell(target: &mut umya_spreadsheet::Cell, cell: &Cell, fresh: bool) {
    if fresh || cell.edited {
        match &cell.value {
            CellValue::Number(n) => {
                target.set_value_number(*n);
            }
            CellValue::Text(s) => {
                target.set_value_string(s.as_str());
            }
            CellValue::Bool(b) => {
                target.set_value_bool(*b);
            }
            CellValue::Empty => {
                if cell.edited {
                    target.set_value_string("");
                }
            }
        }
    }
    if fresh {
        if let Some(formula) = &cell.formula {
            target.set_formula(formula.as_str());
        }
    }
    if let Some(rgb) = cell.fill {
        target.get_style_mut().set_background_color(rgb.argb());
    }
}

fn from_data(data: &Data) -> CellValue {
    match data {
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::String(s) if s.is_empty() => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Text(e.to_string()),
        Data::Empty => CellValue::Empty,
    }
}
