use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TallyError;

/// Ordered label -> value map. Keeps first-insertion order so fuzzy tie-breaks
/// and relabeling ("first matching category") are deterministic.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItems<V = f64> {
    entries: Vec<(String, V)>,
}

impl<V> Default for LineItems<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<V> LineItems<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.entries.iter_mut().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Replaces the value in place when the key exists, otherwise appends.
    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        match self.get_mut(&key) {
            Some(slot) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.entries.iter_mut().map(|(_, v)| v)
    }
}

impl LineItems<f64> {
    /// Adds `value` onto the existing entry (or a zero entry).
    pub fn accumulate(&mut self, key: impl Into<String>, value: f64) {
        let key = key.into();
        match self.get_mut(&key) {
            Some(slot) => *slot += value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn scale(&mut self, factor: f64) {
        for v in self.values_mut() {
            *v *= factor;
        }
    }
}

impl<V> FromIterator<(String, V)> for LineItems<V> {
    fn from_iter<I: IntoIterator<Item = (String, V)>>(iter: I) -> Self {
        let mut items = LineItems::new();
        for (k, v) in iter {
            items.insert(k, v);
        }
        items
    }
}

/// Section anchor rows (1-based) within an income sheet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnchorSet {
    pub revenue: Option<u32>,
    pub expenses: Option<u32>,
    pub income: Option<u32>,
}

impl AnchorSet {
    /// All three anchors, provided they are strictly ordered.
    pub fn complete(&self) -> Option<(u32, u32, u32)> {
        let (rev, exp, inc) = (self.revenue?, self.expenses?, self.income?);
        (rev < exp && exp < inc).then_some((rev, exp, inc))
    }
}

/// Line items of one income-statement pass, per band.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncomeSections {
    pub revenue: LineItems,
    pub expenses: LineItems,
    pub income: LineItems,
}

impl IncomeSections {
    pub fn is_empty(&self) -> bool {
        self.revenue.is_empty() && self.expenses.is_empty() && self.income.is_empty()
    }

    pub fn scale(&mut self, factor: f64) {
        self.revenue.scale(factor);
        self.expenses.scale(factor);
        self.income.scale(factor);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteRecord {
    pub filename: String,
    pub site: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BalanceSheetSummary {
    pub assets: LineItems,
    pub liabilities: LineItems,
    pub equity: LineItems,
}

impl BalanceSheetSummary {
    pub fn sections(&self) -> [(&'static str, &LineItems); 3] {
        [
            ("ASSETS", &self.assets),
            ("LIABILITIES", &self.liabilities),
            ("EQUITY", &self.equity),
        ]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BudgetFigures {
    pub month: f64,
    pub ytd: f64,
    pub annual: f64,
}

impl std::ops::Add for BudgetFigures {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self {
            month: self.month + rhs.month,
            ytd: self.ytd + rhs.ytd,
            annual: self.annual + rhs.annual,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PriorYearFigures {
    pub month: f64,
    pub ytd: f64,
}

impl std::ops::Add for PriorYearFigures {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self {
            month: self.month + rhs.month,
            ytd: self.ytd + rhs.ytd,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Month {
    Jan,
    Feb,
    Mar,
    Apr,
    May,
    Jun,
    Jul,
    Aug,
    Sep,
    Oct,
    Nov,
    Dec,
}

impl Month {
    pub const ALL: [Month; 12] = [
        Month::Jan,
        Month::Feb,
        Month::Mar,
        Month::Apr,
        Month::May,
        Month::Jun,
        Month::Jul,
        Month::Aug,
        Month::Sep,
        Month::Oct,
        Month::Nov,
        Month::Dec,
    ];

    pub fn abbrev(&self) -> &'static str {
        match self {
            Self::Jan => "Jan",
            Self::Feb => "Feb",
            Self::Mar => "Mar",
            Self::Apr => "Apr",
            Self::May => "May",
            Self::Jun => "Jun",
            Self::Jul => "Jul",
            Self::Aug => "Aug",
            Self::Sep => "Sep",
            Self::Oct => "Oct",
            Self::Nov => "Nov",
            Self::Dec => "Dec",
        }
    }

    /// 1 for January through 12 for December.
    pub fn number(&self) -> u32 {
        *self as u32 + 1
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abbrev())
    }
}

impl FromStr for Month {
    type Err = TallyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Month::ALL
            .iter()
            .find(|m| m.abbrev().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| TallyError::UnknownMonth(s.to_string()))
    }
}
