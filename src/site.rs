//! Maps source filenames to template site columns.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::models::SiteRecord;
use crate::rules::{OWNERSHIP_SHARES, SITE_ALIASES, SITE_NAME_EXCEPTIONS};
use crate::workbook::Sheet;

fn duplicate_suffix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\s*\(\d+\)(\.xlsx)$").expect("valid suffix pattern"))
}

fn leading_digits() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\d\s]+").expect("valid prefix pattern"))
}

/// Strip a browser duplicate-download counter: "fs2025Bedford (1).xlsx" -> "fs2025Bedford.xlsx".
pub fn normalize_filename(filename: &str) -> String {
    duplicate_suffix().replace(filename, "$1").into_owned()
}

/// Filename -> site label lookup for one reporting year.
#[derive(Debug, Clone)]
pub struct SiteResolver {
    year: i32,
    aliases: BTreeMap<String, String>,
}

impl SiteResolver {
    /// Built-in aliases for `year`, overlaid with `extra` (full filename -> site).
    pub fn new(year: i32, extra: &BTreeMap<String, String>) -> Self {
        let mut aliases: BTreeMap<String, String> = SITE_ALIASES
            .iter()
            .map(|(stem, site)| (format!("fs{year}{stem}.xlsx"), site.to_string()))
            .collect();
        aliases.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self { year, aliases }
    }

    /// Site label from the alias table only, as written in template headers.
    pub fn alias(&self, filename: &str) -> Option<&str> {
        self.aliases
            .get(&normalize_filename(filename))
            .map(String::as_str)
    }

    /// Canonical upper-case site name: alias table first, else the filename
    /// with its `fs<year>` prefix and extension removed.
    pub fn resolve(&self, filename: &str) -> SiteRecord {
        let normalized = normalize_filename(filename);
        let site = match self.aliases.get(&normalized) {
            Some(site) => site.to_uppercase(),
            None => {
                let derived = normalized
                    .replace(".xlsx", "")
                    .replace(&format!("fs{}", self.year), "")
                    .to_uppercase();
                SITE_NAME_EXCEPTIONS
                    .iter()
                    .find(|(from, _)| *from == derived)
                    .map_or(derived, |(_, to)| to.to_string())
            }
        };
        SiteRecord {
            filename: filename.to_string(),
            site,
        }
    }
}

/// Share of each amount that belongs in the consolidation for `site`.
pub fn ownership_share(site: &str) -> f64 {
    let upper = site.to_uppercase();
    OWNERSHIP_SHARES
        .iter()
        .find(|(needle, _)| upper.contains(needle))
        .map_or(1.0, |(_, share)| *share)
}

/// First column in `header_row` whose trimmed upper-case text equals `site`,
/// either verbatim or after dropping a leading run of digits and spaces.
pub fn find_site_column(sheet: &Sheet, header_row: u32, site: &str) -> Option<u32> {
    (1..=sheet.max_column()).find(|&col| {
        let header = sheet.label(header_row, col).trim().to_uppercase();
        header == site || leading_digits().replace(&header, "") == site
    })
}
