use comfy_table::{Cell, Table};

use crate::error::{Result, TallyError};
use crate::settings::{load_settings, save_settings, settings_path};

pub fn show() -> Result<()> {
    let settings = load_settings();
    let layout = &settings.layout;
    println!("Settings:    {}", settings_path().display());
    println!("Threshold:   {}", settings.threshold);
    println!("Output dir:  {}", settings.output_dir);
    println!(
        "Layout:      header row {}, budget cols {}/{}/{}, last-year cols {}/{}, balance col {}",
        layout.header_row,
        layout.budget_month_col,
        layout.budget_ytd_col,
        layout.annual_col,
        layout.prior_month_col,
        layout.prior_ytd_col,
        layout.prior_balance_col
    );

    if settings.site_aliases.is_empty() {
        println!("Aliases:     (built-in only)");
        return Ok(());
    }
    let mut table = Table::new();
    table.set_header(vec!["Filename", "Site"]);
    for (filename, site) in &settings.site_aliases {
        table.add_row(vec![Cell::new(filename), Cell::new(site)]);
    }
    println!("Aliases\n{table}");
    Ok(())
}

pub fn set_threshold(value: u8) -> Result<()> {
    if value > 100 {
        return Err(TallyError::Settings(format!(
            "threshold must be between 0 and 100, got {value}"
        )));
    }
    let mut settings = load_settings();
    settings.threshold = value;
    save_settings(&settings)?;
    println!("Fuzzy threshold set to {value}");
    Ok(())
}

pub fn alias(filename: &str, site: &str) -> Result<()> {
    let mut settings = load_settings();
    settings
        .site_aliases
        .insert(filename.to_string(), site.to_string());
    save_settings(&settings)?;
    println!("Added alias: '{filename}' \u{2192} {site}");
    Ok(())
}
