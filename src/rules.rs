//! Rule tables behind the label heuristics.
//!
//! Every table here is append-only: rows are applied in order and existing
//! rows must not be reordered or removed, since earlier rewrites feed later
//! ones and consolidated outputs from past periods depend on them.

/// Ordered (whole-word pattern, canonical phrase) rewrites applied by
/// [`crate::normalizer::normalize`].
pub const SYNONYM_RULES: &[(&str, &str)] = &[
    (r"\bindustrial rent\b", "rental income"),
    (r"\bretail rental income\b", "rental income"),
    (r"\boffice rent\b", "rental income"),
    (r"\brental revenue\b", "rental income"),
    (r"\brental income\b", "rental income"),
    (r"\blease - cp rail\b", "rent"),
    (r"\bmerchandise revenue\b", "merchandise income"),
    (r"\bmerchandise income\b", "merchandise income"),
    (r"\binsurance revenue\b", "insurance income"),
    (r"\binsurance income\b", "insurance income"),
    (r"\btruck rental\b", "truck rental"),
    (r"\buhaul\b", "truck rental"),
    (r"\bbad debt\b", "bad debt"),
    (r"\bbad debts\b", "bad debt"),
    (r"\boffice supplies\b", "office"),
    (r"\bprofessional fees\b", "professional"),
    (r"\bproperty mgt\. fee\b", "management fee"),
    (r"\bmanagement fee\b", "management fee"),
    (r"\bamortization/finance cost\b", "amortization"),
    (r"\bamortization/finance costs\b", "amortization"),
    (r"\bamortization\b", "amortization"),
    (r"\bdepreciation\b", "depreciation"),
    (r"\bmortgage interest\b", "mortgage interest"),
    (r"\bmortgage loan interest\b", "mortgage interest"),
    (r"\blegal fee\b", "legal fees"),
    (r"\blegal fees\b", "legal fees"),
    (r"\blease payment\b", "lease payment"),
    (r"\bgain on sale of asset\b", "gain/loss on investment"),
    (r"\bgain/loss on investment\b", "gain/loss on investment"),
    (r"\bother income\b", "other income"),
    (r"\bother revenue\b", "other income"),
    (r"\butilities\b", "utilities"),
    (r"\bmaintenance & repairs\b", "maintenance"),
    (r"\bmaintenance\b", "maintenance"),
    (r"\binsurance\b", "insurance"),
    (r"\badvertising\b", "advertising"),
    (r"\bbank charges\b", "bank charges"),
    (r"\brealty taxes\b", "realty taxes"),
    (r"\brealty tax\b", "realty taxes"),
    (r"\bsalaries & benefits\b", "salaries"),
    (r"\bsalaries\b", "salaries"),
    (r"\btelephone\b", "telephone"),
    (r"\boffice\b", "office"),
    (r"\blease\s+cp\s+rail\b", "rent"),
];

/// Source filename stem (after `fs<year>`) -> template site header.
pub const SITE_ALIASES: &[(&str, &str)] = &[
    ("Bedford", "Bedford"),
    ("Beechgrove", "Scarborough"),
    ("Bering", "380 Bering"),
    ("Dundas", "Dundas"),
    ("Eastern", "Eastern"),
    ("Laird", "1 Laird"),
    ("Laird33", "33 Laird"),
    ("Lakeshore", "Lakeshore"),
    ("Weston", "207 Weston"),
];

/// Derived (uppercased) site name -> canonical site, for files missing from
/// [`SITE_ALIASES`].
pub const SITE_NAME_EXCEPTIONS: &[(&str, &str)] = &[("BEECHGROVE", "SCARBOROUGH")];

/// Site-name substring -> ownership share applied to every written amount.
pub const OWNERSHIP_SHARES: &[(&str, f64)] = &[("WESTON", 0.5)];

/// Balance-sheet renames: (section, source category, template category).
pub const BALANCE_RENAMES: &[(&str, &str, &str)] = &[
    ("LIABILITIES", "LOANS PAYABLE", "Due to CSIT Companies"),
    ("LIABILITIES", "HOLDBACK PAYABLE", "Deferred Revenue/Deposits"),
    ("ASSETS", "LOANS RECEIVABLE", "Due From CSIT Companies"),
    ("EQUITY", "PRIVATE ACCOUNTS", "Retained Earnings"),
];

/// Category every "HST ... RECOVERABLE" liability folds into.
pub const ACCOUNTS_PAYABLE: &str = "ACCOUNTS PAYABLE";
/// Name given to an HST line when there is no accounts-payable line to fold into.
pub const ACCOUNTS_PAYABLE_FALLBACK: &str = "ACCOUNTS PAYABLE AND ACCRUED";

/// Budget / prior-year lines summed into the first label of each pair.
pub const COMBINED_LINES: &[(&str, &str)] = &[
    (
        "Mortgage /Loan Interest",
        "Loan Interest (CSIT to Family Mortgage)",
    ),
    ("CP Rail Lease (Laird)", "Rent PUD/CSITPM Head Office"),
];

/// Budget lines not read from the budget workbook: (label, monthly rate).
pub const INJECTED_MONTHLY_RATES: &[(&str, f64)] =
    &[("Amortization", 26500.0), ("Depreciation", 121963.0)];

/// Budget/prior-year label -> template `Income_statement` row label.
/// `None` drops the line on purpose (roll-up totals).
pub const COMPARATIVE_LABEL_ALIASES: &[(&str, Option<&str>)] = &[
    ("Rental Revenue", Some("RENTAL INCOME")),
    ("Merchandise Revenue", Some("MERCHANDISE INCOME")),
    ("Insurance Revenue", Some("INSURANCE INCOME")),
    ("Truck Rental", Some("TRUCK RENTAL")),
    ("Truck and Labour (Mobile)", None),
    ("Bad Debts", Some("LESS: BAD DEBTS")),
    ("Other Income", Some("OTHER INCOME")),
    ("Management fee (Weston)", Some("MANAGEMENT FEE")),
    ("Recoveries (Weston)", Some("RECOVERIES")),
    ("Property Management fee - Bedford,", Some("PROPERTY MGT. FEE")),
    ("CP Rail Lease (Laird)", Some("RENT")),
    ("Loss (Gain) on Sale of Equipment", Some("(GAIN)/LOSS ON INVESTMENT")),
    ("Merchandise Purchase", Some("MERCHANDISE")),
    ("Advertising", Some("ADVERTISING")),
    ("Utilities", Some("UTILITIES")),
    ("Insurance", Some("INSURANCE")),
    ("Professional Fees", Some("PROFESSIONAL FEES")),
    ("Office Supplies", Some("OFFICE SUPPLIES")),
    ("Bank Charges", Some("BANK CHARGES")),
    ("Realty Tax", Some("REALTY TAXES")),
    ("Maintenance & Repairs", Some("MAINTENANCE & REPAIRS")),
    ("Salaries & Benefits", Some("SALARIES & BENEFITS")),
    ("Telephone", Some("TELEPHONE")),
    ("Rent", Some("RENT")),
    ("Lakeshore Rent Payment", Some("LEASE PAYMENT")),
    ("Minority Interest", Some("MINORITY INTEREST")),
    ("Legal Fees", Some("LEGAL FEES")),
    ("Mortgage /Loan Interest", Some("MORTGAGE/LOAN INTEREST")),
    ("Amortization", Some("AMORTIZATION")),
    ("Depreciation", Some("DEPRECIATION")),
    ("TOTAL REVENUE", None),
    ("TOTAL OPERATING EXPENSES", None),
    ("NET OPERATING INCOME (LOSS)", None),
    ("NET RENTAL INCOME (LOSS)", None),
    ("NET PROFIT/(LOSS)", None),
];

/// Template rows that never receive comparatives even when a label resolves to them.
pub const COMPARATIVE_SKIP_ROWS: &[&str] = &[
    "TOTAL REVENUE",
    "TOTAL OPERATING EXPENSES",
    "NET OPERATING INCOME (LOSS)",
    "NET RENTAL INCOME (LOSS)",
];

/// Template `Income_statement` row labels flagged as injected constants.
pub const INJECTED_ROW_LABELS: &[&str] = &["AMORTIZATION", "DEPRECIATION"];

/// Template `Balance_sheet` row label flagged as an elimination entry.
pub const INTERCOMPANY_LABEL: &str = "INTERCOMPANY";
