//! Indian financial year (April to March) helpers.

use chrono::{Datelike, NaiveDate};

/// First calendar year of the financial year containing `date`.
fn start_year(date: NaiveDate) -> i32 {
    if date.month() < 4 {
        date.year() - 1
    } else {
        date.year()
    }
}

/// Financial-year key for a date, e.g. `FY24-25` for 2025-03-31.
pub fn fiscal_year_of(date: NaiveDate) -> String {
    let start = start_year(date);
    format!(
        "FY{:02}-{:02}",
        start.rem_euclid(100),
        (start + 1).rem_euclid(100)
    )
}

/// 1 April of the financial year containing `date`.
pub fn fiscal_year_start(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(start_year(date), 4, 1).unwrap_or(date)
}

/// Invoice prefix conventionally used for the financial year of `date`.
pub fn default_prefix_for(date: NaiveDate) -> String {
    format!("{}/", fiscal_year_of(date))
}
