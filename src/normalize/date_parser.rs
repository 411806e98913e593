use chrono::{DateTime, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

static SAP_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/Date\((\d+)\)/$").expect("SAP date pattern should be valid"));

/// `"/Date(1700000000000)/"` → UTC calendar date
pub fn parse_sap_date(s: &str) -> Option<NaiveDate> {
    let caps = SAP_DATE.captures(s)?;
    let millis: i64 = caps[1].parse().ok()?;
    DateTime::from_timestamp_millis(millis).map(|dt| dt.date_naive())
}

/// Reformat a SAP date as `DD/MM/YYYY`; anything else comes back untouched.
pub fn format_sap_date(s: &str) -> Option<String> {
    parse_sap_date(s).map(|d| d.format("%d/%m/%Y").to_string())
}
