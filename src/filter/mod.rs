// src/filter/mod.rs

use crate::error::{ReportError, Result};
use chrono::{Months, NaiveDate};
use std::fmt;

/// Which business key a lookup filters on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterKey {
    FarmCode,
    ContractNumber,
}

impl FilterKey {
    /// Field name as the service expects it.
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterKey::FarmCode => "FARM_CODE",
            FilterKey::ContractNumber => "CONTRACT_NUMBER",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FilterKey::FarmCode => "Número da Fazenda",
            FilterKey::ContractNumber => "Número do Contrato",
        }
    }
}

impl fmt::Display for FilterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single key/value lookup. The value is never validated: an empty or
/// malformed value goes to the service as typed and the response decides.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyFilter {
    pub key: FilterKey,
    pub value: String,
}

impl KeyFilter {
    pub fn new(key: FilterKey, value: impl Into<String>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }

    /// OData `$filter` expression, e.g. `FARM_CODE eq '1234'`.
    pub fn odata_expression(&self) -> String {
        format!("{} eq '{}'", self.key.as_str(), self.value)
    }
}

/// Inclusive calendar range plus the season label sent alongside it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub season_label: String,
}

impl Period {
    pub fn for_month(year: i32, month: u32, season_label: impl Into<String>) -> Result<Self> {
        let (start, end) = month_range(year, month)?;
        Ok(Self {
            start,
            end,
            season_label: season_label.into(),
        })
    }

    /// `YYYYMMDD`, the format the period headers use.
    pub fn start_compact(&self) -> String {
        self.start.format("%Y%m%d").to_string()
    }

    pub fn end_compact(&self) -> String {
        self.end.format("%Y%m%d").to_string()
    }
}

/// Everything one query needs. Built per request and dropped afterwards.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Query {
    pub filter: Option<KeyFilter>,
    pub period: Option<Period>,
}

impl Query {
    pub fn with_filter(mut self, filter: KeyFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_period(mut self, period: Period) -> Self {
        self.period = Some(period);
        self
    }
}

/// First and last calendar day of `month`/`year`.
pub fn month_range(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate)> {
    let invalid = || ReportError::InvalidPeriod { year, month };
    let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let end = start
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .ok_or_else(invalid)?;
    Ok((start, end))
}
