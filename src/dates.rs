//! Date tokens naming the daily archives
//!
//! A token is the `YYYYMMDD` stem of an archive file name. Literal tokens are
//! only checked for shape (8 ASCII digits); generated ranges go through
//! `chrono` and are always real calendar days.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Dates exported when neither the config nor the CLI provide any
pub const DEFAULT_DATES: [&str; 8] = [
    "20250914", "20250915", "20250916", "20250917",
    "20250918", "20250919", "20250920", "20250921",
];

const TOKEN_FORMAT: &str = "%Y%m%d";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateError {
    #[error("invalid date token '{0}': expected 8 digits (YYYYMMDD)")]
    InvalidToken(String),

    #[error("invalid date '{0}': expected YYYYMMDD or YYYY-MM-DD")]
    InvalidDate(String),

    #[error("date range start {from} is after end {to}")]
    InvertedRange { from: NaiveDate, to: NaiveDate },
}

/// An 8-digit `YYYYMMDD` archive identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DateToken(String);

impl DateToken {
    pub fn parse(value: &str) -> Result<Self, DateError> {
        if value.len() == 8 && value.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(value.to_string()))
        } else {
            Err(DateError::InvalidToken(value.to_string()))
        }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self(date.format(TOKEN_FORMAT).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DateToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DateToken {
    type Err = DateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DateToken {
    type Error = DateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DateToken> for String {
    fn from(token: DateToken) -> Self {
        token.0
    }
}

/// The built-in literal date list
pub fn default_dates() -> Vec<DateToken> {
    DEFAULT_DATES
        .iter()
        .map(|d| DateToken(d.to_string()))
        .collect()
}

/// Every calendar day from `from` to `to`, both inclusive
pub fn date_range(from: NaiveDate, to: NaiveDate) -> Result<Vec<DateToken>, DateError> {
    if from > to {
        return Err(DateError::InvertedRange { from, to });
    }

    let mut dates = Vec::new();
    let mut current = from;
    while current <= to {
        dates.push(DateToken::from_date(current));
        match current.checked_add_days(Days::new(1)) {
            Some(next) => current = next,
            None => break,
        }
    }
    Ok(dates)
}

/// Parse a calendar date given as `YYYYMMDD` or `YYYY-MM-DD`
pub fn parse_calendar_date(value: &str) -> Result<NaiveDate, DateError> {
    NaiveDate::parse_from_str(value, TOKEN_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y-%m-%d"))
        .map_err(|_| DateError::InvalidDate(value.to_string()))
}

/// Pick the dates for a run: explicit tokens first, then a range, then the
/// configured list, then the built-in list
pub fn select_dates(
    explicit: &[DateToken],
    range: Option<(NaiveDate, NaiveDate)>,
    configured: &[DateToken],
) -> Result<Vec<DateToken>, DateError> {
    if !explicit.is_empty() {
        return Ok(explicit.to_vec());
    }
    if let Some((from, to)) = range {
        return date_range(from, to);
    }
    if !configured.is_empty() {
        return Ok(configured.to_vec());
    }
    Ok(default_dates())
}
