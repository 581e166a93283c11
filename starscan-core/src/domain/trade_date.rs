//! Trading date in canonical `YYYYMMDD` integer form.
//!
//! The remote source and older files write dates as `2024-01-02`, `2024/01/02`
//! or `20240102`. All of them normalize to the same key, so comparisons and
//! deduplication never depend on how a row happened to be spelled.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Calendar date encoded as `YYYYMMDD`.
///
/// `TradeDate::MIN` (zero) doubles as the open lower bound of a fetch range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TradeDate(u32);

impl TradeDate {
    pub const MIN: TradeDate = TradeDate(0);

    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Parse a date string, stripping `-` and `/` separators.
    ///
    /// Returns `None` unless exactly eight ASCII digits remain.
    pub fn parse(raw: &str) -> Option<Self> {
        let cleaned: String = raw
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '/')
            .collect();
        if cleaned.len() != 8 || !cleaned.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        cleaned.parse().ok().map(TradeDate)
    }

    pub fn from_naive(date: NaiveDate) -> Self {
        let year = u32::try_from(date.year()).unwrap_or(0);
        Self(year * 10_000 + date.month() * 100 + date.day())
    }

    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TradeDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08}", self.0)
    }
}
