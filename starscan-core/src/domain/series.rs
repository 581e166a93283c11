//! Observation and Series: the parsed, ordered view of one instrument's file.

use super::TradeDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Price column a detector evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceField {
    Close,
    High,
}

impl PriceField {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceField::Close => "close",
            PriceField::High => "high",
        }
    }
}

impl fmt::Display for PriceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PriceField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "close" => Ok(PriceField::Close),
            "high" => Ok(PriceField::High),
            other => Err(format!("unknown price field '{other}' (expected high or close)")),
        }
    }
}

/// One trading day for one instrument.
///
/// `price` is the series' primary field and is always present; `close` and
/// `high` are carried separately and may be absent when the column is missing
/// or unparseable on this row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: TradeDate,
    /// Date exactly as written in the source row (trimmed).
    pub label: String,
    pub price: f64,
    pub close: Option<f64>,
    pub high: Option<f64>,
}

impl Observation {
    pub fn field(&self, field: PriceField) -> Option<f64> {
        match field {
            PriceField::Close => self.close,
            PriceField::High => self.high,
        }
    }
}

/// Ordered observations for one instrument, strictly increasing by date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    /// Code recorded in the file, empty when the file carries none.
    pub code: String,
    pub name: String,
    pub primary: PriceField,
    pub observations: Vec<Observation>,
}

impl Series {
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn last(&self) -> Option<&Observation> {
        self.observations.last()
    }

    /// Values of `field` for every observation, or `None` if any day lacks it.
    pub fn values(&self, field: PriceField) -> Option<Vec<f64>> {
        if field == self.primary {
            return Some(self.observations.iter().map(|o| o.price).collect());
        }
        self.observations.iter().map(|o| o.field(field)).collect()
    }

    pub fn label(&self, index: usize) -> &str {
        self.observations
            .get(index)
            .map(|o| o.label.as_str())
            .unwrap_or("")
    }
}
