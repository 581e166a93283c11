//! Series parser: raw CSV records in, ordered validated `Series` out.
//!
//! Column lookup happens once per record set: each logical field is resolved
//! to a fixed column index through its alias list, and rows are then read by
//! index. A row whose date or primary price does not parse is dropped on its
//! own; it never aborts the file.

use super::fields::LogicalField;
use super::provider::DataError;
use crate::domain::{Observation, PriceField, Series, TradeDate};
use csv::StringRecord;
use std::fs::File;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Header plus string rows, as read from one tabular file.
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    header: Vec<String>,
    rows: Vec<StringRecord>,
}

impl RecordSet {
    pub fn new(header: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            header,
            rows: rows.into_iter().map(StringRecord::from).collect(),
        }
    }

    /// Read a CSV stream with a header line.
    ///
    /// Rows that the CSV reader itself cannot decode are skipped.
    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self, DataError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let header = rdr.headers()?.iter().map(str::to_string).collect();

        let mut rows = Vec::new();
        for record in rdr.records() {
            match record {
                Ok(row) => rows.push(row),
                Err(e) => tracing::debug!("skipping undecodable row: {e}"),
            }
        }
        Ok(Self { header, rows })
    }

    pub fn from_path(path: &Path) -> Result<Self, DataError> {
        let file = File::open(path)
            .map_err(|e| DataError::StoreError(format!("open {}: {e}", path.display())))?;
        Self::from_reader(file)
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[StringRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Why a record set produced no series.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeriesError {
    #[error("no column for required field '{0}'")]
    Unresolved(&'static str),

    #[error("no valid observations")]
    Empty,
}

/// Column indices resolved once per record set.
#[derive(Debug, Clone, Copy)]
struct ColumnMap {
    date: usize,
    price: usize,
    close: Option<usize>,
    high: Option<usize>,
    code: Option<usize>,
    name: Option<usize>,
}

impl ColumnMap {
    fn resolve(header: &[String], primary: PriceField) -> Result<Self, SeriesError> {
        let date = LogicalField::Date
            .resolve(header)
            .ok_or(SeriesError::Unresolved(LogicalField::Date.as_str()))?;
        let close = LogicalField::Close.resolve(header);
        let high = LogicalField::High.resolve(header);
        let price = match primary {
            PriceField::Close => close,
            PriceField::High => high,
        }
        .ok_or(SeriesError::Unresolved(primary.as_str()))?;

        Ok(Self {
            date,
            price,
            close,
            high,
            code: LogicalField::Code.resolve(header),
            name: LogicalField::Name.resolve(header),
        })
    }
}

fn cell(row: &StringRecord, index: Option<usize>) -> &str {
    index.and_then(|i| row.get(i)).unwrap_or("").trim()
}

/// Strict float conversion; blanks and non-finite values are rejected.
pub fn parse_price(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Builds a `Series` whose primary field is `primary`.
#[derive(Debug, Clone, Copy)]
pub struct SeriesParser {
    primary: PriceField,
}

impl SeriesParser {
    pub fn new(primary: PriceField) -> Self {
        Self { primary }
    }

    pub fn primary(&self) -> PriceField {
        self.primary
    }

    pub fn parse(&self, records: &RecordSet) -> Result<Series, SeriesError> {
        let cols = ColumnMap::resolve(records.header(), self.primary)?;

        let mut code = String::new();
        let mut name = String::new();
        let mut observations = Vec::with_capacity(records.len());

        for row in records.rows() {
            let label = cell(row, Some(cols.date));
            let Some(date) = TradeDate::parse(label) else {
                continue;
            };
            let Some(price) = parse_price(cell(row, Some(cols.price))) else {
                continue;
            };

            if code.is_empty() {
                code = cell(row, cols.code).to_string();
                name = cell(row, cols.name).to_string();
            }

            observations.push(Observation {
                date,
                label: label.to_string(),
                price,
                close: cols.close.and_then(|i| parse_price(cell(row, Some(i)))),
                high: cols.high.and_then(|i| parse_price(cell(row, Some(i)))),
            });
        }

        // Stable sort, then keep the first row seen for any repeated date.
        observations.sort_by_key(|o| o.date);
        observations.dedup_by_key(|o| o.date);

        if observations.is_empty() {
            return Err(SeriesError::Empty);
        }

        Ok(Series {
            code,
            name,
            primary: self.primary,
            observations,
        })
    }
}
