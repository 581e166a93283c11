//! Data provider traits and structured error types.
//!
//! `DataProvider` abstracts over kline sources and `UniverseProvider` over
//! instrument listings, so the ingest loop can run against the live service
//! or an in-memory mock in tests.

use crate::domain::{Instrument, TradeDate};
use thiserror::Error;

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("request to {url} failed after {attempts} attempts: {reason}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        reason: String,
    },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("store error: {0}")]
    StoreError(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("data error: {0}")]
    Other(String),
}

/// The `data` object of one kline response.
///
/// `klines` holds the raw comma-joined rows; `meta` holds every other key of
/// the object (already stringified), in the order the response listed them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KlinePayload {
    pub klines: Vec<String>,
    pub meta: Vec<(String, String)>,
}

impl KlinePayload {
    /// True when the response carried neither rows nor metadata.
    pub fn is_empty(&self) -> bool {
        self.klines.is_empty() && self.meta.is_empty()
    }
}

/// Source of daily klines for a single instrument.
pub trait DataProvider {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch klines in `[begin, end]`.
    ///
    /// `Ok(None)` means the source answered but had no data object.
    fn fetch_klines(
        &self,
        instrument: &Instrument,
        begin: TradeDate,
        end: TradeDate,
    ) -> Result<Option<KlinePayload>, DataError>;
}

/// Source of the instrument universe.
pub trait UniverseProvider {
    /// List instruments, stopping once `max` have been collected.
    fn list_instruments(&self, max: Option<usize>) -> Result<Vec<Instrument>, DataError>;
}
