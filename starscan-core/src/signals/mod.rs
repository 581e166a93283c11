//! Signal detection over persisted daily series.
//!
//! Detectors are pure: they read one ordered `Series` and either report a hit
//! or nothing. They never touch the store and never depend on the order in
//! which instruments are scanned.

pub mod aggregate;
pub mod band_trend;
pub mod ma_cross;
pub mod new_high;

pub use aggregate::{Match, ResultSet, ScanOutcome};
pub use band_trend::{parse_ma_list, BandHit, BandTrend, BandTrendConfig};
pub use ma_cross::{CrossHit, MaCross, MaCrossConfig};
pub use new_high::{NewHigh, NewHighConfig, NewHighHit};

use crate::domain::{PriceField, Series};
use thiserror::Error;

/// Rejected detector parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SignalConfigError {
    #[error("{detector}: window_days must be >= {min}, got {value}")]
    InvalidWindow {
        detector: &'static str,
        value: usize,
        min: usize,
    },

    #[error("{detector}: ma_window must be > 1, got {value}")]
    InvalidMaWindow { detector: &'static str, value: usize },

    #[error("{detector}: no usable moving-average window in list")]
    EmptyMaList { detector: &'static str },
}

/// One detector's evidence for a matching instrument, as output columns.
///
/// The instrument's `code` and `name` are not part of the row; the result
/// export prepends them.
pub trait SignalRow {
    fn columns() -> &'static [&'static str];

    fn values(&self) -> Vec<String>;
}

/// Pattern detector over one ordered series.
///
/// # Invariants
/// - `detect()` MUST be deterministic for the same series
/// - `detect()` MUST NOT depend on any other instrument
pub trait Detector: Send + Sync {
    type Hit: SignalRow + Send;

    /// Detector name for logging.
    fn name(&self) -> &str;

    /// Price column the series must be parsed with.
    fn price_field(&self) -> PriceField;

    fn detect(&self, series: &Series) -> Option<Self::Hit>;
}

/// Fixed-point text with `places` decimals, as written to result files.
pub(crate) fn fixed(value: f64, places: usize) -> String {
    format!("{value:.places$}")
}
