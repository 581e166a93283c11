//! Domain types for StarScan

pub mod instrument;
pub mod series;
pub mod trade_date;

pub use instrument::{Instrument, DEFAULT_MARKET, IDENTITY_FIELDS};
pub use series::{Observation, PriceField, Series};
pub use trade_date::TradeDate;
