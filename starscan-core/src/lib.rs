//! StarScan Core: domain types, data layer, indicators and signal detectors.
//!
//! This crate contains everything that does not orchestrate a batch:
//! - Domain types (trade dates, instruments, observations, series)
//! - Kline providers and the instrument universe
//! - Series parser with logical→physical column resolution
//! - Incremental merge engine and the CSV series store
//! - Moving-average engine
//! - Crossover, band-trend and rolling new-high detectors

pub mod data;
pub mod domain;
pub mod indicators;
pub mod signals;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: types shared with the parallel scan are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::Series>();
        require_sync::<domain::Series>();
        require_send::<domain::Instrument>();
        require_sync::<domain::Instrument>();
        require_send::<data::RecordSet>();
        require_sync::<data::RecordSet>();
        require_send::<data::SeriesStore>();
        require_sync::<data::SeriesStore>();

        require_send::<signals::MaCross>();
        require_sync::<signals::MaCross>();
        require_send::<signals::BandTrend>();
        require_sync::<signals::BandTrend>();
        require_send::<signals::NewHigh>();
        require_sync::<signals::NewHigh>();
        require_send::<signals::CrossHit>();
        require_send::<signals::BandHit>();
        require_send::<signals::NewHighHit>();
    }
}
