//! StarScan Runner: batch orchestration on top of `starscan-core`.
//!
//! This crate provides:
//! - Application configuration (TOML + defaults, validated once)
//! - Incremental ingest loop with progress reporting
//! - Parallel signal scans over the persisted series directory
//! - CSV export of detector results

pub mod config;
pub mod export;
pub mod ingest;
pub mod scan;

pub use config::{AppConfig, ConfigError, FetchConfig, SignalsConfig, StoreConfig};
pub use export::{results_csv, write_results};
pub use ingest::{
    resolve_universe, run_update, update_instrument, IngestOptions, IngestSummary,
    InstrumentOutcome, StdoutProgress, UpdateProgress,
};
pub use scan::{list_series_files, run_scan, scan_file, scan_to_file, ScanError};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn config_is_send_sync() {
        assert_send::<AppConfig>();
        assert_sync::<AppConfig>();
    }

    #[test]
    fn summary_is_send_sync() {
        assert_send::<IngestSummary>();
        assert_sync::<IngestSummary>();
    }
}
