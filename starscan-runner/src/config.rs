//! Application configuration.
//!
//! One `AppConfig` is built at start-up (defaults, then an optional TOML
//! file, then CLI overrides), validated once, and passed by reference.
//!
//! ```toml
//! [fetch]
//! begin = 20230101
//! recent_days = 30
//! retries = 5
//!
//! [store]
//! out_dir = "data"
//!
//! [signals.band_trend]
//! ma_list = [20, 30, 60]
//! band = 0.03
//! ```

use serde::{Deserialize, Serialize};
use starscan_core::data::{EastmoneyConfig, KlineSchema};
use starscan_core::domain::TradeDate;
use starscan_core::signals::{BandTrendConfig, MaCrossConfig, NewHighConfig, SignalConfigError};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Upper bound for `recent_days`: one hundred years.
pub const MAX_RECENT_DAYS: u32 = 36_525;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid fetch setting: {0}")]
    Fetch(String),

    #[error(transparent)]
    Signal(#[from] SignalConfigError),
}

/// Ingest parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub begin: TradeDate,
    pub end: TradeDate,
    /// Only fetch the last N calendar days (today included).
    pub recent_days: Option<u32>,
    pub overwrite: bool,
    /// Explicit instrument codes; the remote listing is used when empty.
    pub codes: Vec<String>,
    pub max_stocks: Option<usize>,
    #[serde(flatten)]
    pub source: EastmoneyConfig,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            begin: TradeDate::MIN,
            end: TradeDate::new(20500101),
            recent_days: None,
            overwrite: false,
            codes: Vec::new(),
            max_stocks: None,
            source: EastmoneyConfig::default(),
        }
    }
}

impl FetchConfig {
    pub fn schema(&self) -> KlineSchema {
        KlineSchema::from_codes(&self.source.fields2)
    }

    pub fn sleep(&self) -> Duration {
        Duration::from_secs_f64(self.source.sleep_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Root holding `daily/` and `stock_basic.csv`.
    pub out_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("data"),
        }
    }
}

/// Detector parameters and result paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalsConfig {
    /// Directory of per-instrument series to scan.
    pub data_dir: PathBuf,
    pub ma_cross: MaCrossConfig,
    pub ma_cross_out: PathBuf,
    pub band_trend: BandTrendConfig,
    pub band_trend_out: PathBuf,
    pub new_high: NewHighConfig,
    pub new_high_out: PathBuf,
}

impl Default for SignalsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/daily"),
            ma_cross: MaCrossConfig::default(),
            ma_cross_out: PathBuf::from("data/signals_ma120.csv"),
            band_trend: BandTrendConfig::default(),
            band_trend_out: PathBuf::from("data/signals_ma20_ma30.csv"),
            new_high: NewHighConfig::default(),
            new_high_out: PathBuf::from("data/signals_new_high_20d.csv"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub fetch: FetchConfig,
    pub store: StoreConfig,
    pub signals: SignalsConfig,
}

impl AppConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Defaults, or the given file when present.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let fetch = &self.fetch;
        if fetch.begin > fetch.end {
            return Err(ConfigError::Fetch(format!(
                "begin {} is after end {}",
                fetch.begin, fetch.end
            )));
        }
        if let Some(days) = fetch.recent_days.filter(|d| *d > MAX_RECENT_DAYS) {
            return Err(ConfigError::Fetch(format!(
                "recent_days must be <= {MAX_RECENT_DAYS}, got {days}"
            )));
        }
        let src = &fetch.source;
        if src.page_size == 0 {
            return Err(ConfigError::Fetch("page_size must be > 0".into()));
        }
        if src.limit == 0 {
            return Err(ConfigError::Fetch("limit must be > 0".into()));
        }
        for (name, value) in [("sleep_secs", src.sleep_secs), ("backoff_secs", src.backoff_secs)] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Fetch(format!("{name} must be >= 0, got {value}")));
            }
        }
        if fetch.schema().fields().is_empty() {
            return Err(ConfigError::Fetch("fields2 lists no kline fields".into()));
        }

        self.signals.ma_cross.validate()?;
        self.signals.band_trend.validate()?;
        self.signals.new_high.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use starscan_core::domain::PriceField;

    #[test]
    fn defaults_validate() {
        let cfg = AppConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.fetch.end, TradeDate::new(20500101));
        assert_eq!(cfg.fetch.source.limit, 2000);
        assert_eq!(cfg.signals.ma_cross.ma_window, 120);
        assert_eq!(cfg.store.out_dir, PathBuf::from("data"));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = AppConfig::from_toml(
            r#"
            [fetch]
            begin = 20230101
            retries = 5
            codes = ["688001", "688002"]

            [signals.band_trend]
            ma_list = [20, 60]

            [signals.new_high]
            price_field = "close"
            include_equal = true
            "#,
        )
        .unwrap();

        assert_eq!(cfg.fetch.begin, TradeDate::new(20230101));
        assert_eq!(cfg.fetch.source.retries, 5);
        assert_eq!(cfg.fetch.source.klt, 101);
        assert_eq!(cfg.fetch.codes.len(), 2);
        assert_eq!(cfg.signals.band_trend.ma_list, vec![20, 60]);
        assert_eq!(cfg.signals.band_trend.window_days, 10);
        assert_eq!(cfg.signals.new_high.price_field, PriceField::Close);
        assert!(cfg.signals.new_high.include_equal);
        cfg.validate().unwrap();
    }

    #[test]
    fn invalid_windows_fail_validation() {
        let cfg = AppConfig::from_toml("[signals.new_high]\nwindow_days = 1\n").unwrap();
        assert!(matches!(cfg.validate(), Err(ConfigError::Signal(_))));

        let cfg = AppConfig::from_toml("[signals.ma_cross]\nma_window = 1\n").unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn inverted_range_fails_validation() {
        let cfg = AppConfig::from_toml("[fetch]\nbegin = 20240102\nend = 20240101\n").unwrap();
        assert!(matches!(cfg.validate(), Err(ConfigError::Fetch(_))));
    }

    #[test]
    fn oversized_recent_days_fails_validation() {
        let cfg = AppConfig::from_toml("[fetch]\nrecent_days = 4000000000\n").unwrap();
        assert!(matches!(cfg.validate(), Err(ConfigError::Fetch(_))));

        let cfg = AppConfig::from_toml("[fetch]\nrecent_days = 30\n").unwrap();
        cfg.validate().unwrap();
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        assert!(matches!(
            AppConfig::from_toml("[fetch\nbegin = "),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = AppConfig::from_file(Path::new("/nonexistent/starscan.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
