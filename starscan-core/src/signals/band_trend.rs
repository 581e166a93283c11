//! Band-trend: price hugging a rising moving average.
//!
//! Over the trailing `window_days` days the close must stay within `band` of
//! the MA on all but `max_outside` days, the MA must be non-decreasing on at
//! least `min_up_days` day-over-day steps, and the MA must rise by at least
//! `min_rise_pct` from the first to the last day. MA windows are tried in
//! configured order; the first that passes is reported.

use super::{fixed, Detector, SignalConfigError, SignalRow};
use crate::domain::{PriceField, Series};
use crate::indicators::rolling_mean;
use serde::{Deserialize, Serialize};

/// Parse a comma-separated MA window list.
///
/// Blank and non-integer entries are ignored, as are windows of 0 or 1.
pub fn parse_ma_list(raw: &str) -> Vec<usize> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .filter_map(|part| part.parse::<i64>().ok())
        .filter(|n| *n > 1)
        .filter_map(|n| usize::try_from(n).ok())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandTrendConfig {
    pub window_days: usize,
    pub ma_list: Vec<usize>,
    /// Max relative distance `|close - ma| / ma` for a day to count as inside.
    pub band: f64,
    pub max_outside: usize,
    /// Defaults to `max(1, window_days - 4)` when unset.
    pub min_up_days: Option<usize>,
    pub min_rise_pct: f64,
}

impl Default for BandTrendConfig {
    fn default() -> Self {
        Self {
            window_days: 10,
            ma_list: vec![20, 30],
            band: 0.02,
            max_outside: 2,
            min_up_days: None,
            min_rise_pct: 0.0,
        }
    }
}

impl BandTrendConfig {
    pub fn effective_min_up_days(&self) -> usize {
        self.min_up_days
            .unwrap_or_else(|| self.window_days.saturating_sub(4).max(1))
    }

    pub fn validate(&self) -> Result<(), SignalConfigError> {
        if self.window_days == 0 {
            return Err(SignalConfigError::InvalidWindow {
                detector: "band_trend",
                value: self.window_days,
                min: 1,
            });
        }
        if self.ma_list.is_empty() {
            return Err(SignalConfigError::EmptyMaList {
                detector: "band_trend",
            });
        }
        if let Some(&bad) = self.ma_list.iter().find(|w| **w <= 1) {
            return Err(SignalConfigError::InvalidMaWindow {
                detector: "band_trend",
                value: bad,
            });
        }
        Ok(())
    }
}

/// Evidence for one MA window that satisfied every condition.
#[derive(Debug, Clone, PartialEq)]
pub struct BandHit {
    pub ma_window: usize,
    pub window_days: usize,
    pub band: f64,
    pub max_outside: usize,
    pub min_up_days: usize,
    pub min_rise_pct: f64,
    pub up_days: usize,
    pub rise_pct: f64,
    pub start_date: String,
    pub end_date: String,
    pub last_close: f64,
    pub last_ma: f64,
}

impl SignalRow for BandHit {
    fn columns() -> &'static [&'static str] {
        &[
            "ma_window",
            "window_days",
            "band",
            "max_outside",
            "min_up_days",
            "min_rise_pct",
            "up_days",
            "rise_pct",
            "start_date",
            "end_date",
            "last_close",
            "last_ma",
        ]
    }

    fn values(&self) -> Vec<String> {
        vec![
            self.ma_window.to_string(),
            self.window_days.to_string(),
            fixed(self.band, 4),
            self.max_outside.to_string(),
            self.min_up_days.to_string(),
            fixed(self.min_rise_pct, 6),
            self.up_days.to_string(),
            fixed(self.rise_pct, 6),
            self.start_date.clone(),
            self.end_date.clone(),
            fixed(self.last_close, 4),
            fixed(self.last_ma, 4),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct BandTrend {
    config: BandTrendConfig,
    min_up_days: usize,
}

impl BandTrend {
    pub fn new(config: BandTrendConfig) -> Result<Self, SignalConfigError> {
        config.validate()?;
        let min_up_days = config.effective_min_up_days();
        Ok(Self {
            config,
            min_up_days,
        })
    }

    pub fn config(&self) -> &BandTrendConfig {
        &self.config
    }

    /// Evaluate one MA window over the trailing window.
    fn check(&self, series: &Series, closes: &[f64], ma_window: usize) -> Option<BandHit> {
        let cfg = &self.config;
        let total = closes.len();
        if total < cfg.window_days {
            return None;
        }
        let start = total - cfg.window_days;
        let ma = rolling_mean(closes, ma_window);

        let start_ma = ma[start].filter(|v| *v > 0.0)?;
        let end_ma = ma[total - 1]?;

        let mut outside = 0;
        for idx in start..total {
            let day_ma = ma[idx].filter(|v| *v > 0.0)?;
            if (closes[idx] - day_ma).abs() / day_ma > cfg.band {
                outside += 1;
                if outside > cfg.max_outside {
                    return None;
                }
            }
        }

        // Every MA in the window is defined past this point.
        let up_days = ma[start..total]
            .windows(2)
            .filter(|pair| matches!(pair, [Some(prev), Some(cur)] if cur >= prev))
            .count();
        if up_days < self.min_up_days {
            return None;
        }

        let rise_pct = (end_ma - start_ma) / start_ma;
        if rise_pct < cfg.min_rise_pct {
            return None;
        }

        Some(BandHit {
            ma_window,
            window_days: cfg.window_days,
            band: cfg.band,
            max_outside: cfg.max_outside,
            min_up_days: self.min_up_days,
            min_rise_pct: cfg.min_rise_pct,
            up_days,
            rise_pct,
            start_date: series.label(start).to_string(),
            end_date: series.label(total - 1).to_string(),
            last_close: closes[total - 1],
            last_ma: end_ma,
        })
    }
}

impl Detector for BandTrend {
    type Hit = BandHit;

    fn name(&self) -> &str {
        "band_trend"
    }

    fn price_field(&self) -> PriceField {
        PriceField::Close
    }

    fn detect(&self, series: &Series) -> Option<BandHit> {
        let closes = series.values(PriceField::Close)?;
        self.config
            .ma_list
            .iter()
            .find_map(|&ma_window| self.check(series, &closes, ma_window))
    }
}
