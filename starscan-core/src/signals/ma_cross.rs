//! Moving-average crossover: a drop below the MA followed by a recovery.
//!
//! Scans the trailing `window_days` days (never before the first defined MA
//! value) as a two-state machine. SEEKING_DOWN looks for a day closing below
//! the MA after a day at or above it; SEEKING_UP then looks for the first day
//! closing back at or above the MA after a day below it.

use super::{fixed, Detector, SignalConfigError, SignalRow};
use crate::domain::{PriceField, Series};
use crate::indicators::rolling_mean;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaCrossConfig {
    pub window_days: usize,
    pub ma_window: usize,
}

impl Default for MaCrossConfig {
    fn default() -> Self {
        Self {
            window_days: 20,
            ma_window: 120,
        }
    }
}

impl MaCrossConfig {
    pub fn validate(&self) -> Result<(), SignalConfigError> {
        if self.window_days == 0 {
            return Err(SignalConfigError::InvalidWindow {
                detector: "ma_cross",
                value: self.window_days,
                min: 1,
            });
        }
        if self.ma_window <= 1 {
            return Err(SignalConfigError::InvalidMaWindow {
                detector: "ma_cross",
                value: self.ma_window,
            });
        }
        Ok(())
    }
}

/// Evidence of a down-cross followed by an up-cross.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossHit {
    pub down_date: String,
    pub up_date: String,
    pub last_date: String,
    pub last_close: f64,
    pub last_ma: f64,
    pub window_days: usize,
    pub ma_window: usize,
}

impl SignalRow for CrossHit {
    fn columns() -> &'static [&'static str] {
        &[
            "down_date",
            "up_date",
            "last_date",
            "last_close",
            // Historical name kept for existing consumers, whatever `ma_window` is.
            "last_ma120",
            "window_days",
            "ma_window",
        ]
    }

    fn values(&self) -> Vec<String> {
        vec![
            self.down_date.clone(),
            self.up_date.clone(),
            self.last_date.clone(),
            fixed(self.last_close, 4),
            fixed(self.last_ma, 4),
            self.window_days.to_string(),
            self.ma_window.to_string(),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct MaCross {
    config: MaCrossConfig,
}

impl MaCross {
    pub fn new(config: MaCrossConfig) -> Result<Self, SignalConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &MaCrossConfig {
        &self.config
    }
}

impl Detector for MaCross {
    type Hit = CrossHit;

    fn name(&self) -> &str {
        "ma_cross"
    }

    fn price_field(&self) -> PriceField {
        PriceField::Close
    }

    fn detect(&self, series: &Series) -> Option<CrossHit> {
        let MaCrossConfig {
            window_days,
            ma_window,
        } = self.config;

        let closes = series.values(PriceField::Close)?;
        let n = closes.len();
        if n < ma_window {
            return None;
        }
        let ma = rolling_mean(&closes, ma_window);
        let window_start = (ma_window - 1).max(n.saturating_sub(window_days));

        let mut down_idx = None;
        let mut up_idx = None;
        for idx in window_start.max(1)..n {
            let (Some(prev_ma), Some(cur_ma)) = (ma[idx - 1], ma[idx]) else {
                continue;
            };
            let prev_close = closes[idx - 1];
            let close = closes[idx];

            match down_idx {
                None => {
                    if prev_close >= prev_ma && close < cur_ma {
                        down_idx = Some(idx);
                    }
                }
                Some(_) => {
                    if prev_close < prev_ma && close >= cur_ma {
                        up_idx = Some(idx);
                        break;
                    }
                }
            }
        }

        let (down_idx, up_idx) = (down_idx?, up_idx?);
        let last = n - 1;
        Some(CrossHit {
            down_date: series.label(down_idx).to_string(),
            up_date: series.label(up_idx).to_string(),
            last_date: series.label(last).to_string(),
            last_close: closes[last],
            last_ma: ma[last]?,
            window_days,
            ma_window,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::test_support::closes;

    fn detector(window_days: usize, ma_window: usize) -> MaCross {
        MaCross::new(MaCrossConfig {
            window_days,
            ma_window,
        })
        .unwrap()
    }

    #[test]
    fn down_then_first_up_cross() {
        let series = closes(&[10.0, 10.0, 10.0, 9.0, 9.0, 9.0, 11.0, 11.0]);
        let hit = detector(20, 3).detect(&series).unwrap();

        // MA3: idx2 10, idx3 9.667, idx4 9.333, idx5 9.0, idx6 9.667, idx7 10.333
        assert_eq!(hit.down_date, series.label(3));
        assert_eq!(hit.up_date, series.label(5));
        assert_eq!(hit.last_date, series.label(7));
        assert_eq!(hit.values()[3], "11.0000");
        assert_eq!(hit.values()[4], "10.3333");
    }

    #[test]
    fn no_recovery_is_no_signal() {
        let series = closes(&[10.0, 10.0, 10.0, 9.0, 8.0, 7.0]);
        assert!(detector(20, 3).detect(&series).is_none());
    }

    #[test]
    fn rising_series_never_drops() {
        let series = closes(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        assert!(detector(20, 3).detect(&series).is_none());
    }

    #[test]
    fn window_limits_the_scan() {
        let series = closes(&[10.0, 10.0, 10.0, 9.0, 9.0, 9.0, 11.0, 11.0]);
        // Only the last two days are scanned; the drop at idx3 is outside.
        assert!(detector(2, 3).detect(&series).is_none());
    }

    #[test]
    fn short_series_is_no_signal() {
        let series = closes(&[10.0, 9.0]);
        assert!(detector(20, 3).detect(&series).is_none());
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        assert!(MaCross::new(MaCrossConfig {
            window_days: 0,
            ma_window: 120
        })
        .is_err());
        assert_eq!(
            MaCrossConfig {
                window_days: 20,
                ma_window: 1
            }
            .validate(),
            Err(SignalConfigError::InvalidMaWindow {
                detector: "ma_cross",
                value: 1
            })
        );
        assert!(MaCrossConfig::default().validate().is_ok());
    }

    #[test]
    fn columns_match_values() {
        let series = closes(&[10.0, 10.0, 10.0, 9.0, 9.0, 9.0, 11.0, 11.0]);
        let hit = detector(20, 3).detect(&series).unwrap();
        assert_eq!(CrossHit::columns().len(), hit.values().len());
        assert_eq!(CrossHit::columns()[4], "last_ma120");
    }
}
