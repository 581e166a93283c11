//! Rolling new high: the latest price tops the rest of the trailing window.

use super::{fixed, Detector, SignalConfigError, SignalRow};
use crate::domain::{PriceField, Series};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewHighConfig {
    pub window_days: usize,
    pub price_field: PriceField,
    /// Count a tie with the prior maximum as a new high.
    pub include_equal: bool,
}

impl Default for NewHighConfig {
    fn default() -> Self {
        Self {
            window_days: 20,
            price_field: PriceField::High,
            include_equal: false,
        }
    }
}

impl NewHighConfig {
    pub fn validate(&self) -> Result<(), SignalConfigError> {
        if self.window_days < 2 {
            return Err(SignalConfigError::InvalidWindow {
                detector: "new_high",
                value: self.window_days,
                min: 2,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewHighHit {
    pub price_field: PriceField,
    pub window_days: usize,
    pub include_equal: bool,
    pub window_start: String,
    pub last_date: String,
    pub last_price: f64,
    pub prior_max: f64,
    pub window_max: f64,
    pub last_high: Option<f64>,
    pub last_close: Option<f64>,
}

impl SignalRow for NewHighHit {
    fn columns() -> &'static [&'static str] {
        &[
            "price_field",
            "window_days",
            "include_equal",
            "window_start",
            "last_date",
            "last_price",
            "prior_max",
            "window_max",
            "last_high",
            "last_close",
        ]
    }

    fn values(&self) -> Vec<String> {
        let optional = |v: Option<f64>| v.map(|v| fixed(v, 4)).unwrap_or_default();
        vec![
            self.price_field.to_string(),
            self.window_days.to_string(),
            self.include_equal.to_string(),
            self.window_start.clone(),
            self.last_date.clone(),
            fixed(self.last_price, 4),
            fixed(self.prior_max, 4),
            fixed(self.window_max, 4),
            optional(self.last_high),
            optional(self.last_close),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct NewHigh {
    config: NewHighConfig,
}

impl NewHigh {
    pub fn new(config: NewHighConfig) -> Result<Self, SignalConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &NewHighConfig {
        &self.config
    }
}

impl Detector for NewHigh {
    type Hit = NewHighHit;

    fn name(&self) -> &str {
        "new_high"
    }

    fn price_field(&self) -> PriceField {
        self.config.price_field
    }

    fn detect(&self, series: &Series) -> Option<NewHighHit> {
        let NewHighConfig {
            window_days,
            price_field,
            include_equal,
        } = self.config;

        let prices = series.values(price_field)?;
        let n = prices.len();
        if n < window_days {
            return None;
        }
        let start = n - window_days;
        let window = &prices[start..];
        let (&last_price, prior) = window.split_last()?;
        let prior_max = prior.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let fires = if include_equal {
            last_price >= prior_max
        } else {
            last_price > prior_max
        };
        if !fires {
            return None;
        }

        let last = series.last()?;
        Some(NewHighHit {
            price_field,
            window_days,
            include_equal,
            window_start: series.label(start).to_string(),
            last_date: last.label.clone(),
            last_price,
            prior_max,
            window_max: prior_max.max(last_price),
            last_high: last.high,
            last_close: last.close,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::test_support::{closes, series};

    fn detector(window_days: usize, price_field: PriceField, include_equal: bool) -> NewHigh {
        NewHigh::new(NewHighConfig {
            window_days,
            price_field,
            include_equal,
        })
        .unwrap()
    }

    #[test]
    fn strict_new_high_fires() {
        let s = closes(&[5.0, 6.0, 7.0, 6.0, 8.0]);
        let hit = detector(4, PriceField::Close, false).detect(&s).unwrap();
        assert_eq!(hit.window_start, s.label(1));
        assert_eq!(hit.prior_max, 7.0);
        assert_eq!(hit.window_max, 8.0);
        assert_eq!(
            hit.values(),
            [
                "close",
                "4",
                "false",
                s.label(1),
                s.label(4),
                "8.0000",
                "7.0000",
                "8.0000",
                "8.0000",
                "8.0000"
            ]
        );
    }

    #[test]
    fn tie_needs_include_equal() {
        let s = closes(&[5.0, 6.0, 7.0, 6.0, 7.0]);
        assert!(detector(4, PriceField::Close, false).detect(&s).is_none());
        let hit = detector(4, PriceField::Close, true).detect(&s).unwrap();
        assert_eq!(hit.values()[2], "true");
    }

    #[test]
    fn older_high_outside_window_is_ignored() {
        let s = closes(&[50.0, 6.0, 7.0, 6.0, 8.0]);
        assert!(detector(4, PriceField::Close, false).detect(&s).is_some());
        assert!(detector(5, PriceField::Close, false).detect(&s).is_none());
    }

    #[test]
    fn missing_secondary_field_is_blank() {
        let mut s = series(PriceField::High, &[1.0, 2.0, 3.0]);
        s.observations[2].close = None;
        let hit = detector(2, PriceField::High, false).detect(&s).unwrap();
        assert_eq!(hit.values()[9], "");
        assert_eq!(hit.values()[8], "3.0000");
    }

    #[test]
    fn short_series_is_no_signal() {
        let s = closes(&[1.0, 2.0]);
        assert!(detector(3, PriceField::Close, false).detect(&s).is_none());
    }

    #[test]
    fn window_below_two_is_rejected() {
        let cfg = NewHighConfig {
            window_days: 1,
            ..NewHighConfig::default()
        };
        assert!(NewHigh::new(cfg).is_err());
        assert_eq!(NewHighConfig::default().price_field, PriceField::High);
    }
}
