//! Simple Moving Average (SMA).
//!
//! Rolling mean over a lookback window, maintained as a running sum.
//! The first defined value sits at index `window - 1`.

/// Trailing mean of `values` over `window` days.
///
/// Output has the input's length; index `i` is `None` while fewer than
/// `window` values are available (everywhere when `values.len() < window`,
/// and everywhere for a zero window).
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let n = values.len();
    let mut result = vec![None; n];
    if window == 0 || n < window {
        return result;
    }

    let mut sum: f64 = values[..window].iter().sum();
    let w = window as f64;
    result[window - 1] = Some(sum / w);

    for i in window..n {
        sum += values[i] - values[i - window];
        result[i] = Some(sum / w);
    }

    result
}
