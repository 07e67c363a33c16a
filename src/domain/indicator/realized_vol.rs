//! Annualized realized volatility of daily close-to-close returns.
//!
//! r[i] = C[i] / C[i-1] - 1; RVOL(n)[i] = pop_std(r[i-n+1..=i]) × sqrt(252).
//! Needs n + 1 closes; returned as a fraction (0.25 = 25%).

use crate::domain::indicator::{IndicatorSeries, IndicatorType, rolling_std, simple_points};
use crate::domain::ohlcv::OhlcvBar;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Simple returns aligned to bars; the first bar has no return.
pub fn daily_returns(bars: &[OhlcvBar]) -> Vec<Option<f64>> {
    (0..bars.len())
        .map(|i| {
            if i == 0 {
                return None;
            }
            let prev = bars[i - 1].close;
            if prev == 0.0 {
                None
            } else {
                Some(bars[i].close / prev - 1.0)
            }
        })
        .collect()
}

pub fn calculate_realized_vol(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let returns = daily_returns(bars);
    let mut vols = vec![None; bars.len()];

    // Windows containing an undefined return stay undefined.
    if bars.len() > 1 {
        let tail: Vec<f64> = returns[1..].iter().map(|r| r.unwrap_or(f64::NAN)).collect();
        for (i, sd) in rolling_std(&tail, period, 0).into_iter().enumerate() {
            vols[i + 1] = sd
                .filter(|v| v.is_finite())
                .map(|v| v * TRADING_DAYS_PER_YEAR.sqrt());
        }
    }

    IndicatorSeries {
        indicator_type: IndicatorType::RealizedVol(period),
        values: simple_points(bars.iter().map(|b| b.date), &vols),
    }
}

/// Realized vol over the most recent `lookback` returns, annualized.
///
/// Uses however many returns are available (up to `lookback`) and yields
/// 0.0 when there are none, so the allocator's dampener degrades to a no-op
/// on very short series.
pub fn trailing_realized_vol(bars: &[OhlcvBar], lookback: usize) -> f64 {
    let returns: Vec<f64> = daily_returns(bars).into_iter().flatten().collect();
    let start = returns.len().saturating_sub(lookback);
    let window = &returns[start..];
    if window.is_empty() {
        return 0.0;
    }
    let mean = window.iter().sum::<f64>() / window.len() as f64;
    let var = window.iter().map(|r| (r - mean) * (r - mean)).sum::<f64>() / window.len() as f64;
    var.sqrt() * TRADING_DAYS_PER_YEAR.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use crate::domain::indicator::test_support::make_bars;

    #[test]
    fn constant_prices_have_zero_vol() {
        let bars = make_bars(&[100.0; 30]);
        let series = calculate_realized_vol(&bars, 20);
        assert_eq!(series.last_value(), Some(0.0));
    }

    #[test]
    fn needs_period_plus_one_closes() {
        let bars = make_bars(&[100.0; 20]);
        assert_eq!(calculate_realized_vol(&bars, 20).last_value(), None);
        let bars = make_bars(&[100.0; 21]);
        assert!(calculate_realized_vol(&bars, 20).last_value().is_some());
    }

    #[test]
    fn alternating_returns_annualize() {
        // returns alternate +10% / -(1/11): closes 100, 110, 100, 110, 100
        let bars = make_bars(&[100.0, 110.0, 100.0, 110.0, 100.0]);
        let series = calculate_realized_vol(&bars, 4);
        let rets = [0.1, 100.0 / 110.0 - 1.0, 0.1, 100.0 / 110.0 - 1.0];
        let mean = rets.iter().sum::<f64>() / 4.0;
        let sd = (rets.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / 4.0).sqrt();
        let expected = sd * 252f64.sqrt();
        assert_abs_diff_eq!(series.last_value().unwrap(), expected, epsilon = 1e-12);
        assert_abs_diff_eq!(trailing_realized_vol(&bars, 4), expected, epsilon = 1e-12);
    }

    #[test]
    fn trailing_vol_short_series() {
        assert_eq!(trailing_realized_vol(&make_bars(&[100.0]), 20), 0.0);
        assert_eq!(trailing_realized_vol(&make_bars(&[]), 20), 0.0);
    }
}
