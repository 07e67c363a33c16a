//! Z-score of the close against its rolling mean.
//!
//! Z(n)[i] = (C[i] - SMA(n)[i]) / STDDEV(n)[i], population deviation.
//! Undefined during warmup and wherever the deviation is zero.

use crate::domain::indicator::{
    IndicatorSeries, IndicatorType, rolling_mean, rolling_std, simple_points,
};
use crate::domain::ohlcv::{OhlcvBar, closes};

pub fn calculate_zscore(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let closes = closes(bars);
    let means = rolling_mean(&closes, period);
    let stds = rolling_std(&closes, period, 0);

    let z: Vec<Option<f64>> = closes
        .iter()
        .zip(means.iter().zip(stds.iter()))
        .map(|(c, pair)| match pair {
            (Some(mu), Some(sd)) if *sd > 0.0 => Some((c - mu) / sd),
            _ => None,
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::ZScore(period),
        values: simple_points(bars.iter().map(|b| b.date), &z),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use crate::domain::indicator::test_support::make_bars;

    #[test]
    fn zscore_known_value() {
        let bars = make_bars(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        let series = calculate_zscore(&bars, 8);
        // mean 5, pop sd 2 → (9 - 5) / 2
        assert_abs_diff_eq!(series.last_value().unwrap(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn zscore_zero_deviation_is_undefined() {
        let bars = make_bars(&[100.0; 25]);
        let series = calculate_zscore(&bars, 20);
        assert_eq!(series.last_value(), None);
    }

    #[test]
    fn zscore_short_series_is_undefined() {
        let bars = make_bars(&[1.0, 2.0, 3.0]);
        assert_eq!(calculate_zscore(&bars, 20).last_value(), None);
    }
}
