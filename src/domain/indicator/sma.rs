//! Simple moving average over closes or volumes.
//!
//! SMA(n)[i] = mean(x[i-n+1..=i]); the first (n-1) points are invalid.

use crate::domain::indicator::{IndicatorSeries, IndicatorType, rolling_mean, simple_points};
use crate::domain::ohlcv::{OhlcvBar, closes, volumes};

pub fn calculate_sma(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let means = rolling_mean(&closes(bars), period);
    IndicatorSeries {
        indicator_type: IndicatorType::Sma(period),
        values: simple_points(bars.iter().map(|b| b.date), &means),
    }
}

pub fn calculate_volume_sma(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let means = rolling_mean(&volumes(bars), period);
    IndicatorSeries {
        indicator_type: IndicatorType::VolumeSma(period),
        values: simple_points(bars.iter().map(|b| b.date), &means),
    }
}
