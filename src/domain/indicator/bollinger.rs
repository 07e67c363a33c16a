//! Bollinger Bands.
//!
//! - Middle: SMA(n) of closes
//! - Upper / Lower: Middle ± (multiplier × StdDev)
//!
//! StdDev here is the sample deviation (divides by N-1), which is what the
//! exposure allocator's momentum test is calibrated against.
//! Warmup: first (period-1) bars are invalid.

use crate::domain::indicator::{
    IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue, rolling_mean, rolling_std,
};
use crate::domain::ohlcv::{OhlcvBar, closes};

pub fn calculate_bollinger(
    bars: &[OhlcvBar],
    period: usize,
    stddev_mult_x100: u32,
) -> IndicatorSeries {
    let mult = stddev_mult_x100 as f64 / 100.0;
    let closes = closes(bars);
    let means = rolling_mean(&closes, period);
    let stds = rolling_std(&closes, period, 1);

    let values = bars
        .iter()
        .zip(means.iter().zip(stds.iter()))
        .map(|(bar, pair)| match pair {
            (Some(middle), Some(sd)) => IndicatorPoint {
                date: bar.date,
                valid: true,
                value: IndicatorValue::Bollinger {
                    upper: middle + mult * sd,
                    middle: *middle,
                    lower: middle - mult * sd,
                },
            },
            _ => IndicatorPoint {
                date: bar.date,
                valid: false,
                value: IndicatorValue::Bollinger {
                    upper: 0.0,
                    middle: 0.0,
                    lower: 0.0,
                },
            },
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Bollinger {
            period,
            stddev_mult_x100,
        },
        values,
    }
}
