//! Average True Range with Wilder smoothing.
//!
//! TR[0] = high - low, TR[i] = true_range(prev_close) afterwards.
//! ATR[0] = TR[0]; ATR[i] = ATR[i-1] + (TR[i] - ATR[i-1]) / n.
//! Defined from the first bar, so short series still yield a (noisier) value.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_atr(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries {
            indicator_type: IndicatorType::Atr(period),
            values: vec![],
        };
    }

    let alpha = 1.0 / period as f64;
    let mut values = Vec::with_capacity(bars.len());
    let mut prev_atr: Option<f64> = None;

    for (i, bar) in bars.iter().enumerate() {
        let tr = if i == 0 {
            bar.high - bar.low
        } else {
            bar.true_range(bars[i - 1].close)
        };

        let atr = match prev_atr {
            None => tr,
            Some(prev) => prev + alpha * (tr - prev),
        };
        prev_atr = Some(atr);

        values.push(IndicatorPoint {
            date: bar.date,
            valid: atr.is_finite(),
            value: IndicatorValue::Simple(atr),
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Atr(period),
        values,
    }
}
