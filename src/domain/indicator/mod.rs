//! Technical indicator implementations.
//!
//! Every indicator is a pure function over a bar slice returning an
//! `IndicatorSeries` aligned one-to-one with the input bars. Points inside
//! the warmup window (or otherwise undefined, e.g. a zero-deviation z-score)
//! carry `valid == false`; callers read the latest point via
//! [`IndicatorSeries::last_value`] and must treat `None` as "skip / neutral".

pub mod atr;
pub mod bollinger;
pub mod realized_vol;
pub mod sma;
pub mod zscore;

use chrono::NaiveDate;
use std::fmt;

#[derive(Debug, Clone)]
pub struct IndicatorPoint {
    pub date: NaiveDate,
    pub valid: bool,
    pub value: IndicatorValue,
}

#[derive(Debug, Clone)]
pub enum IndicatorValue {
    Simple(f64),
    Bollinger { upper: f64, middle: f64, lower: f64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    VolumeSma(usize),
    Atr(usize),
    ZScore(usize),
    RealizedVol(usize),
    Bollinger {
        period: usize,
        stddev_mult_x100: u32,
    },
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    /// Value at index `i` if that point is defined.
    pub fn value_at(&self, i: usize) -> Option<f64> {
        let point = self.values.get(i)?;
        match point.value {
            IndicatorValue::Simple(v) if point.valid => Some(v),
            _ => None,
        }
    }

    /// Latest value, `None` when the series is empty or the last point is undefined.
    pub fn last_value(&self) -> Option<f64> {
        self.values.len().checked_sub(1).and_then(|i| self.value_at(i))
    }

    /// Latest (upper, middle, lower) band triple for band indicators.
    pub fn last_bands(&self) -> Option<(f64, f64, f64)> {
        let point = self.values.last()?;
        match point.value {
            IndicatorValue::Bollinger {
                upper,
                middle,
                lower,
            } if point.valid => Some((upper, middle, lower)),
            _ => None,
        }
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::VolumeSma(period) => write!(f, "VOLSMA({})", period),
            IndicatorType::Atr(period) => write!(f, "ATR({})", period),
            IndicatorType::ZScore(period) => write!(f, "ZSCORE({})", period),
            IndicatorType::RealizedVol(period) => write!(f, "RVOL({})", period),
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                let mult = *stddev_mult_x100 as f64 / 100.0;
                write!(f, "BOLLINGER({},{})", period, mult)
            }
        }
    }
}

/// Rolling mean over `period` values; `None` until the window is full.
pub(crate) fn rolling_mean(values: &[f64], period: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            if period == 0 || i + 1 < period {
                return None;
            }
            let window = &values[i + 1 - period..=i];
            Some(window.iter().sum::<f64>() / period as f64)
        })
        .collect()
}

/// Rolling standard deviation with `ddof` delta degrees of freedom
/// (0 = population, 1 = sample).
pub(crate) fn rolling_std(values: &[f64], period: usize, ddof: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            if period == 0 || period <= ddof || i + 1 < period {
                return None;
            }
            let window = &values[i + 1 - period..=i];
            let mean = window.iter().sum::<f64>() / period as f64;
            let ss: f64 = window.iter().map(|v| (v - mean) * (v - mean)).sum();
            Some((ss / (period - ddof) as f64).sqrt())
        })
        .collect()
}

pub(crate) fn simple_points(
    dates: impl Iterator<Item = NaiveDate>,
    values: &[Option<f64>],
) -> Vec<IndicatorPoint> {
    dates
        .zip(values)
        .map(|(date, v)| match v {
            Some(x) if x.is_finite() => IndicatorPoint {
                date,
                valid: true,
                value: IndicatorValue::Simple(*x),
            },
            _ => IndicatorPoint {
                date,
                valid: false,
                value: IndicatorValue::Simple(0.0),
            },
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::domain::ohlcv::OhlcvBar;
    use chrono::{Duration, NaiveDate};

    pub fn make_bars(prices: &[f64]) -> Vec<OhlcvBar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        prices
            .iter()
            .enumerate()
            .map(|(i, &close)| OhlcvBar {
                symbol: "TEST".into(),
                date: start + Duration::days(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1000,
            })
            .collect()
    }
}
