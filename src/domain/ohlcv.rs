//! Daily OHLCV bar representation and series validation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::error::EodTraderError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcvBar {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl OhlcvBar {
    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }
}

pub fn closes(bars: &[OhlcvBar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

pub fn volumes(bars: &[OhlcvBar]) -> Vec<f64> {
    bars.iter().map(|b| b.volume as f64).collect()
}

pub fn last_close(bars: &[OhlcvBar]) -> Option<f64> {
    bars.last().map(|b| b.close)
}

/// Reject series a cycle must not decide on: empty, unordered, duplicated,
/// negative volume, or non-finite prices.
pub fn validate_series(symbol: &str, bars: &[OhlcvBar]) -> Result<(), EodTraderError> {
    let invalid = |reason: String| EodTraderError::BarValidation {
        symbol: symbol.to_string(),
        reason,
    };

    if bars.is_empty() {
        return Err(invalid("empty series".into()));
    }

    for (i, bar) in bars.iter().enumerate() {
        if i > 0 {
            let prev = bars[i - 1].date;
            if bar.date == prev {
                return Err(invalid(format!("duplicate date {}", bar.date)));
            }
            if bar.date < prev {
                return Err(invalid(format!(
                    "dates not increasing ({} after {})",
                    bar.date, prev
                )));
            }
        }
        if bar.volume < 0 {
            return Err(invalid(format!("negative volume on {}", bar.date)));
        }
        let prices = [bar.open, bar.high, bar.low, bar.close];
        if prices.iter().any(|p| !p.is_finite()) {
            return Err(invalid(format!("non-finite price on {}", bar.date)));
        }
    }

    Ok(())
}

/// Calendar days between the last bar and `as_of`; `None` for an empty series.
pub fn staleness_days(bars: &[OhlcvBar], as_of: NaiveDate) -> Option<i64> {
    bars.last().map(|b| (as_of - b.date).num_days())
}
