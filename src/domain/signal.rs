//! Regime detection and the two signal engines (trend + mean reversion).
//!
//! All values here are recomputed from scratch each cycle; nothing is persisted.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::indicator::realized_vol::calculate_realized_vol;
use crate::domain::indicator::sma::{calculate_sma, calculate_volume_sma};
use crate::domain::indicator::zscore::calculate_zscore;
use crate::domain::ohlcv::{OhlcvBar, last_close};

pub const DEFAULT_SLOW_WINDOW: usize = 200;
pub const DEFAULT_Z_WINDOW: usize = 20;
pub const DEFAULT_VOLUME_CONFIRM_MULT: f64 = 1.2;
const VOLUME_AVG_WINDOW: usize = 20;
const Z_ENTRY: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
    Flat,
}

impl Direction {
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
            Direction::Flat => 0.0,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
            Direction::Flat => write!(f, "FLAT"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeState {
    pub bull: bool,
    /// External volatility assumption (VIX), supplied by the caller.
    pub vix: Option<f64>,
    pub realized_vol_20d: Option<f64>,
}

impl RegimeState {
    pub fn with_vix(mut self, vix: Option<f64>) -> Self {
        self.vix = vix;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSignal {
    pub entry: bool,
    pub exit: bool,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MrSignal {
    pub direction: Direction,
    pub entry: bool,
    pub exit: bool,
    pub z_score: Option<f64>,
    pub reason: String,
}

/// Bull when the last close is above the slow SMA; false if the SMA is undefined.
pub fn detect_regime(bars: &[OhlcvBar], slow_window: usize) -> RegimeState {
    let slow = calculate_sma(bars, slow_window).last_value();
    let bull = match (last_close(bars), slow) {
        (Some(close), Some(ma)) => close > ma,
        _ => false,
    };
    let realized_vol_20d = calculate_realized_vol(bars, 20).last_value();

    RegimeState {
        bull,
        vix: None,
        realized_vol_20d,
    }
}

/// Stacked moving-average trend engine behind a macro volatility filter.
pub fn trend_signal(
    bars: &[OhlcvBar],
    regime: &RegimeState,
    vix_max: f64,
    vol_50d_max: f64,
) -> TrendSignal {
    let sma = |n| calculate_sma(bars, n).last_value();
    let (s5, s20, s50, s100, s200) = (sma(5), sma(20), sma(50), sma(100), sma(200));
    let close = last_close(bars).unwrap_or(f64::NAN);

    let gt = |a: Option<f64>, b: Option<f64>| matches!((a, b), (Some(a), Some(b)) if a > b);

    let entry = s200.is_some_and(|s| close > s) && gt(s20, s50) && gt(s5, s20);
    let exit = s100.is_some_and(|s| close < s) || gt(s50, s20);

    let rvol50 = calculate_realized_vol(bars, 50).last_value();
    let vix_ok = regime.vix.is_none_or(|v| v < vix_max);
    let vol_ok = rvol50.is_some_and(|v| v < vol_50d_max);

    if !vix_ok {
        return TrendSignal {
            entry: false,
            exit: false,
            reason: "VIX block".into(),
        };
    }
    if !vol_ok {
        return TrendSignal {
            entry: false,
            exit: false,
            reason: "High 50d realized vol block".into(),
        };
    }

    TrendSignal {
        entry,
        exit,
        reason: "entry/exit evaluated under regime filter OK".into(),
    }
}

/// Regime-adaptive z-score engine: buy dips in bull, short bounces in bear.
pub fn mr_signal(
    bars: &[OhlcvBar],
    regime: &RegimeState,
    z_window: usize,
    volume_confirm_mult: f64,
) -> MrSignal {
    let z = calculate_zscore(bars, z_window).last_value();

    let volume_confirmed = match (
        bars.last(),
        calculate_volume_sma(bars, VOLUME_AVG_WINDOW).last_value(),
    ) {
        (Some(bar), Some(avg)) => bar.volume as f64 > volume_confirm_mult * avg,
        _ => true,
    };

    let Some(z) = z else {
        return MrSignal {
            direction: Direction::Flat,
            entry: false,
            exit: false,
            z_score: None,
            reason: "Insufficient data".into(),
        };
    };

    if regime.bull {
        let entry = z < -Z_ENTRY && volume_confirmed;
        MrSignal {
            direction: if entry { Direction::Long } else { Direction::Flat },
            entry,
            exit: z > 0.0,
            z_score: Some(z),
            reason: "Bull regime: buy dips (z<-2), exit when z>0".into(),
        }
    } else {
        let entry = z > Z_ENTRY && volume_confirmed;
        MrSignal {
            direction: if entry { Direction::Short } else { Direction::Flat },
            entry,
            exit: z < 0.0,
            z_score: Some(z),
            reason: "Bear regime: short bounces (z>2), exit when z<0".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::make_bars;

    /// Gently rising series with a small zig-zag so realized vol is defined and low.
    fn uptrend(n: usize) -> Vec<OhlcvBar> {
        let prices: Vec<f64> = (0..n)
            .map(|i| 100.0 + i as f64 * 0.5 + if i % 2 == 0 { 0.1 } else { -0.1 })
            .collect();
        make_bars(&prices)
    }

    fn downtrend(n: usize) -> Vec<OhlcvBar> {
        let prices: Vec<f64> = (0..n)
            .map(|i| 300.0 - i as f64 * 0.5 + if i % 2 == 0 { 0.1 } else { -0.1 })
            .collect();
        make_bars(&prices)
    }

    fn bull() -> RegimeState {
        RegimeState {
            bull: true,
            vix: None,
            realized_vol_20d: None,
        }
    }

    #[test]
    fn regime_bull_above_slow_ma() {
        let regime = detect_regime(&uptrend(250), DEFAULT_SLOW_WINDOW);
        assert!(regime.bull);
        assert!(regime.realized_vol_20d.is_some());
    }

    #[test]
    fn regime_bear_below_slow_ma() {
        assert!(!detect_regime(&downtrend(250), DEFAULT_SLOW_WINDOW).bull);
    }

    #[test]
    fn regime_short_history_is_not_bull() {
        let regime = detect_regime(&uptrend(50), DEFAULT_SLOW_WINDOW);
        assert!(!regime.bull);
    }

    #[test]
    fn regime_is_deterministic() {
        let bars = uptrend(260);
        assert_eq!(
            detect_regime(&bars, DEFAULT_SLOW_WINDOW),
            detect_regime(&bars, DEFAULT_SLOW_WINDOW)
        );
    }

    #[test]
    fn trend_entry_on_stacked_averages() {
        let sig = trend_signal(&uptrend(250), &bull(), 30.0, 0.40);
        assert!(sig.entry);
        assert!(!sig.exit);
    }

    #[test]
    fn trend_exit_in_downtrend() {
        let sig = trend_signal(&downtrend(250), &bull(), 30.0, 0.40);
        assert!(!sig.entry);
        assert!(sig.exit);
    }

    #[test]
    fn trend_vix_block_takes_precedence() {
        let regime = bull().with_vix(Some(31.0));
        let sig = trend_signal(&uptrend(250), &regime, 30.0, 0.40);
        assert!(!sig.entry && !sig.exit);
        assert_eq!(sig.reason, "VIX block");
    }

    #[test]
    fn trend_undefined_vol_blocks() {
        let sig = trend_signal(&uptrend(40), &bull(), 30.0, 0.40);
        assert_eq!(sig.reason, "High 50d realized vol block");
        assert!(!sig.entry && !sig.exit);
    }

    #[test]
    fn mr_insufficient_data_is_flat() {
        let sig = mr_signal(&uptrend(5), &bull(), 20, 1.2);
        assert_eq!(sig.direction, Direction::Flat);
        assert!(!sig.entry);
        assert_eq!(sig.z_score, None);
        assert_eq!(sig.reason, "Insufficient data");
    }

    #[test]
    fn mr_bull_buys_dip_with_volume() {
        let mut prices = vec![100.0; 19];
        for (i, p) in prices.iter_mut().enumerate() {
            *p += if i % 2 == 0 { 0.5 } else { -0.5 };
        }
        prices.push(90.0);
        let mut bars = make_bars(&prices);
        bars.last_mut().unwrap().volume = 5000;

        let sig = mr_signal(&bars, &bull(), 20, 1.2);
        assert!(sig.z_score.unwrap() < -2.0);
        assert!(sig.entry);
        assert_eq!(sig.direction, Direction::Long);
    }

    #[test]
    fn mr_bull_dip_without_volume_stays_flat() {
        let mut prices = vec![100.0; 19];
        for (i, p) in prices.iter_mut().enumerate() {
            *p += if i % 2 == 0 { 0.5 } else { -0.5 };
        }
        prices.push(90.0);
        let bars = make_bars(&prices);

        let sig = mr_signal(&bars, &bull(), 20, 1.2);
        assert!(!sig.entry);
        assert_eq!(sig.direction, Direction::Flat);
    }

    #[test]
    fn mr_bear_shorts_bounce() {
        let mut prices = vec![100.0; 19];
        for (i, p) in prices.iter_mut().enumerate() {
            *p += if i % 2 == 0 { 0.5 } else { -0.5 };
        }
        prices.push(110.0);
        let mut bars = make_bars(&prices);
        bars.last_mut().unwrap().volume = 5000;

        let regime = RegimeState {
            bull: false,
            ..bull()
        };
        let sig = mr_signal(&bars, &regime, 20, 1.2);
        assert!(sig.entry);
        assert_eq!(sig.direction, Direction::Short);
        assert!(!sig.exit);
    }

    #[test]
    fn mr_volume_confirmation_defaults_true_without_average() {
        // 15 bars: z over 10 defined, volume SMA(20) undefined.
        let mut prices = vec![100.0; 14];
        for (i, p) in prices.iter_mut().enumerate() {
            *p += if i % 2 == 0 { 0.5 } else { -0.5 };
        }
        prices.push(90.0);
        let bars = make_bars(&prices);
        let sig = mr_signal(&bars, &bull(), 10, 1.2);
        assert!(sig.entry);
    }

    #[test]
    fn direction_signs() {
        assert_eq!(Direction::Long.sign(), 1.0);
        assert_eq!(Direction::Short.sign(), -1.0);
        assert_eq!(Direction::Flat.sign(), 0.0);
        assert_eq!(Direction::Short.to_string(), "SHORT");
    }
}
