//! Circuit breakers and volatility-budgeted position sizing.

use serde::{Deserialize, Serialize};

use crate::domain::indicator::atr::calculate_atr;
use crate::domain::ohlcv::{OhlcvBar, last_close};
use crate::domain::units::Dollars;

/// The sizing cap is held below the configured maximum position.
pub const CAP_CONSERVATISM: f64 = 0.8;
/// De-rating applied to both size and cap on an options-expiry day.
pub const CAUTION_DAY_SCALE: f64 = 0.85;
const SOFT_VIX_ADJUST: f64 = 0.7;
const SOFT_RVOL_ADJUST: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    pub risk_budget_pct: f64,
    pub atr_len: usize,
    pub max_position_pct: f64,
    pub vix_soft: f64,
    pub vix_hard: f64,
    pub realized_vol_20d_max: f64,
    pub realized_vol_soft: f64,
    pub trend_vix_max: f64,
    pub trend_vol_50d_max: f64,
    /// Event blackout window in days relative to the event (before, after).
    pub event_window: (i64, i64),
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            risk_budget_pct: 0.015,
            atr_len: 14,
            max_position_pct: 0.60,
            vix_soft: 25.0,
            vix_hard: 35.0,
            realized_vol_20d_max: 0.40,
            realized_vol_soft: 0.25,
            trend_vix_max: 30.0,
            trend_vol_50d_max: 0.40,
            event_window: (-1, 1),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskInputs {
    pub equity: Dollars,
    pub price: f64,
    pub vix: Option<f64>,
    /// 20-day realized vol of the signal underlier.
    pub realized_vol_20d: Option<f64>,
    pub is_event_window: bool,
    pub is_opex: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerDecision {
    pub blocked: bool,
    pub reason: String,
}

impl BreakerDecision {
    fn block(reason: String) -> Self {
        Self {
            blocked: true,
            reason,
        }
    }

    fn pass(reason: &str) -> Self {
        Self {
            blocked: false,
            reason: reason.to_string(),
        }
    }
}

/// Hard blocks first (VIX, realized vol, event blackout), then the
/// non-blocking expiry caution.
pub fn circuit_breakers(inputs: &RiskInputs, cfg: &RiskConfig) -> BreakerDecision {
    if inputs.vix.is_some_and(|v| v >= cfg.vix_hard) {
        return BreakerDecision::block(format!("VIX hard block (≥ {})", cfg.vix_hard));
    }

    if inputs
        .realized_vol_20d
        .is_some_and(|v| v > cfg.realized_vol_20d_max)
    {
        return BreakerDecision::block(format!(
            "Realized vol 20d block (> {:.2})",
            cfg.realized_vol_20d_max
        ));
    }

    if inputs.is_event_window {
        return BreakerDecision::block(format!(
            "Event blackout ({}, {})",
            cfg.event_window.0, cfg.event_window.1
        ));
    }

    if inputs.is_opex {
        return BreakerDecision::pass("OPEX caution (size scaling recommended)");
    }

    BreakerDecision::pass("OK")
}

/// The de-rating factor for current conditions. Sources combine by minimum.
pub fn regime_adjustment(inputs: &RiskInputs, cfg: &RiskConfig) -> f64 {
    let mut adjust: f64 = 1.0;
    if inputs.vix.is_some_and(|v| v > cfg.vix_soft) {
        adjust = SOFT_VIX_ADJUST;
    }
    if inputs
        .realized_vol_20d
        .is_some_and(|v| v > cfg.realized_vol_soft)
    {
        adjust = adjust.min(SOFT_RVOL_ADJUST);
    }
    if inputs.is_opex {
        adjust = adjust.min(CAUTION_DAY_SCALE);
    }
    adjust
}

/// Upper bound on any sized position for these inputs.
pub fn position_cap(inputs: &RiskInputs, cfg: &RiskConfig) -> Dollars {
    let cap = inputs.equity * (cfg.max_position_pct * CAP_CONSERVATISM);
    if inputs.is_opex {
        cap * CAUTION_DAY_SCALE
    } else {
        cap
    }
}

/// Target dollars = equity × budget × adjust / (ATR / price), capped.
///
/// `bars` is the series of the instrument being sized.
pub fn dynamic_position_size(
    inputs: &RiskInputs,
    bars: &[OhlcvBar],
    cfg: &RiskConfig,
) -> (Dollars, String) {
    let atr = calculate_atr(bars, cfg.atr_len).last_value();
    let base_vol = match (atr, last_close(bars)) {
        (Some(a), Some(c)) if c != 0.0 => a / c,
        _ => f64::NAN,
    };
    if !base_vol.is_finite() || base_vol <= 0.0 {
        return (Dollars::ZERO, "Invalid base_vol".into());
    }

    let adjust = regime_adjustment(inputs, cfg);
    let size = inputs.equity * (cfg.risk_budget_pct * adjust / base_vol);
    let cap = position_cap(inputs, cfg);
    let target = if size.value() < cap.value() { size } else { cap };

    (
        target,
        format!(
            "base_vol={:.4}, adj={:.2}, cap={:.2}",
            base_vol,
            adjust,
            cap.value()
        ),
    )
}
