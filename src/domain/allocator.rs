//! Exposure allocator: trend, extension, band momentum and a realized-vol
//! dampener mapped onto long / inverse weights.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use crate::domain::indicator::bollinger::calculate_bollinger;
use crate::domain::indicator::realized_vol::trailing_realized_vol;
use crate::domain::indicator::sma::calculate_sma;
use crate::domain::instrument::PairWeights;
use crate::domain::ohlcv::{OhlcvBar, last_close};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocatorConfig {
    pub fast_ma: usize,
    pub slow_ma: usize,
    pub extension_factor: f64,
    pub bb_period: usize,
    pub bb_std: f64,
    pub base_risk: f64,
    pub max_exposure: f64,
    pub min_exposure: f64,
    pub momentum_boost: f64,
    pub momentum_requires_close_above_fast: bool,
    pub momentum_requires_slope_up: bool,
    pub vol_dampener: bool,
    pub vol_lookback: usize,
    pub vol_cap: f64,
    pub vol_floor_scale: f64,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            fast_ma: 20,
            slow_ma: 200,
            extension_factor: 2.0,
            bb_period: 20,
            bb_std: 2.0,
            base_risk: 0.85,
            max_exposure: 1.0,
            min_exposure: 0.0,
            momentum_boost: 1.30,
            momentum_requires_close_above_fast: true,
            momentum_requires_slope_up: true,
            vol_dampener: true,
            vol_lookback: 20,
            vol_cap: 0.25,
            vol_floor_scale: 0.60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MarketPhase {
    Momentum,
    Accumulate,
    MeanRevert,
}

impl fmt::Display for MarketPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketPhase::Momentum => write!(f, "MOMENTUM"),
            MarketPhase::Accumulate => write!(f, "ACCUMULATE"),
            MarketPhase::MeanRevert => write!(f, "MEANREVERT"),
        }
    }
}

/// Read-only explanation of the allocator's inputs for one series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureDiagnostics {
    /// close / slow SMA − 1 (0 when the slow SMA is undefined).
    pub extension: f64,
    pub downtrend: bool,
    pub momentum: bool,
    pub realized_vol: f64,
    pub vol_cap: f64,
    pub vol_scale: f64,
    pub fast_ma: usize,
    pub slow_ma: usize,
}

struct Snapshot {
    close: f64,
    fast: Option<f64>,
    fast_prev: Option<f64>,
    slow: Option<f64>,
    upper: Option<f64>,
}

impl Snapshot {
    fn take(bars: &[OhlcvBar], cfg: &AllocatorConfig) -> Self {
        let fast_series = calculate_sma(bars, cfg.fast_ma);
        let fast_prev = bars
            .len()
            .checked_sub(2)
            .and_then(|i| fast_series.value_at(i));
        let stddev_mult_x100 = (cfg.bb_std * 100.0).round() as u32;
        let upper = calculate_bollinger(bars, cfg.bb_period, stddev_mult_x100)
            .last_bands()
            .map(|(u, _, _)| u);

        Self {
            close: last_close(bars).unwrap_or(f64::NAN),
            fast: fast_series.last_value(),
            fast_prev,
            slow: calculate_sma(bars, cfg.slow_ma).last_value(),
            upper,
        }
    }

    fn downtrend(&self) -> bool {
        matches!((self.fast, self.slow), (Some(f), Some(s)) if f < s)
    }

    fn extension(&self) -> f64 {
        match self.slow {
            Some(s) if s > 0.0 => self.close / s - 1.0,
            _ => 0.0,
        }
    }

    fn above_upper(&self) -> bool {
        self.upper.is_some_and(|u| self.close > u)
    }

    fn above_fast(&self) -> bool {
        self.fast.is_some_and(|f| self.close > f)
    }

    /// `None` when the slope cannot be measured.
    fn slope_up(&self) -> Option<bool> {
        match (self.fast, self.fast_prev) {
            (Some(now), Some(prev)) => Some(now > prev),
            _ => None,
        }
    }

    fn momentum(&self, cfg: &AllocatorConfig) -> bool {
        let mut momentum = self.above_upper();
        if cfg.momentum_requires_close_above_fast {
            momentum = momentum && self.above_fast();
        }
        if cfg.momentum_requires_slope_up {
            momentum = momentum && self.slope_up() != Some(false);
        }
        momentum
    }
}

/// Linear scale-down from 1.0 at the cap to the floor at twice the cap.
pub fn vol_dampener_scale(realized_vol: f64, cap: f64, floor: f64) -> f64 {
    if realized_vol <= cap {
        return 1.0;
    }
    let x = (realized_vol / cap.max(1e-9)).min(2.0);
    floor.max(2.0 - x)
}

pub fn exposure_allocator(bars: &[OhlcvBar], cfg: &AllocatorConfig) -> PairWeights {
    let snap = Snapshot::take(bars, cfg);
    let downtrend = snap.downtrend();
    let extension = snap.extension();
    let momentum = snap.momentum(cfg);

    let base = cfg.base_risk.min(cfg.max_exposure).max(0.0);
    let mut weight = base * (-cfg.extension_factor * extension.abs()).exp();

    if cfg.vol_dampener {
        let rvol = trailing_realized_vol(bars, cfg.vol_lookback);
        if rvol > cfg.vol_cap {
            let scale = vol_dampener_scale(rvol, cfg.vol_cap, cfg.vol_floor_scale);
            weight *= scale;
            info!(
                "Vol dampener active: rVol{}={:.2}% scale={:.2}",
                cfg.vol_lookback,
                rvol * 100.0,
                scale
            );
        }
    }

    if !downtrend && momentum {
        weight = (weight * cfg.momentum_boost).min(cfg.max_exposure);
    }

    let weight = weight.max(cfg.min_exposure).min(cfg.max_exposure);
    debug!(
        "Allocator: ext={:+.4} downtrend={} momentum={} weight={:.4}",
        extension, downtrend, momentum, weight
    );

    if downtrend {
        PairWeights::new(0.0, weight)
    } else {
        PairWeights::new(weight, 0.0)
    }
}

pub fn classify_phase(bars: &[OhlcvBar], cfg: &AllocatorConfig) -> MarketPhase {
    let snap = Snapshot::take(bars, cfg);
    if snap.above_upper() && snap.above_fast() && snap.slope_up() == Some(true) {
        return MarketPhase::Momentum;
    }
    match snap.fast {
        Some(f) if snap.close >= f => MarketPhase::Accumulate,
        _ => MarketPhase::MeanRevert,
    }
}

pub fn exposure_diagnostics(bars: &[OhlcvBar], cfg: &AllocatorConfig) -> ExposureDiagnostics {
    let snap = Snapshot::take(bars, cfg);
    // Diagnostics always apply both confirmations.
    let momentum = snap.above_upper() && snap.above_fast() && snap.slope_up() != Some(false);
    let realized_vol = trailing_realized_vol(bars, cfg.vol_lookback);

    ExposureDiagnostics {
        extension: snap.extension(),
        downtrend: snap.downtrend(),
        momentum,
        realized_vol,
        vol_cap: cfg.vol_cap,
        vol_scale: vol_dampener_scale(realized_vol, cfg.vol_cap, cfg.vol_floor_scale),
        fast_ma: cfg.fast_ma,
        slow_ma: cfg.slow_ma,
    }
}

/// One-line summary, e.g.
/// `ext=+6.8% mom=True rVol20=27.3% x0.74 phase=MOMENTUM caps=gross×0.769`
pub fn format_plan_reason(diag: &ExposureDiagnostics, phase: MarketPhase, guard_note: &str) -> String {
    let caps = if guard_note.is_empty() || guard_note == "OK" {
        "OK".to_string()
    } else {
        guard_note.replace("gross scaled×", "gross×")
    };
    format!(
        "ext={:+.1}% mom={} rVol{}={:.1}% x{:.2} phase={} caps={}",
        diag.extension * 100.0,
        if diag.momentum { "True" } else { "False" },
        diag.fast_ma,
        diag.realized_vol * 100.0,
        diag.vol_scale,
        phase,
        caps
    )
}
