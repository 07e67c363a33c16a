//! Target exposure: combining the signal engines with the risk sizer, and
//! turning allocated pair weights into a single-instrument target.

use serde::{Deserialize, Serialize};

use crate::domain::instrument::{InstrumentConfig, Leg, PairWeights, normalize_symbol};
use crate::domain::ohlcv::{OhlcvBar, last_close};
use crate::domain::risk::{
    BreakerDecision, RiskConfig, RiskInputs, circuit_breakers, dynamic_position_size,
};
use crate::domain::signal::{
    DEFAULT_SLOW_WINDOW, DEFAULT_VOLUME_CONFIRM_MULT, DEFAULT_Z_WINDOW, Direction, MrSignal,
    RegimeState, TrendSignal, detect_regime, mr_signal, trend_signal,
};
use crate::domain::units::{Dollars, Shares};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetExposure {
    pub instrument: String,
    pub direction: Direction,
    pub notional: Dollars,
    /// sign(direction) × notional / price; zero when FLAT.
    pub signed_shares: Shares,
    pub notes: String,
}

impl TargetExposure {
    pub fn flat(instrument: &str, notes: impl Into<String>) -> Self {
        Self {
            instrument: normalize_symbol(instrument),
            direction: Direction::Flat,
            notional: Dollars::ZERO,
            signed_shares: Shares::ZERO,
            notes: notes.into(),
        }
    }

    pub fn sized(instrument: &str, direction: Direction, notional: Dollars, price: f64, notes: String) -> Self {
        if direction == Direction::Flat {
            return Self::flat(instrument, notes);
        }
        let shares = notional.to_shares(price);
        Self {
            instrument: normalize_symbol(instrument),
            direction,
            notional,
            signed_shares: shares * direction.sign(),
            notes,
        }
    }
}

/// Price series for the signal underlier and both legs of the pair.
#[derive(Debug, Clone, Copy)]
pub struct PairBars<'a> {
    pub underlier: &'a [OhlcvBar],
    pub long: &'a [OhlcvBar],
    pub inverse: &'a [OhlcvBar],
}

impl<'a> PairBars<'a> {
    pub fn leg(&self, leg: Leg) -> &'a [OhlcvBar] {
        match leg {
            Leg::Long => self.long,
            Leg::Inverse => self.inverse,
        }
    }
}

/// Per-cycle market conditions the target depends on besides prices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketContext {
    pub equity: Dollars,
    pub vix: Option<f64>,
    pub is_event_window: bool,
    pub is_opex: bool,
}

/// Everything the signal / risk stage concluded, kept for breadcrumbs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetAssessment {
    pub regime: RegimeState,
    pub trend: TrendSignal,
    pub mr: MrSignal,
    pub breaker: BreakerDecision,
    /// Risk-sized dollar limit for the active leg, independent of direction.
    pub size_limit: Dollars,
    pub size_note: String,
    pub target: TargetExposure,
}

/// Trend sets the core long bias; mean reversion may only add a short bias
/// when trend is not long.
pub fn combine_signals(
    trend_entry: bool,
    trend_exit: bool,
    mr_direction: Direction,
    mr_entry: bool,
) -> Direction {
    if trend_entry && !trend_exit {
        return Direction::Long;
    }
    if mr_entry && mr_direction == Direction::Short {
        return Direction::Short;
    }
    Direction::Flat
}

pub fn assess_target(
    bars: &PairBars<'_>,
    instruments: &InstrumentConfig,
    ctx: &MarketContext,
    cfg: &RiskConfig,
) -> TargetAssessment {
    let regime = detect_regime(bars.underlier, DEFAULT_SLOW_WINDOW).with_vix(ctx.vix);
    let trend = trend_signal(
        bars.underlier,
        &regime,
        cfg.trend_vix_max,
        cfg.trend_vol_50d_max,
    );

    let leg = if regime.bull { Leg::Long } else { Leg::Inverse };
    let active = bars.leg(leg);
    let symbol = instruments.symbol(leg);
    let mr = mr_signal(
        active,
        &regime,
        DEFAULT_Z_WINDOW,
        DEFAULT_VOLUME_CONFIRM_MULT,
    );

    let direction = combine_signals(trend.entry, trend.exit, mr.direction, mr.entry);

    let price = last_close(active).unwrap_or(0.0);
    let inputs = RiskInputs {
        equity: ctx.equity,
        price,
        vix: ctx.vix,
        realized_vol_20d: regime.realized_vol_20d,
        is_event_window: ctx.is_event_window,
        is_opex: ctx.is_opex,
    };
    let breaker = circuit_breakers(&inputs, cfg);
    let (size_limit, size_note) = if breaker.blocked {
        (Dollars::ZERO, format!("BLOCKED: {}", breaker.reason))
    } else {
        dynamic_position_size(&inputs, active, cfg)
    };

    let target = if breaker.blocked || direction == Direction::Flat {
        let head = if breaker.blocked {
            format!("BLOCKED: {}", breaker.reason)
        } else {
            "Direction FLAT".to_string()
        };
        TargetExposure::flat(
            symbol,
            format!(
                "{} | trend(entry={}, exit={}), mr({}, entry={})",
                head, trend.entry, trend.exit, mr.direction, mr.entry
            ),
        )
    } else {
        let dollars = size_limit;
        let note = &size_note;
        if dollars.value() <= 0.0 {
            TargetExposure::flat(symbol, format!("Zero size | {}", note))
        } else {
            let z = mr
                .z_score
                .map(|z| format!("{:.2}", z))
                .unwrap_or_else(|| "None".into());
            TargetExposure::sized(
                symbol,
                direction,
                dollars,
                price,
                format!(
                    "{} | regime={}; trend(entry={}, exit={}); mr(dir={}, entry={}, z={})",
                    note,
                    if regime.bull { "BULL" } else { "BEAR" },
                    trend.entry,
                    trend.exit,
                    mr.direction,
                    mr.entry,
                    z
                ),
            )
        }
    };

    TargetAssessment {
        regime,
        trend,
        mr,
        breaker,
        size_limit,
        size_note,
        target,
    }
}

/// Cap the gross allocation at the risk-sized dollar limit.
///
/// A blocked or zero-sized assessment zeroes both legs.
pub fn apply_risk_ceiling(
    weights: PairWeights,
    assessment: &TargetAssessment,
    equity: Dollars,
) -> (PairWeights, Option<String>) {
    if assessment.breaker.blocked {
        return (
            PairWeights::FLAT,
            Some(format!("BLOCKED: {}", assessment.breaker.reason)),
        );
    }
    let ceiling = assessment.size_limit.to_weight(equity).value();
    let gross = weights.gross().value();
    if gross > ceiling && gross > 0.0 {
        let scale = ceiling / gross;
        return (
            weights.scaled(scale),
            Some(format!("risk ceiling ×{:.3}", scale)),
        );
    }
    (weights, None)
}

/// The single-instrument target implied by pair weights: the larger leg wins;
/// equal weights mean FLAT on `fallback` (normally the currently held symbol).
pub fn target_from_weights(
    weights: &PairWeights,
    instruments: &InstrumentConfig,
    prices: (f64, f64),
    equity: Dollars,
    fallback: &str,
) -> TargetExposure {
    let notes = format!("Exposure allocator: {}", weights);
    let (long_px, inverse_px) = prices;
    if weights.long > weights.short {
        TargetExposure::sized(
            &instruments.long,
            Direction::Long,
            weights.long.to_dollars(equity),
            long_px,
            notes,
        )
    } else if weights.short > weights.long {
        TargetExposure::sized(
            &instruments.inverse,
            Direction::Short,
            weights.short.to_dollars(equity),
            inverse_px,
            notes,
        )
    } else {
        TargetExposure::flat(fallback, notes)
    }
}
