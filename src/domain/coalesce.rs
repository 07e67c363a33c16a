//! Side-flip coalescing: closing one leg of the pair and opening the other
//! in the same cycle, as at most two orders.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::instrument::{InstrumentConfig, Leg, PairPrices, PairShares, PairWeights};
use crate::domain::order::{OrderIntent, PlannerConfig, Side, order_style};
use crate::domain::units::{Dollars, Shares};

const WEIGHT_EPS: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlipKind {
    FlipToLong,
    FlipToShort,
    /// Both legs moved toward their own targets; see [`rebalance_pair_legs`].
    PairRebalance,
    NoFlip,
}

impl fmt::Display for FlipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlipKind::FlipToLong => write!(f, "flip_to_long"),
            FlipKind::FlipToShort => write!(f, "flip_to_short"),
            FlipKind::PairRebalance => write!(f, "pair_rebalance"),
            FlipKind::NoFlip => write!(f, "no_flip"),
        }
    }
}

/// One side of a coalesced flip, before order type / TIF are chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlipLeg {
    pub instrument: String,
    pub side: Side,
    pub quantity: Shares,
    pub reason: String,
}

fn round6(x: f64) -> f64 {
    (x * 1e6).round() / 1e6
}

fn target_shares(weight: f64, equity: Dollars, price: f64) -> f64 {
    if price > 0.0 {
        equity.value() * weight / price
    } else {
        0.0
    }
}

/// Detect a flip and build the close / open legs.
///
/// A flip is: holding `from`, targeting a positive `to` weight, with the
/// `from` weight at zero. The open leg buys only what `to` still lacks. The close leg is dropped below the dust floor,
/// the open leg below the notional floor; with `prefer_single_leg`, when
/// both survive but one is under the notional floor, only the larger
/// notional is kept (ties keep the close).
pub fn coalesce_side_flip(
    positions: &PairShares,
    target: &PairWeights,
    prices: &PairPrices,
    equity: Dollars,
    instruments: &InstrumentConfig,
    cfg: &PlannerConfig,
) -> (Vec<FlipLeg>, FlipKind) {
    let tgt_long = target_shares(target.long.value(), equity, prices.long);
    let tgt_short = target_shares(target.short.value(), equity, prices.short);

    let flip_to_long =
        positions.short.value() > 0.0 && tgt_long > 0.0 && target.short.value() <= WEIGHT_EPS;
    let flip_to_short =
        positions.long.value() > 0.0 && tgt_short > 0.0 && target.long.value() <= WEIGHT_EPS;

    let (from, to, kind, open_target) = if flip_to_long {
        (Leg::Inverse, Leg::Long, FlipKind::FlipToLong, tgt_long)
    } else if flip_to_short {
        (Leg::Long, Leg::Inverse, FlipKind::FlipToShort, tgt_short)
    } else {
        return (Vec::new(), FlipKind::NoFlip);
    };

    let from_px = prices.get(from);
    let to_px = prices.get(to);
    let mut close_qty = positions.get(from).value();
    let mut open_qty = (open_target - positions.get(to).value()).max(0.0);

    if close_qty < cfg.close_dust_shares {
        close_qty = 0.0;
    }
    if open_qty * to_px < cfg.min_open_notional {
        open_qty = 0.0;
    }
    if cfg.prefer_single_leg && close_qty > 0.0 && open_qty > 0.0 {
        let close_notional = close_qty * from_px;
        let open_notional = open_qty * to_px;
        if close_notional.min(open_notional) < cfg.min_open_notional {
            if close_notional >= open_notional {
                open_qty = 0.0;
            } else {
                close_qty = 0.0;
            }
        }
    }

    let mut legs = Vec::with_capacity(2);
    if close_qty > 0.0 {
        legs.push(FlipLeg {
            instrument: instruments.symbol(from).to_ascii_uppercase(),
            side: Side::Sell,
            quantity: Shares(round6(close_qty)),
            reason: "coalesce: close_old_side".into(),
        });
    }
    if open_qty > 0.0 {
        legs.push(FlipLeg {
            instrument: instruments.symbol(to).to_ascii_uppercase(),
            side: Side::Buy,
            quantity: Shares(round6(open_qty)),
            reason: "coalesce: open_new_side".into(),
        });
    }
    (legs, kind)
}

/// Move each leg toward its own target shares.
///
/// Used when the book holds a leg other than the target instrument but the
/// weights are not a clean flip, e.g. a turnover clamp left weight on both
/// sides. Legs under `min_trade_value` are dropped; sells come first.
pub fn rebalance_pair_legs(
    positions: &PairShares,
    target: &PairWeights,
    prices: &PairPrices,
    equity: Dollars,
    instruments: &InstrumentConfig,
    cfg: &PlannerConfig,
) -> Vec<FlipLeg> {
    let mut sells = Vec::new();
    let mut buys = Vec::new();
    for leg in [Leg::Long, Leg::Inverse] {
        let px = prices.get(leg);
        if !px.is_finite() || px <= 0.0 {
            continue;
        }
        let current = positions.get(leg).value();
        let desired = target_shares(target.get(leg).value().max(0.0), equity, px);
        let delta = desired - current;
        if delta.abs() * px < cfg.min_trade_value {
            continue;
        }
        let side = if delta > 0.0 { Side::Buy } else { Side::Sell };
        let out = FlipLeg {
            instrument: instruments.symbol(leg).to_ascii_uppercase(),
            side,
            quantity: Shares(round6(delta.abs())),
            reason: format!(
                "rebalance: curr={:.2}, desired={:.2}, delta={:.2}",
                current, desired, delta
            ),
        };
        match side {
            Side::Sell => sells.push(out),
            Side::Buy => buys.push(out),
        }
    }
    sells.extend(buys);
    sells
}

/// Attach order type, TIF and limit price to coalesced legs.
pub fn legs_to_intents(
    legs: Vec<FlipLeg>,
    prices: &PairPrices,
    instruments: &InstrumentConfig,
    minutes_to_close: i64,
    emergency_override: bool,
    cfg: &PlannerConfig,
) -> Vec<OrderIntent> {
    legs.into_iter()
        .map(|leg| {
            let price = instruments
                .leg_of(&leg.instrument)
                .map(|l| prices.get(l))
                .unwrap_or(f64::NAN);
            let (order_type, time_in_force, limit_price) =
                order_style(leg.side, price, minutes_to_close, emergency_override, cfg);
            OrderIntent {
                instrument: leg.instrument,
                side: leg.side,
                quantity: leg.quantity,
                order_type,
                time_in_force,
                limit_price,
                reason: leg.reason,
            }
        })
        .collect()
}
