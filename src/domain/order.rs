//! Order intents and the order planner.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::domain::instrument::{InstrumentConfig, normalize_symbol};
use crate::domain::position::{NEGLIGIBLE_SHARES, PositionBook};
use crate::domain::signal::Direction;
use crate::domain::target::TargetExposure;
use crate::domain::units::Shares;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn sign(self) -> f64 {
        match self {
            Side::Buy => 1.0,
            Side::Sell => -1.0,
        }
    }

    pub fn as_lower(self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Limit,
    Market,
    #[serde(rename = "moc")]
    MarketOnClose,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::Limit => write!(f, "limit"),
            OrderType::Market => write!(f, "market"),
            OrderType::MarketOnClose => write!(f, "moc"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeInForce {
    Day,
    /// At the closing auction.
    Cls,
}

impl fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeInForce::Day => write!(f, "day"),
            TimeInForce::Cls => write!(f, "cls"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub instrument: String,
    pub side: Side,
    /// Always positive.
    pub quantity: Shares,
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
    pub limit_price: Option<f64>,
    pub reason: String,
}

impl OrderIntent {
    pub fn notional(&self, price: f64) -> f64 {
        self.quantity.value() * price
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerConfig {
    pub min_trade_value: f64,
    pub moc_window_minutes: i64,
    pub limit_offset_pct: f64,
    pub close_dust_shares: f64,
    pub min_open_notional: f64,
    pub prefer_single_leg: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            min_trade_value: 200.0,
            moc_window_minutes: 30,
            limit_offset_pct: 0.005,
            close_dust_shares: 1.0,
            min_open_notional: 200.0,
            prefer_single_leg: true,
        }
    }
}

/// Broker quantity constraints for opening trades.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeConstraints {
    pub lot_size: u32,
    pub min_qty: f64,
    pub qty_precision: u32,
    pub min_notional: f64,
}

impl Default for SizeConstraints {
    fn default() -> Self {
        Self {
            lot_size: 1,
            min_qty: 1.0,
            qty_precision: 0,
            min_notional: 200.0,
        }
    }
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Order type, time in force and limit price for a trade placed now.
///
/// Inside the closing window the order goes to the auction; otherwise it is
/// a limit anchored `limit_offset_pct` through the price (market during an
/// emergency override).
pub fn order_style(
    side: Side,
    price: f64,
    minutes_to_close: i64,
    emergency_override: bool,
    cfg: &PlannerConfig,
) -> (OrderType, TimeInForce, Option<f64>) {
    if minutes_to_close <= cfg.moc_window_minutes {
        return (OrderType::MarketOnClose, TimeInForce::Cls, None);
    }
    let order_type = if emergency_override {
        OrderType::Market
    } else {
        OrderType::Limit
    };
    let limit = match side {
        Side::Buy => round_to(price * (1.0 - cfg.limit_offset_pct), 2),
        Side::Sell => round_to(price * (1.0 + cfg.limit_offset_pct), 2),
    };
    (order_type, TimeInForce::Day, Some(limit))
}

/// Convert a target exposure into zero or one order intent.
///
/// Returns an empty plan when a different instrument is currently held
/// (flips go through the coalescer) or when the trade is below
/// `min_trade_value`.
pub fn plan_orders(
    positions: &PositionBook,
    target: &TargetExposure,
    price: f64,
    minutes_to_close: i64,
    emergency_override: bool,
    instruments: &InstrumentConfig,
    cfg: &PlannerConfig,
) -> Vec<OrderIntent> {
    let sym = normalize_symbol(&target.instrument);

    if !price.is_finite() || price <= 0.0 {
        return Vec::new();
    }
    if positions.held_symbol().is_some_and(|held| held != sym) {
        return Vec::new();
    }

    let current = positions.get(&sym).value();
    let mut desired = if instruments.is_inverse(&sym) {
        target.signed_shares.value().abs()
    } else {
        target.signed_shares.value()
    };
    if target.direction == Direction::Flat {
        desired = 0.0;
    }
    let delta = desired - current;

    if delta.abs() < NEGLIGIBLE_SHARES || delta.abs() * price < cfg.min_trade_value {
        return Vec::new();
    }

    let side = if delta > 0.0 { Side::Buy } else { Side::Sell };
    let (order_type, time_in_force, limit_price) =
        order_style(side, price, minutes_to_close, emergency_override, cfg);

    vec![OrderIntent {
        instrument: sym,
        side,
        quantity: Shares(delta.abs()),
        order_type,
        time_in_force,
        limit_price,
        reason: format!(
            "plan_orders: curr={:.2}, desired={:.2}, delta={:.2}",
            current, desired, delta
        ),
    }]
}

/// Snap a desired quantity to broker constraints.
///
/// Returns the adjusted quantity (0 when the order should be dropped) and a
/// note: `"OK"`, `"rounded a→b"`, `"no price"`, `"below min_qty"` or
/// `"below min_notional"`.
pub fn sanitize_quantity(desired: f64, price: f64, cons: &SizeConstraints) -> (f64, String) {
    if !price.is_finite() || price <= 0.0 {
        return (0.0, "no price".into());
    }
    let q = desired.max(0.0);
    let snapped = if cons.lot_size > 1 {
        let lot = cons.lot_size as f64;
        (q / lot).floor() * lot
    } else {
        q
    };
    let rounded = if cons.qty_precision > 0 {
        let factor = 10f64.powi(cons.qty_precision as i32);
        (snapped * factor + 1e-9).floor() / factor
    } else {
        (snapped + 1e-9).floor()
    };

    if rounded < cons.min_qty {
        return (0.0, "below min_qty".into());
    }
    if rounded * price < cons.min_notional {
        return (0.0, "below min_notional".into());
    }
    if (rounded - q).abs() > 1e-9 {
        return (rounded, format!("rounded {:.4}→{:.4}", q, rounded));
    }
    (rounded, "OK".into())
}

/// Apply [`sanitize_quantity`] to every intent except full closes, which
/// always go out at the held quantity. Intents sanitized to zero or without a
/// usable price are dropped.
/// Returns the kept intents and one note per adjusted or dropped intent.
pub fn sanitize_intents(
    intents: Vec<OrderIntent>,
    positions: &PositionBook,
    prices: &BTreeMap<String, f64>,
    cons: &SizeConstraints,
) -> (Vec<OrderIntent>, Vec<String>) {
    let mut notes = Vec::new();
    let mut kept = Vec::with_capacity(intents.len());
    for mut intent in intents {
        let held = positions.get(&intent.instrument).value();
        let full_close = intent.side == Side::Sell
            && held > 0.0
            && (intent.quantity.value() - held).abs() < NEGLIGIBLE_SHARES;
        if full_close {
            kept.push(intent);
            continue;
        }
        let price = match prices.get(&normalize_symbol(&intent.instrument)) {
            Some(&px) if px.is_finite() && px > 0.0 => px,
            _ => {
                notes.push(format!("{} {}: no price", intent.side, intent.instrument));
                continue;
            }
        };
        let (qty, note) = sanitize_quantity(intent.quantity.value(), price, cons);
        if note != "OK" {
            notes.push(format!("{} {}: {}", intent.side, intent.instrument, note));
        }
        if qty > 0.0 {
            intent.quantity = Shares(qty);
            kept.push(intent);
        }
    }
    (kept, notes)
}
