//! Fill simulation and application of fills to the position book.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use crate::domain::instrument::normalize_symbol;
use crate::domain::order::{OrderIntent, OrderType, Side};
use crate::domain::position::PositionBook;
use crate::domain::units::Shares;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedFill {
    pub instrument: String,
    pub side: Side,
    pub quantity: Shares,
    pub fill_price: f64,
    pub note: String,
}

impl SimulatedFill {
    pub fn signed_quantity(&self) -> f64 {
        self.side.sign() * self.quantity.value()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillStatus {
    /// Produced by the local fill model, already reflected in saved positions.
    Simulated,
    Accepted,
    Filled,
    PartiallyFilled,
    Rejected,
    #[serde(other)]
    Other,
}

/// One line of the fill journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillRecord {
    pub ts: DateTime<Utc>,
    pub symbol: String,
    /// "buy" or "sell".
    pub side: String,
    pub qty: f64,
    pub status: FillStatus,
    pub filled_qty: Option<f64>,
    pub broker_id: Option<String>,
    /// Session the fill belongs to; set for simulated fills, whose `ts` is
    /// wall-clock time and may not match a back-dated run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<NaiveDate>,
}

impl FillRecord {
    pub fn simulated(fill: &SimulatedFill, ts: DateTime<Utc>, session: NaiveDate) -> Self {
        Self {
            ts,
            symbol: normalize_symbol(&fill.instrument),
            side: fill.side.as_lower().to_string(),
            qty: fill.quantity.value(),
            status: FillStatus::Simulated,
            filled_qty: Some(fill.quantity.value()),
            broker_id: None,
            session: Some(session),
        }
    }

    /// Trading day of the fill: the session if recorded, else the stamp's date.
    pub fn trade_date(&self) -> NaiveDate {
        self.session.unwrap_or_else(|| self.ts.date_naive())
    }

    /// Signed filled shares, if the fill quantity is known and the side parses.
    pub fn signed_filled(&self) -> Option<f64> {
        let q = self.filled_qty.filter(|q| q.is_finite())?;
        match self.side.trim().to_ascii_lowercase().as_str() {
            "buy" => Some(q),
            "sell" => Some(-q),
            _ => None,
        }
    }
}

/// Fill each intent at its instrument's last price, with price improvement
/// for limits: buys at min(limit, last), sells at max(limit, last).
pub fn simulate_fills(
    intents: &[OrderIntent],
    last_prices: &BTreeMap<String, f64>,
) -> Vec<SimulatedFill> {
    intents
        .iter()
        .map(|intent| {
            let last = last_prices
                .get(&normalize_symbol(&intent.instrument))
                .copied()
                .unwrap_or(f64::NAN);
            let (price, note) = match (intent.order_type, intent.limit_price) {
                (OrderType::Limit, Some(limit)) => {
                    let px = match intent.side {
                        Side::Buy => last.min(limit),
                        Side::Sell => last.max(limit),
                    };
                    (px, "limit simulated".to_string())
                }
                (OrderType::Limit, None) => (last, "limit without price → market fallback".into()),
                (other, _) => (last, format!("{} simulated", other)),
            };
            SimulatedFill {
                instrument: normalize_symbol(&intent.instrument),
                side: intent.side,
                quantity: intent.quantity,
                fill_price: price,
                note,
            }
        })
        .collect()
}

/// Net signed share delta per instrument (BUY positive, SELL negative).
pub fn fills_to_position_deltas(fills: &[SimulatedFill]) -> BTreeMap<String, f64> {
    let mut deltas = BTreeMap::new();
    for fill in fills {
        *deltas.entry(normalize_symbol(&fill.instrument)).or_insert(0.0) += fill.signed_quantity();
    }
    deltas
}

pub fn apply_fills(positions: &PositionBook, deltas: &BTreeMap<String, f64>) -> PositionBook {
    let mut out = positions.clone();
    for (sym, delta) in deltas {
        out.apply_delta(sym, *delta);
    }
    out
}

pub fn apply_simulated_fills(positions: &PositionBook, fills: &[SimulatedFill]) -> PositionBook {
    let deltas = fills_to_position_deltas(fills);
    info!("Applying fills → deltas {:?}", deltas);
    apply_fills(positions, &deltas)
}
