//! Position and order reconciliation.
//!
//! The effective position baseline comes from (in priority order) a broker
//! snapshot, the stored book plus journal fills it has not seen yet, or the
//! stored book alone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::info;

use crate::domain::broker::OrderPayload;
use crate::domain::execution::{FillRecord, FillStatus};
use crate::domain::instrument::normalize_symbol;
use crate::domain::order::OrderIntent;
use crate::domain::position::PositionBook;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionsSource {
    BrokerSnapshot,
    LocalFillsApplied,
    Raw,
}

impl fmt::Display for PositionsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionsSource::BrokerSnapshot => write!(f, "broker_snapshot"),
            PositionsSource::LocalFillsApplied => write!(f, "local_fills_applied"),
            PositionsSource::Raw => write!(f, "raw"),
        }
    }
}

/// Journal fills not yet reflected in the stored book: broker-reported (not
/// simulated), with a known filled quantity, newer than the last save.
fn unapplied<'a>(
    journal: &'a [FillRecord],
    last_saved_at: Option<DateTime<Utc>>,
) -> Vec<&'a FillRecord> {
    let mut pending: Vec<&FillRecord> = journal
        .iter()
        .filter(|r| r.status != FillStatus::Simulated)
        .filter(|r| last_saved_at.is_none_or(|saved| r.ts > saved))
        .filter(|r| r.signed_filled().is_some())
        .collect();
    pending.sort_by_key(|r| r.ts);
    pending
}

pub fn effective_positions_before(
    raw: &PositionBook,
    broker_snapshot: Option<&PositionBook>,
    journal: &[FillRecord],
    last_saved_at: Option<DateTime<Utc>>,
) -> (PositionBook, PositionsSource) {
    if let Some(snapshot) = broker_snapshot.filter(|s| !s.is_empty()) {
        info!("Positions source: broker snapshot");
        return (snapshot.clone(), PositionsSource::BrokerSnapshot);
    }

    let pending = unapplied(journal, last_saved_at);
    if pending.is_empty() {
        info!("Positions source: raw (no fills applied)");
        return (raw.clone(), PositionsSource::Raw);
    }

    let mut eff = raw.clone();
    for rec in &pending {
        if let Some(delta) = rec.signed_filled() {
            eff.apply_delta(&rec.symbol, delta);
        }
    }
    info!("Applied {} fill adjustments from local state.", pending.len());
    (eff, PositionsSource::LocalFillsApplied)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct MatchKey {
    symbol: String,
    side: String,
    /// Quantity in millionths of a share.
    qty_micros: i64,
    tif: String,
}

impl MatchKey {
    fn new(symbol: &str, side: &str, qty: f64, tif: &str) -> Self {
        Self {
            symbol: normalize_symbol(symbol),
            side: side.trim().to_ascii_lowercase(),
            qty_micros: (qty * 1e6).round() as i64,
            tif: tif.trim().to_ascii_lowercase(),
        }
    }

    fn of_intent(it: &OrderIntent) -> Self {
        Self::new(
            &it.instrument,
            it.side.as_lower(),
            it.quantity.value(),
            &it.time_in_force.to_string(),
        )
    }

    fn of_payload(p: &OrderPayload) -> Self {
        Self::new(&p.symbol, &p.side, p.qty, &p.time_in_force)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IntentReconciliation {
    pub matches: Vec<(OrderIntent, OrderPayload)>,
    pub mismatches: Vec<OrderPayload>,
    pub unmatched_intents: Vec<OrderIntent>,
}

/// Match intents to broker orders by (symbol, side, qty to 1e-6, time in force).
pub fn compare_intents_vs_orders(
    intents: &[OrderIntent],
    orders: &[OrderPayload],
) -> IntentReconciliation {
    let by_key: BTreeMap<MatchKey, &OrderIntent> =
        intents.iter().map(|it| (MatchKey::of_intent(it), it)).collect();

    let mut out = IntentReconciliation::default();
    for order in orders {
        match by_key.get(&MatchKey::of_payload(order)) {
            Some(it) => out.matches.push(((*it).clone(), order.clone())),
            None => out.mismatches.push(order.clone()),
        }
    }

    let order_keys: Vec<MatchKey> = orders.iter().map(MatchKey::of_payload).collect();
    out.unmatched_intents = by_key
        .into_iter()
        .filter(|(k, _)| !order_keys.contains(k))
        .map(|(_, it)| it.clone())
        .collect();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use crate::domain::order::{OrderType, Side, TimeInForce};
    use crate::domain::units::Shares;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn fill(sym: &str, side: &str, qty: Option<f64>, status: FillStatus, at: &str) -> FillRecord {
        FillRecord {
            ts: ts(at),
            symbol: sym.into(),
            side: side.into(),
            qty: qty.unwrap_or(0.0),
            status,
            filled_qty: qty,
            broker_id: None,
            session: None,
        }
    }

    #[test]
    fn broker_snapshot_wins() {
        let raw = PositionBook::from_map([("QQQ", 10.0)]);
        let snap = PositionBook::from_map([("qqq", 12.0)]);
        let journal = vec![fill("QQQ", "buy", Some(5.0), FillStatus::Filled, "2025-10-10T20:00:00Z")];
        let (eff, src) = effective_positions_before(&raw, Some(&snap), &journal, None);
        assert_eq!(src, PositionsSource::BrokerSnapshot);
        assert_eq!(eff.get("QQQ").value(), 12.0);
    }

    #[test]
    fn empty_snapshot_is_ignored() {
        let raw = PositionBook::from_map([("QQQ", 10.0)]);
        let (eff, src) = effective_positions_before(&raw, Some(&PositionBook::new()), &[], None);
        assert_eq!(src, PositionsSource::Raw);
        assert_eq!(eff, raw);
    }

    #[test]
    fn newer_broker_fills_applied() {
        let raw = PositionBook::from_map([("QQQ", 10.0)]);
        let journal = vec![
            fill("QQQ", "buy", Some(5.0), FillStatus::Filled, "2025-10-10T20:00:00Z"),
            fill("qqq", "sell", Some(2.0), FillStatus::PartiallyFilled, "2025-10-10T20:05:00Z"),
            // already in the stored book
            fill("QQQ", "buy", Some(100.0), FillStatus::Filled, "2025-10-09T20:00:00Z"),
            // local simulation, already saved
            fill("QQQ", "buy", Some(7.0), FillStatus::Simulated, "2025-10-10T21:00:00Z"),
            // unknown fill quantity
            fill("QQQ", "buy", None, FillStatus::Accepted, "2025-10-10T21:00:00Z"),
        ];
        let saved = Some(ts("2025-10-10T00:00:00Z"));
        let (eff, src) = effective_positions_before(&raw, None, &journal, saved);
        assert_eq!(src, PositionsSource::LocalFillsApplied);
        assert_abs_diff_eq!(eff.get("QQQ").value(), 13.0, epsilon = 1e-12);
        assert_eq!(src.to_string(), "local_fills_applied");
    }

    #[test]
    fn nothing_pending_is_raw() {
        let raw = PositionBook::from_map([("PSQ", 100.0)]);
        let journal = vec![fill("PSQ", "buy", Some(100.0), FillStatus::Simulated, "2025-10-10T20:00:00Z")];
        let (eff, src) = effective_positions_before(&raw, None, &journal, None);
        assert_eq!(src, PositionsSource::Raw);
        assert_eq!(eff, raw);
    }

    fn intent(sym: &str, side: Side, qty: f64, tif: TimeInForce) -> OrderIntent {
        OrderIntent {
            instrument: sym.into(),
            side,
            quantity: Shares(qty),
            order_type: if tif == TimeInForce::Cls {
                OrderType::MarketOnClose
            } else {
                OrderType::Limit
            },
            time_in_force: tif,
            limit_price: None,
            reason: String::new(),
        }
    }

    #[test]
    fn intents_match_their_payloads() {
        let intents = vec![
            intent("QQQ", Side::Buy, 30.0, TimeInForce::Cls),
            intent("PSQ", Side::Sell, 100.0, TimeInForce::Day),
        ];
        let payloads: Vec<OrderPayload> = intents.iter().map(OrderPayload::from_intent).collect();
        let rec = compare_intents_vs_orders(&intents, &payloads);
        assert_eq!(rec.matches.len(), 2);
        assert!(rec.mismatches.is_empty());
        assert!(rec.unmatched_intents.is_empty());
    }

    #[test]
    fn mismatched_quantity_reported_both_ways() {
        let intents = vec![intent("QQQ", Side::Buy, 30.0, TimeInForce::Cls)];
        let mut payload = OrderPayload::from_intent(&intents[0]);
        payload.qty = 29.0;
        let rec = compare_intents_vs_orders(&intents, &[payload]);
        assert!(rec.matches.is_empty());
        assert_eq!(rec.mismatches.len(), 1);
        assert_eq!(rec.unmatched_intents.len(), 1);
    }
}
