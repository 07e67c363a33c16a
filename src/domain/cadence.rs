//! Trade cadence and minimum exposure-change gates.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

use crate::domain::execution::FillRecord;
use crate::domain::instrument::{PairWeights, normalize_symbol};
use crate::domain::order::OrderIntent;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CadenceConfig {
    /// Calendar days that must pass before an instrument trades again; 0 disables.
    pub min_days_between_trades: i64,
    /// Largest per-side weight change below which the whole plan is dropped; 0 disables.
    pub min_exposure_delta: f64,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            min_days_between_trades: 0,
            min_exposure_delta: 0.0,
        }
    }
}

/// Most recent fill date per symbol, counting only records with `filled_qty > 0`.
pub fn last_trade_dates(records: &[FillRecord]) -> BTreeMap<String, NaiveDate> {
    let mut out: BTreeMap<String, NaiveDate> = BTreeMap::new();
    for rec in records {
        if !rec.filled_qty.is_some_and(|q| q > 0.0) {
            continue;
        }
        let day = rec.trade_date();
        out.entry(normalize_symbol(&rec.symbol))
            .and_modify(|d| {
                if day > *d {
                    *d = day;
                }
            })
            .or_insert(day);
    }
    out
}

pub fn days_since_trade(
    last: &BTreeMap<String, NaiveDate>,
    symbol: &str,
    today: NaiveDate,
) -> Option<i64> {
    last.get(&normalize_symbol(symbol))
        .map(|d| (today - *d).num_days())
}

/// Drop intents for instruments traded fewer than `min_days_between_trades`
/// days ago. Returns the kept intents and the blocked symbols.
pub fn apply_cadence_filter(
    intents: Vec<OrderIntent>,
    last: &BTreeMap<String, NaiveDate>,
    today: NaiveDate,
    cfg: &CadenceConfig,
) -> (Vec<OrderIntent>, BTreeSet<String>) {
    let mut blocked = BTreeSet::new();
    if cfg.min_days_between_trades <= 0 {
        return (intents, blocked);
    }
    let kept = intents
        .into_iter()
        .filter(|it| {
            let days = days_since_trade(last, &it.instrument, today);
            let too_soon = days.is_some_and(|d| d < cfg.min_days_between_trades);
            if too_soon {
                info!(
                    "Cadence guard: {} traded {}d ago (< {}d) → skip",
                    it.instrument,
                    days.unwrap_or_default(),
                    cfg.min_days_between_trades
                );
                blocked.insert(normalize_symbol(&it.instrument));
            }
            !too_soon
        })
        .collect();
    (kept, blocked)
}

/// Whether the exposure change is large enough to act on.
pub fn passes_exposure_threshold(delta: &PairWeights, cfg: &CadenceConfig) -> bool {
    cfg.min_exposure_delta <= 0.0 || delta.max_abs().value() >= cfg.min_exposure_delta
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::execution::FillStatus;
    use crate::domain::order::{OrderType, Side, TimeInForce};
    use crate::domain::units::Shares;
    use chrono::{DateTime, Utc};

    fn rec(symbol: &str, ts: &str, filled: Option<f64>) -> FillRecord {
        FillRecord {
            ts: DateTime::parse_from_rfc3339(ts).unwrap().with_timezone(&Utc),
            symbol: symbol.into(),
            side: "buy".into(),
            qty: 10.0,
            status: FillStatus::Filled,
            filled_qty: filled,
            broker_id: None,
            session: None,
        }
    }

    fn intent(sym: &str) -> OrderIntent {
        OrderIntent {
            instrument: sym.into(),
            side: Side::Buy,
            quantity: Shares(10.0),
            order_type: OrderType::MarketOnClose,
            time_in_force: TimeInForce::Cls,
            limit_price: None,
            reason: String::new(),
        }
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn keeps_latest_filled_date() {
        let records = vec![
            rec("qqq", "2025-10-01T20:00:00Z", Some(5.0)),
            rec("QQQ", "2025-10-08T20:00:00Z", Some(5.0)),
            rec("QQQ", "2025-10-03T20:00:00Z", Some(5.0)),
            rec("PSQ", "2025-10-09T20:00:00Z", None),
            rec("PSQ", "2025-10-09T20:00:00Z", Some(0.0)),
        ];
        let last = last_trade_dates(&records);
        assert_eq!(last.get("QQQ"), Some(&d("2025-10-08")));
        assert!(!last.contains_key("PSQ"));
        assert_eq!(days_since_trade(&last, "qqq", d("2025-10-10")), Some(2));
        assert_eq!(days_since_trade(&last, "PSQ", d("2025-10-10")), None);
    }

    #[test]
    fn cadence_blocks_recent_symbols() {
        let last = last_trade_dates(&[rec("QQQ", "2025-10-08T20:00:00Z", Some(5.0))]);
        let cfg = CadenceConfig {
            min_days_between_trades: 3,
            ..CadenceConfig::default()
        };
        let (kept, blocked) =
            apply_cadence_filter(vec![intent("QQQ"), intent("PSQ")], &last, d("2025-10-10"), &cfg);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].instrument, "PSQ");
        assert!(blocked.contains("QQQ"));

        let (kept, blocked) =
            apply_cadence_filter(vec![intent("QQQ")], &last, d("2025-10-11"), &cfg);
        assert_eq!(kept.len(), 1);
        assert!(blocked.is_empty());
    }

    #[test]
    fn session_date_wins_over_wall_clock_stamp() {
        // Simulated fill written today for a run dated a week earlier.
        let mut back_dated = rec("QQQ", "2025-10-17T20:00:00Z", Some(5.0));
        back_dated.session = Some(d("2025-10-03"));
        let last = last_trade_dates(&[back_dated]);
        assert_eq!(days_since_trade(&last, "QQQ", d("2025-10-10")), Some(7));

        let cfg = CadenceConfig {
            min_days_between_trades: 5,
            ..CadenceConfig::default()
        };
        let (kept, blocked) =
            apply_cadence_filter(vec![intent("QQQ")], &last, d("2025-10-10"), &cfg);
        assert_eq!(kept.len(), 1);
        assert!(blocked.is_empty());
    }

    #[test]
    fn cadence_disabled_by_default() {
        let last = last_trade_dates(&[rec("QQQ", "2025-10-10T20:00:00Z", Some(5.0))]);
        let (kept, _) =
            apply_cadence_filter(vec![intent("QQQ")], &last, d("2025-10-10"), &CadenceConfig::default());
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn exposure_threshold() {
        let cfg = CadenceConfig {
            min_exposure_delta: 0.05,
            ..CadenceConfig::default()
        };
        assert!(!passes_exposure_threshold(&PairWeights::new(0.02, -0.03), &cfg));
        assert!(passes_exposure_threshold(&PairWeights::new(0.0, -0.05), &cfg));
        assert!(passes_exposure_threshold(&PairWeights::new(0.0, 0.0), &CadenceConfig::default()));
    }
}
