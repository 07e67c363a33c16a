//! The per-cycle decision record and what is derived from it: the exposure
//! snapshot, the run-history summary line and the notification text.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::domain::broker::OrderResult;
use crate::domain::coalesce::FlipKind;
use crate::domain::execution::SimulatedFill;
use crate::domain::instrument::PairWeights;
use crate::domain::order::OrderIntent;
use crate::domain::position::PositionBook;
use crate::domain::reconcile::PositionsSource;
use crate::domain::target::TargetExposure;
use crate::domain::turnover::TurnoverAction;

/// Why a cycle ended without orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoOpReason {
    KillSwitch,
    OutsideExecutionWindow,
    TurnoverSkip,
    AlreadyAtTarget,
    FilteredByCadence,
    FilteredByThreshold,
}

impl fmt::Display for NoOpReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NoOpReason::KillSwitch => "kill_switch",
            NoOpReason::OutsideExecutionWindow => "outside_execution_window",
            NoOpReason::TurnoverSkip => "turnover_skip",
            NoOpReason::AlreadyAtTarget => "already_at_target",
            NoOpReason::FilteredByCadence => "filtered_by_cadence",
            NoOpReason::FilteredByThreshold => "filtered_by_threshold",
        };
        write!(f, "{}", s)
    }
}

/// Classify an empty plan. Turnover skip wins over the filters; a plan the
/// filters emptied is attributed to the filter that emptied it.
pub fn classify_no_op(
    turnover: Option<TurnoverAction>,
    threshold_suppressed: bool,
    cadence_blocked: bool,
) -> NoOpReason {
    if turnover == Some(TurnoverAction::Skipped) {
        NoOpReason::TurnoverSkip
    } else if threshold_suppressed {
        NoOpReason::FilteredByThreshold
    } else if cadence_blocked {
        NoOpReason::FilteredByCadence
    } else {
        NoOpReason::AlreadyAtTarget
    }
}

/// Diagnostic trail of one cycle. Fields stay `None` when the cycle exited
/// before the stage that fills them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Breadcrumbs {
    pub kill_switch: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eod_guard: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_hash16: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vix: Option<f64>,
    pub event_blackout: bool,
    pub opex: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal_underlier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exec_long: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exec_short: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_common_date: Option<NaiveDate>,
    pub price_stale: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_staleness_days: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regime_bull: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breaker_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal_target_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guard_note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ceiling_note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub positions_source: Option<PositionsSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_exposure: Option<PairWeights>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desired_exposure: Option<PairWeights>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta_exposure: Option<PairWeights>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turnover_frac: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turnover_action: Option<TurnoverAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turnover_note: Option<String>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub cadence_blocked: BTreeSet<String>,
    pub threshold_suppressed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coalesce: Option<FlipKind>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sanitize_notes: Vec<String>,
    pub no_op: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_op_reason: Option<NoOpReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconcile_matches: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconcile_mismatches: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconcile_unmatched_intents: Option<usize>,
    pub broker_rejections: usize,
    /// ORDER and FILL audit writes that failed after the broker call.
    #[serde(default)]
    pub audit_failures: usize,
    pub equity_now: f64,
    pub run_duration_sec: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolExposure {
    pub market_value: f64,
    pub weight: f64,
}

/// Valuation of a position book at last prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureSnapshot {
    pub date: NaiveDate,
    pub equity_ref: f64,
    /// Signed net market value.
    pub total_mv: f64,
    pub gross_exposure_pct: f64,
    pub symbols: BTreeMap<String, SymbolExposure>,
}

fn finite_or_zero(x: f64) -> f64 {
    if x.is_finite() { x } else { 0.0 }
}

/// Symbols without a price are valued at zero.
pub fn snapshot_from_positions(
    positions: &PositionBook,
    prices: &BTreeMap<String, f64>,
    equity_ref: f64,
    date: NaiveDate,
) -> ExposureSnapshot {
    let weight_of = |mv: f64| {
        if equity_ref > 0.0 {
            finite_or_zero(mv / equity_ref)
        } else {
            0.0
        }
    };

    let mut symbols = BTreeMap::new();
    let mut net = 0.0;
    let mut gross = 0.0;
    for (sym, shares) in positions.iter() {
        let mv = finite_or_zero(prices.get(sym).map_or(0.0, |px| shares * px));
        net += mv;
        gross += mv.abs();
        symbols.insert(
            sym.to_string(),
            SymbolExposure {
                market_value: mv,
                weight: weight_of(mv),
            },
        );
    }

    ExposureSnapshot {
        date,
        equity_ref,
        total_mv: net,
        gross_exposure_pct: weight_of(gross),
        symbols,
    }
}

/// Everything one cycle decided. Returned on every exit path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub as_of: NaiveDate,
    pub target: TargetExposure,
    pub positions_before: PositionBook,
    pub intents: Vec<OrderIntent>,
    pub order_results: Vec<OrderResult>,
    pub fills: Vec<SimulatedFill>,
    pub positions_after: PositionBook,
    pub breadcrumbs: Breadcrumbs,
    pub snapshot: Option<ExposureSnapshot>,
}

impl DecisionRecord {
    /// A record for a cycle that stopped before planning.
    pub fn early_exit(
        as_of: NaiveDate,
        target: TargetExposure,
        positions: PositionBook,
        breadcrumbs: Breadcrumbs,
    ) -> Self {
        Self {
            as_of,
            target,
            positions_before: positions.clone(),
            intents: Vec::new(),
            order_results: Vec::new(),
            fills: Vec::new(),
            positions_after: positions,
            breadcrumbs,
            snapshot: None,
        }
    }

    /// Plain-text summary for the notifier.
    pub fn notification_text(&self) -> String {
        let t = &self.target;
        let mut lines = vec![
            format!("EOD decision {}", self.as_of),
            format!("Target: {} {}", t.direction, t.instrument),
            format!(
                "Notional: ${:.2}  Shares: {:.2}",
                t.notional.value(),
                t.signed_shares.value()
            ),
            format!("Planned orders: {}", self.intents.len()),
        ];
        for it in &self.intents {
            lines.push(format!(
                "  {} {:.4} {} {} {}",
                it.side,
                it.quantity.value(),
                it.instrument,
                it.order_type,
                it.time_in_force
            ));
        }
        if let Some(reason) = self.breadcrumbs.no_op_reason {
            lines.push(format!("No-op: {}", reason));
        }
        if self.breadcrumbs.broker_rejections > 0 {
            lines.push(format!("Broker rejections: {}", self.breadcrumbs.broker_rejections));
        }
        if self.breadcrumbs.audit_failures > 0 {
            lines.push(format!("Audit write failures: {}", self.breadcrumbs.audit_failures));
        }
        let after: Vec<String> = self
            .positions_after
            .iter()
            .map(|(s, q)| format!("{}={:.4}", s, q))
            .collect();
        lines.push(format!("Positions after: {{{}}}", after.join(", ")));
        lines.join("\n")
    }
}

/// One run-history line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub as_of: NaiveDate,
    pub price_date: Option<NaiveDate>,
    pub hash16: String,
    pub underlier: String,
    pub phase: String,
    pub exec_long: String,
    pub exec_short: String,
    pub prev: Option<PairWeights>,
    pub desired: Option<PairWeights>,
    pub delta: Option<PairWeights>,
    pub turnover_frac: f64,
    pub turnover_note: String,
    pub no_op: bool,
    pub no_op_reason: Option<NoOpReason>,
    pub equity_now: f64,
    pub positions_source: Option<PositionsSource>,
    pub price_stale: bool,
    pub price_staleness_days: i64,
    pub run_duration_sec: f64,
    pub intents: usize,
    pub target_symbol: String,
    pub target_direction: String,
    pub target_dollars: f64,
    pub target_shares: f64,
}

impl From<&DecisionRecord> for RunSummary {
    fn from(d: &DecisionRecord) -> Self {
        let bc = &d.breadcrumbs;
        Self {
            as_of: d.as_of,
            price_date: bc.price_common_date,
            hash16: bc.config_hash16.clone().unwrap_or_default(),
            underlier: bc.signal_underlier.clone().unwrap_or_default(),
            phase: bc.phase.clone().unwrap_or_default(),
            exec_long: bc.exec_long.clone().unwrap_or_default(),
            exec_short: bc.exec_short.clone().unwrap_or_default(),
            prev: bc.prev_exposure,
            desired: bc.desired_exposure,
            delta: bc.delta_exposure,
            turnover_frac: bc.turnover_frac.unwrap_or(0.0),
            turnover_note: bc.turnover_note.clone().unwrap_or_default(),
            no_op: bc.no_op,
            no_op_reason: bc.no_op_reason,
            equity_now: bc.equity_now,
            positions_source: bc.positions_source,
            price_stale: bc.price_stale,
            price_staleness_days: bc.price_staleness_days.unwrap_or(0),
            run_duration_sec: bc.run_duration_sec,
            intents: d.intents.len(),
            target_symbol: d.target.instrument.clone(),
            target_direction: d.target.direction.to_string(),
            target_dollars: d.target.notional.value(),
            target_shares: d.target.signed_shares.value(),
        }
    }
}
