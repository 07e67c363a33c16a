//! Daily orchestrator.
//!
//! Runs the gates and pipeline stages in a fixed order:
//! kill switch → timing → calendar → data → allocate → reconcile →
//! turnover cap → plan → no-op classification → execute → fills/persist →
//! snapshot. Every exit path returns a full [`DecisionRecord`], appends a
//! run-history line and notifies; the last two are best-effort.
//!
//! Data and validation errors abort before the position store is touched.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::domain::allocator::{
    AllocatorConfig, classify_phase, exposure_allocator, exposure_diagnostics, format_plan_reason,
};
use crate::domain::audit::AuditKind;
use crate::domain::broker::{OrderPayload, OrderResult};
use crate::domain::cadence::{
    CadenceConfig, apply_cadence_filter, last_trade_dates, passes_exposure_threshold,
};
use crate::domain::calendar::{ScheduleConfig, calendar_flags, eod_ready};
use crate::domain::coalesce::{
    FlipKind, coalesce_side_flip, legs_to_intents, rebalance_pair_legs,
};
use crate::domain::decision::{
    Breadcrumbs, DecisionRecord, NoOpReason, RunSummary, classify_no_op, snapshot_from_positions,
};
use crate::domain::error::EodTraderError;
use crate::domain::execution::{FillRecord, apply_simulated_fills, simulate_fills};
use crate::domain::guardrails::{ExposureLimits, enforce_exposure_caps};
use crate::domain::instrument::{InstrumentConfig, PairPrices, normalize_symbol};
use crate::domain::ohlcv::{OhlcvBar, last_close, staleness_days, validate_series};
use crate::domain::order::{
    OrderIntent, PlannerConfig, SizeConstraints, plan_orders, sanitize_intents,
};
use crate::domain::position::PositionBook;
use crate::domain::reconcile::{compare_intents_vs_orders, effective_positions_before};
use crate::domain::risk::RiskConfig;
use crate::domain::target::{
    MarketContext, PairBars, TargetExposure, apply_risk_ceiling, assess_target,
    target_from_weights,
};
use crate::domain::turnover::{
    TurnoverConfig, current_weights, enforce_turnover_cap, exposure_delta,
};
use crate::domain::units::Dollars;
use crate::ports::audit_port::AuditPort;
use crate::ports::broker_port::BrokerPort;
use crate::ports::data_port::PriceDataPort;
use crate::ports::fill_journal_port::FillJournalPort;
use crate::ports::history_port::RunHistoryPort;
use crate::ports::notify_port::NotifierPort;
use crate::ports::position_port::PositionStorePort;

/// Fewest bars a series may have; anything shorter cannot produce a return.
pub const MIN_BARS: usize = 2;

/// Typed configuration for one cycle, one struct per component.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub instruments: InstrumentConfig,
    pub risk: RiskConfig,
    pub allocator: AllocatorConfig,
    pub limits: ExposureLimits,
    pub turnover: TurnoverConfig,
    pub cadence: CadenceConfig,
    pub planner: PlannerConfig,
    pub constraints: SizeConstraints,
    pub schedule: ScheduleConfig,
    /// Days the latest bar may lag `as_of` before it is flagged stale.
    pub max_staleness_days: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            instruments: InstrumentConfig::default(),
            risk: RiskConfig::default(),
            allocator: AllocatorConfig::default(),
            limits: ExposureLimits::default(),
            turnover: TurnoverConfig::default(),
            cadence: CadenceConfig::default(),
            planner: PlannerConfig::default(),
            constraints: SizeConstraints::default(),
            schedule: ScheduleConfig::default(),
            max_staleness_days: 3,
        }
    }
}

/// The collaborators a cycle talks to.
pub struct CyclePorts<'a> {
    pub prices: &'a dyn PriceDataPort,
    pub positions: &'a dyn PositionStorePort,
    pub audit: &'a dyn AuditPort,
    pub journal: &'a dyn FillJournalPort,
    pub history: &'a dyn RunHistoryPort,
    pub broker: &'a dyn BrokerPort,
    pub notifier: &'a dyn NotifierPort,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleInputs {
    /// Session date being decided.
    pub as_of: NaiveDate,
    /// Wall-clock stamp for journal records.
    pub now: DateTime<Utc>,
    pub equity: Dollars,
    pub vix: Option<f64>,
    pub minutes_to_close: i64,
    pub emergency_override: bool,
    pub kill_switch_engaged: bool,
    pub config_fingerprint: String,
}

fn to_audit_value<T: Serialize>(value: &T) -> Result<Value, EodTraderError> {
    serde_json::to_value(value).map_err(|e| EodTraderError::persistence("audit", e))
}

fn intent_audit_data(it: &OrderIntent) -> Value {
    json!({
        "symbol": it.instrument,
        "side": it.side.to_string(),
        "qty": (it.quantity.value() * 1e6).round() / 1e6,
        "order_type": it.order_type.to_string(),
        "time_in_force": it.time_in_force.to_string(),
        "limit_price": it.limit_price,
        "reason": it.reason,
    })
}

fn load_series(
    prices: &dyn PriceDataPort,
    instruments: &InstrumentConfig,
) -> Result<BTreeMap<String, Vec<OhlcvBar>>, EodTraderError> {
    let mut series = BTreeMap::new();
    for sym in instruments.all_symbols() {
        let bars = prices.get_bars(&sym)?;
        validate_series(&sym, &bars)?;
        if bars.len() < MIN_BARS {
            return Err(EodTraderError::InsufficientData {
                symbol: sym,
                bars: bars.len(),
                minimum: MIN_BARS,
            });
        }
        debug!("Loaded {} bars for {}", bars.len(), sym);
        series.insert(sym, bars);
    }
    Ok(series)
}

fn series_for<'a>(
    series: &'a BTreeMap<String, Vec<OhlcvBar>>,
    symbol: &str,
) -> Result<&'a [OhlcvBar], EodTraderError> {
    series
        .get(&normalize_symbol(symbol))
        .map(Vec::as_slice)
        .ok_or_else(|| EodTraderError::DataUnavailable {
            symbol: normalize_symbol(symbol),
            reason: "series not loaded".into(),
        })
}

/// Append run history and notify; failures are logged, never returned.
fn finish(ports: &CyclePorts<'_>, mut record: DecisionRecord, started: Instant) -> DecisionRecord {
    record.breadcrumbs.run_duration_sec = started.elapsed().as_secs_f64();
    if let Err(e) = ports.history.append(&RunSummary::from(&record)) {
        warn!("Run history append failed: {}", e);
    }
    if let Err(e) = ports.notifier.send(&record.notification_text()) {
        warn!("Notification failed: {}", e);
    }
    record
}

pub fn run_daily_cycle(
    ports: &CyclePorts<'_>,
    cfg: &EngineConfig,
    inputs: &CycleInputs,
) -> Result<DecisionRecord, EodTraderError> {
    let started = Instant::now();
    info!("Daily cycle starting for {}", inputs.as_of);

    let instr = &cfg.instruments;
    let equity = inputs.equity;
    let mut crumbs = Breadcrumbs {
        config_hash16: Some(inputs.config_fingerprint.clone()),
        vix: inputs.vix,
        equity_now: equity.value(),
        ..Breadcrumbs::default()
    };

    // Kill switch
    if inputs.kill_switch_engaged {
        warn!("KILL-SWITCH active, aborting run before any actions");
        crumbs.kill_switch = true;
        crumbs.no_op = true;
        crumbs.no_op_reason = Some(NoOpReason::KillSwitch);
        let record = DecisionRecord::early_exit(
            inputs.as_of,
            TargetExposure::flat("NA", "KILL"),
            PositionBook::new(),
            crumbs,
        );
        return Ok(finish(ports, record, started));
    }

    // Timing gate
    let (ready, why) = eod_ready(inputs.minutes_to_close, &cfg.schedule);
    if !ready {
        warn!("EOD timing check → {}", why);
        let positions = ports.positions.load()?;
        crumbs.eod_guard = Some(why);
        crumbs.no_op = true;
        crumbs.no_op_reason = Some(NoOpReason::OutsideExecutionWindow);
        let record = DecisionRecord::early_exit(
            inputs.as_of,
            TargetExposure::flat("NA", "EOD_GUARD"),
            positions,
            crumbs,
        );
        return Ok(finish(ports, record, started));
    }
    info!("EOD timing check → {}", why);

    // Calendar
    let flags = calendar_flags(inputs.as_of, &cfg.schedule);
    info!(
        "Calendar → event blackout={}, OPEX={}",
        flags.event_blackout, flags.opex
    );
    crumbs.event_blackout = flags.event_blackout;
    crumbs.opex = flags.opex;

    // Data
    let series = load_series(ports.prices, instr)?;
    let underlier = series_for(&series, &instr.underlier)?;
    let long_bars = series_for(&series, &instr.long)?;
    let inverse_bars = series_for(&series, &instr.inverse)?;

    let common_date = [underlier, long_bars, inverse_bars]
        .iter()
        .filter_map(|bars| bars.last().map(|b| b.date))
        .min();
    let staleness = [underlier, long_bars, inverse_bars]
        .iter()
        .filter_map(|bars| staleness_days(bars, inputs.as_of))
        .max();
    crumbs.price_common_date = common_date;
    crumbs.price_staleness_days = staleness;
    crumbs.price_stale = staleness.is_some_and(|d| d > cfg.max_staleness_days);
    if crumbs.price_stale {
        warn!(
            "Price data stale: last common bar {:?} is {}d behind {}",
            common_date,
            staleness.unwrap_or_default(),
            inputs.as_of
        );
    }
    crumbs.signal_underlier = Some(normalize_symbol(&instr.underlier));
    crumbs.exec_long = Some(normalize_symbol(&instr.long));
    crumbs.exec_short = Some(normalize_symbol(&instr.inverse));

    let long_px = last_close(long_bars).unwrap_or(f64::NAN);
    let inverse_px = last_close(inverse_bars).unwrap_or(f64::NAN);
    let pair_prices = PairPrices {
        long: long_px,
        short: inverse_px,
    };
    let last_prices: BTreeMap<String, f64> = series
        .iter()
        .filter_map(|(sym, bars)| last_close(bars).map(|px| (sym.clone(), px)))
        .collect();

    ports.audit.log(
        AuditKind::Cfg,
        json!({
            "config_hash16": inputs.config_fingerprint,
            "as_of": inputs.as_of.to_string(),
            "equity": equity.value(),
            "vix": inputs.vix,
            "underlier": normalize_symbol(&instr.underlier),
            "long": normalize_symbol(&instr.long),
            "short": normalize_symbol(&instr.inverse),
        }),
    )?;

    // Allocate
    let bars = PairBars {
        underlier,
        long: long_bars,
        inverse: inverse_bars,
    };
    let ctx = MarketContext {
        equity,
        vix: inputs.vix,
        is_event_window: flags.event_blackout,
        is_opex: flags.opex,
    };
    let assessment = assess_target(&bars, instr, &ctx, &cfg.risk);
    info!(
        "Regime bull={} | breaker: {} | {}",
        assessment.regime.bull, assessment.breaker.reason, assessment.size_note
    );

    let allocated = exposure_allocator(underlier, &cfg.allocator);
    let (guarded, guard_note) =
        enforce_exposure_caps(allocated, &cfg.limits, &instr.long, &instr.inverse);
    let (weights, ceiling_note) = apply_risk_ceiling(guarded, &assessment, equity);
    let phase = classify_phase(underlier, &cfg.allocator);
    let plan_reason = format_plan_reason(
        &exposure_diagnostics(underlier, &cfg.allocator),
        phase,
        &guard_note,
    );
    info!("Allocation (guarded) → {} | {}", weights, plan_reason);
    if let Some(note) = &ceiling_note {
        info!("Allocation adjusted by risk sizer: {}", note);
    }

    crumbs.regime_bull = Some(assessment.regime.bull);
    crumbs.phase = Some(phase.to_string());
    crumbs.plan_reason = Some(plan_reason);
    crumbs.breaker_reason = Some(assessment.breaker.reason.clone());
    crumbs.risk_note = Some(assessment.size_note.clone());
    crumbs.signal_target_notes = Some(assessment.target.notes.clone());
    crumbs.guard_note = Some(guard_note);
    crumbs.ceiling_note = ceiling_note;

    // Reconcile
    let raw = ports.positions.load()?;
    let snapshot = ports.broker.positions_snapshot();
    let journal = ports.journal.read_all()?;
    let (before, source) = effective_positions_before(
        &raw,
        snapshot.as_ref(),
        &journal,
        ports.positions.last_saved_at(),
    );
    info!("Positions BEFORE ({}): {:?}", source, before.as_map());
    crumbs.positions_source = Some(source);

    // Turnover cap
    let shares = before.pair_shares(instr);
    let prev = current_weights(&shares, &pair_prices, equity);
    let outcome = enforce_turnover_cap(weights, &shares, &pair_prices, equity, &cfg.turnover);
    let delta = exposure_delta(&prev, &outcome.weights);
    crumbs.prev_exposure = Some(prev);
    crumbs.desired_exposure = Some(outcome.weights);
    crumbs.delta_exposure = Some(delta);
    crumbs.turnover_frac = Some(outcome.turnover_frac);
    crumbs.turnover_action = Some(outcome.action);
    crumbs.turnover_note = Some(outcome.note.clone());

    let fallback = before
        .held_symbol()
        .map(str::to_string)
        .unwrap_or_else(|| normalize_symbol(&instr.long));
    let target = target_from_weights(
        &outcome.weights,
        instr,
        (long_px, inverse_px),
        equity,
        &fallback,
    );
    info!(
        "Target → {} | {} | ${:.2}",
        target.instrument,
        target.direction,
        target.notional.value()
    );
    let target_px = last_prices
        .get(&target.instrument)
        .copied()
        .unwrap_or(f64::NAN);

    // Plan
    let planned = plan_orders(
        &before,
        &target,
        target_px,
        inputs.minutes_to_close,
        inputs.emergency_override,
        instr,
        &cfg.planner,
    );
    let last_dates = last_trade_dates(&journal);
    let (mut intents, mut cadence_blocked) =
        apply_cadence_filter(planned, &last_dates, inputs.as_of, &cfg.cadence);

    let threshold_ok = passes_exposure_threshold(&delta, &cfg.cadence);
    if !threshold_ok {
        info!(
            "Exposure change {:.4} below threshold {:.4} → no trade",
            delta.max_abs().value(),
            cfg.cadence.min_exposure_delta
        );
        intents.clear();
    } else {
        let (mut legs, mut flip) = coalesce_side_flip(
            &shares,
            &outcome.weights,
            &pair_prices,
            equity,
            instr,
            &cfg.planner,
        );
        // The planner only trades the target leg; a held pair leg that is not
        // the target needs both legs planned against their own weights.
        let holds_other_leg = before.iter().any(|(sym, qty)| {
            qty.abs() > 1e-9 && sym != target.instrument && instr.leg_of(sym).is_some()
        });
        if flip == FlipKind::NoFlip && holds_other_leg {
            legs = rebalance_pair_legs(
                &shares,
                &outcome.weights,
                &pair_prices,
                equity,
                instr,
                &cfg.planner,
            );
            flip = FlipKind::PairRebalance;
        }
        crumbs.coalesce = Some(flip);
        if flip != FlipKind::NoFlip {
            info!("Coalesced {} → {} leg(s)", flip, legs.len());
            let coalesced = legs_to_intents(
                legs,
                &pair_prices,
                instr,
                inputs.minutes_to_close,
                inputs.emergency_override,
                &cfg.planner,
            );
            let (kept, blocked) =
                apply_cadence_filter(coalesced, &last_dates, inputs.as_of, &cfg.cadence);
            cadence_blocked.extend(blocked);
            intents = kept;
        }
    }
    let (intents, sanitize_notes) =
        sanitize_intents(intents, &before, &last_prices, &cfg.constraints);
    for note in &sanitize_notes {
        info!("Quantity sanitized: {}", note);
    }
    crumbs.threshold_suppressed = !threshold_ok;
    crumbs.sanitize_notes = sanitize_notes;
    crumbs.cadence_blocked = cadence_blocked;

    // No-op classification
    if intents.is_empty() {
        let reason = classify_no_op(
            Some(outcome.action),
            !threshold_ok,
            !crumbs.cadence_blocked.is_empty(),
        );
        info!("No trade planned → {}", reason);
        crumbs.no_op = true;
        crumbs.no_op_reason = Some(reason);
        let snap = snapshot_from_positions(&before, &last_prices, equity.value(), inputs.as_of);
        let record = DecisionRecord {
            as_of: inputs.as_of,
            target,
            positions_before: before.clone(),
            intents: Vec::new(),
            order_results: Vec::new(),
            fills: Vec::new(),
            positions_after: before,
            breadcrumbs: crumbs,
            snapshot: Some(snap),
        };
        return Ok(finish(ports, record, started));
    }

    // Execute
    for it in &intents {
        ports.audit.log(AuditKind::Plan, intent_audit_data(it))?;
    }
    let order_results = match ports.broker.place_orders(&intents) {
        Ok(results) => results,
        Err(e) => {
            error!("Broker submission failed: {}", e);
            intents
                .iter()
                .map(|it| OrderResult::Rejected {
                    payload: OrderPayload::from_intent(it),
                    reason: e.to_string(),
                })
                .collect()
        }
    };
    // Orders are out; audit trouble from here on must not stop the save.
    for res in &order_results {
        let logged = to_audit_value(res).and_then(|data| ports.audit.log(AuditKind::Order, data));
        if let Err(e) = logged {
            error!("ORDER audit write failed after broker submission: {}", e);
            crumbs.audit_failures += 1;
        }
    }
    let acknowledged: Vec<OrderPayload> = order_results
        .iter()
        .filter(|r| !r.is_rejected())
        .map(|r| r.payload().clone())
        .collect();
    let rec = compare_intents_vs_orders(&intents, &acknowledged);
    info!(
        "Reconcile: matches={} mismatches={} unmatched_intents={}",
        rec.matches.len(),
        rec.mismatches.len(),
        rec.unmatched_intents.len()
    );
    crumbs.reconcile_matches = Some(rec.matches.len());
    crumbs.reconcile_mismatches = Some(rec.mismatches.len());
    crumbs.reconcile_unmatched_intents = Some(rec.unmatched_intents.len());
    crumbs.broker_rejections = order_results.iter().filter(|r| r.is_rejected()).count();

    // Simulate fills and persist
    let fills = simulate_fills(&intents, &last_prices);
    for fill in &fills {
        ports.journal.append(&FillRecord::simulated(fill, inputs.now, inputs.as_of))?;
    }
    let after = apply_simulated_fills(&before, &fills);
    ports.positions.save(&after)?;
    info!("Positions AFTER: {:?}", after.as_map());
    for fill in &fills {
        let data = json!({
            "symbol": fill.instrument,
            "side": fill.side.to_string(),
            "qty": (fill.quantity.value() * 1e6).round() / 1e6,
            "price": fill.fill_price,
            "note": fill.note,
        });
        if let Err(e) = ports.audit.log(AuditKind::Fill, data) {
            error!("FILL audit write failed after positions were saved: {}", e);
            crumbs.audit_failures += 1;
        }
    }

    // Snapshot
    let snap = snapshot_from_positions(&after, &last_prices, equity.value(), inputs.as_of);
    info!(
        "Snapshot: net MV ${:.2}, gross exposure {:.1}%",
        snap.total_mv,
        snap.gross_exposure_pct * 100.0
    );

    let record = DecisionRecord {
        as_of: inputs.as_of,
        target,
        positions_before: before,
        intents,
        order_results,
        fills,
        positions_after: after,
        breadcrumbs: crumbs,
        snapshot: Some(snap),
    };
    info!("Daily cycle complete");
    Ok(finish(ports, record, started))
}
