//! Configuration validation.
//!
//! Checks every recognised option before a cycle runs. Missing keys are
//! fine (defaults apply); present keys must be in range.

use chrono::NaiveDate;

use crate::domain::error::EodTraderError;
use crate::domain::turnover::TurnoverMode;
use crate::ports::config_port::ConfigPort;

pub fn validate_engine_config(config: &dyn ConfigPort) -> Result<(), EodTraderError> {
    validate_run(config)?;
    validate_instruments(config)?;
    validate_risk(config)?;
    validate_allocator(config)?;
    validate_limits(config)?;
    validate_turnover(config)?;
    validate_cadence(config)?;
    validate_planner(config)?;
    validate_constraints(config)?;
    validate_schedule(config)?;
    validate_data(config)?;
    validate_broker(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> EodTraderError {
    EodTraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn positive(config: &dyn ConfigPort, section: &str, key: &str, default: f64) -> Result<f64, EodTraderError> {
    let value = config.get_double(section, key, default);
    if !value.is_finite() || value <= 0.0 {
        return Err(invalid(section, key, format!("{} must be positive", key)));
    }
    Ok(value)
}

fn non_negative(config: &dyn ConfigPort, section: &str, key: &str, default: f64) -> Result<f64, EodTraderError> {
    let value = config.get_double(section, key, default);
    if !value.is_finite() || value < 0.0 {
        return Err(invalid(section, key, format!("{} must be non-negative", key)));
    }
    Ok(value)
}

fn fraction(config: &dyn ConfigPort, section: &str, key: &str, default: f64) -> Result<f64, EodTraderError> {
    let value = config.get_double(section, key, default);
    if !(0.0..=1.0).contains(&value) {
        return Err(invalid(section, key, format!("{} must be between 0 and 1", key)));
    }
    Ok(value)
}

fn window(config: &dyn ConfigPort, section: &str, key: &str, default: i64) -> Result<i64, EodTraderError> {
    let value = config.get_int(section, key, default);
    if value < 1 {
        return Err(invalid(section, key, format!("{} must be at least 1", key)));
    }
    Ok(value)
}

pub fn parse_date_list(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Vec<NaiveDate>, EodTraderError> {
    config
        .get_list(section, key)
        .iter()
        .map(|s| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
                invalid(section, key, format!("invalid date '{}', expected YYYY-MM-DD", s))
            })
        })
        .collect()
}

fn validate_run(config: &dyn ConfigPort) -> Result<(), EodTraderError> {
    positive(config, "run", "equity", 25_000.0)?;
    if config.get_string("run", "vix").is_some() && config.get_optional_double("run", "vix").is_none() {
        return Err(invalid("run", "vix", "vix must be a number"));
    }
    if config.get_optional_double("run", "vix").is_some_and(|v| v < 0.0) {
        return Err(invalid("run", "vix", "vix must be non-negative"));
    }
    Ok(())
}

fn validate_instruments(config: &dyn ConfigPort) -> Result<(), EodTraderError> {
    for key in ["underlier", "long", "short"] {
        if let Some(sym) = config.get_string("instruments", key) {
            if sym.trim().is_empty() {
                return Err(invalid("instruments", key, "symbol must not be empty"));
            }
        }
    }
    let long = config.get_string("instruments", "long").unwrap_or_else(|| "QQQ".into());
    let short = config.get_string("instruments", "short").unwrap_or_else(|| "PSQ".into());
    if long.trim().eq_ignore_ascii_case(short.trim()) {
        return Err(invalid("instruments", "short", "long and short legs must differ"));
    }
    Ok(())
}

fn validate_risk(config: &dyn ConfigPort) -> Result<(), EodTraderError> {
    fraction(config, "risk", "risk_budget_pct", 0.015)?;
    window(config, "risk", "atr_len", 14)?;
    fraction(config, "risk", "max_position_pct", 0.60)?;
    let soft = positive(config, "risk", "vix_soft", 25.0)?;
    let hard = positive(config, "risk", "vix_hard", 35.0)?;
    if soft > hard {
        return Err(invalid("risk", "vix_soft", "vix_soft must not exceed vix_hard"));
    }
    positive(config, "risk", "realized_vol_20d_max", 0.40)?;
    positive(config, "risk", "realized_vol_soft", 0.25)?;
    positive(config, "risk", "trend_vix_max", 30.0)?;
    positive(config, "risk", "trend_vol_50d_max", 0.40)?;
    Ok(())
}

fn validate_allocator(config: &dyn ConfigPort) -> Result<(), EodTraderError> {
    let fast = window(config, "allocator", "fast_ma", 20)?;
    let slow = window(config, "allocator", "slow_ma", 200)?;
    if fast >= slow {
        return Err(invalid("allocator", "fast_ma", "fast_ma must be shorter than slow_ma"));
    }
    non_negative(config, "allocator", "extension_factor", 2.0)?;
    window(config, "allocator", "bb_period", 20)?;
    positive(config, "allocator", "bb_std", 2.0)?;
    fraction(config, "allocator", "base_risk", 0.85)?;
    let max = non_negative(config, "allocator", "max_exposure", 1.0)?;
    let min = non_negative(config, "allocator", "min_exposure", 0.0)?;
    if min > max {
        return Err(invalid("allocator", "min_exposure", "min_exposure must not exceed max_exposure"));
    }
    positive(config, "allocator", "momentum_boost", 1.30)?;
    window(config, "allocator", "vol_lookback", 20)?;
    positive(config, "allocator", "vol_cap", 0.25)?;
    fraction(config, "allocator", "vol_floor_scale", 0.60)?;
    Ok(())
}

fn validate_limits(config: &dyn ConfigPort) -> Result<(), EodTraderError> {
    non_negative(config, "limits", "max_gross", 1.0)?;
    non_negative(config, "limits", "max_long", 1.0)?;
    non_negative(config, "limits", "max_short", 1.0)?;
    Ok(())
}

fn validate_turnover(config: &dyn ConfigPort) -> Result<(), EodTraderError> {
    non_negative(config, "turnover", "max_turnover_frac", 0.15)?;
    if let Some(mode) = config.get_string("turnover", "mode") {
        mode.parse::<TurnoverMode>()
            .map_err(|reason| invalid("turnover", "mode", reason))?;
    }
    Ok(())
}

fn validate_cadence(config: &dyn ConfigPort) -> Result<(), EodTraderError> {
    if config.get_int("cadence", "min_days_between_trades", 0) < 0 {
        return Err(invalid(
            "cadence",
            "min_days_between_trades",
            "min_days_between_trades must be non-negative",
        ));
    }
    fraction(config, "cadence", "min_exposure_delta", 0.0)?;
    Ok(())
}

fn validate_planner(config: &dyn ConfigPort) -> Result<(), EodTraderError> {
    non_negative(config, "planner", "min_trade_value", 200.0)?;
    if config.get_int("planner", "moc_window_minutes", 30) < 0 {
        return Err(invalid(
            "planner",
            "moc_window_minutes",
            "moc_window_minutes must be non-negative",
        ));
    }
    let offset = config.get_double("planner", "limit_offset_pct", 0.005);
    if !(0.0..0.5).contains(&offset) {
        return Err(invalid("planner", "limit_offset_pct", "limit_offset_pct must be in [0, 0.5)"));
    }
    non_negative(config, "planner", "close_dust_shares", 1.0)?;
    non_negative(config, "planner", "min_open_notional", 200.0)?;
    Ok(())
}

fn validate_constraints(config: &dyn ConfigPort) -> Result<(), EodTraderError> {
    window(config, "constraints", "lot_size", 1)?;
    non_negative(config, "constraints", "min_qty", 1.0)?;
    let precision = config.get_int("constraints", "qty_precision", 0);
    if !(0..=8).contains(&precision) {
        return Err(invalid("constraints", "qty_precision", "qty_precision must be between 0 and 8"));
    }
    non_negative(config, "constraints", "min_notional", 200.0)?;
    Ok(())
}

fn validate_schedule(config: &dyn ConfigPort) -> Result<(), EodTraderError> {
    if config.get_int("schedule", "eod_window_minutes", 30) < 0 {
        return Err(invalid(
            "schedule",
            "eod_window_minutes",
            "eod_window_minutes must be non-negative",
        ));
    }
    let before = config.get_int("schedule", "event_window_before", -1);
    let after = config.get_int("schedule", "event_window_after", 1);
    if before > after {
        return Err(invalid(
            "schedule",
            "event_window_before",
            "event_window_before must not exceed event_window_after",
        ));
    }
    parse_date_list(config, "schedule", "event_dates")?;
    parse_date_list(config, "schedule", "opex_overrides")?;
    Ok(())
}

fn validate_data(config: &dyn ConfigPort) -> Result<(), EodTraderError> {
    if config.get_int("data", "max_staleness_days", 3) < 0 {
        return Err(invalid(
            "data",
            "max_staleness_days",
            "max_staleness_days must be non-negative",
        ));
    }
    Ok(())
}

fn validate_broker(config: &dyn ConfigPort) -> Result<(), EodTraderError> {
    if !config.get_bool("broker", "dry_run", true) {
        return Err(invalid(
            "broker",
            "dry_run",
            "live submission is not available; set dry_run = true",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn check(ini: &str) -> Result<(), EodTraderError> {
        let adapter = FileConfigAdapter::from_string(ini).unwrap();
        validate_engine_config(&adapter)
    }

    fn invalid_key(result: Result<(), EodTraderError>) -> (String, String) {
        match result {
            Err(EodTraderError::ConfigInvalid { section, key, .. }) => (section, key),
            other => panic!("expected ConfigInvalid, got {:?}", other),
        }
    }

    #[test]
    fn empty_config_uses_valid_defaults() {
        assert!(check("[run]\n").is_ok());
    }

    #[test]
    fn full_config_is_valid() {
        let ini = r#"
[run]
equity = 30000
vix = 18.5

[instruments]
underlier = QQQ
long = QQQ
short = PSQ

[turnover]
max_turnover_frac = 0.10
mode = skip

[schedule]
event_dates = 2025-09-17, 2025-10-29
opex_overrides = 2025-04-17
"#;
        assert!(check(ini).is_ok());
    }

    #[test]
    fn rejects_non_positive_equity() {
        assert_eq!(
            invalid_key(check("[run]\nequity = 0\n")),
            ("run".to_string(), "equity".to_string())
        );
    }

    #[test]
    fn rejects_bad_vix() {
        assert_eq!(invalid_key(check("[run]\nvix = high\n")).1, "vix");
        assert_eq!(invalid_key(check("[run]\nvix = -3\n")).1, "vix");
    }

    #[test]
    fn rejects_same_legs() {
        let ini = "[instruments]\nlong = QQQ\nshort = qqq\n";
        assert_eq!(invalid_key(check(ini)).1, "short");
    }

    #[test]
    fn rejects_inverted_vix_thresholds() {
        let ini = "[risk]\nvix_soft = 40\nvix_hard = 35\n";
        assert_eq!(invalid_key(check(ini)).1, "vix_soft");
    }

    #[test]
    fn rejects_unknown_turnover_mode() {
        assert_eq!(
            invalid_key(check("[turnover]\nmode = freeze\n")),
            ("turnover".to_string(), "mode".to_string())
        );
    }

    #[test]
    fn rejects_bad_event_date() {
        let ini = "[schedule]\nevent_dates = 2025-09-17, next tuesday\n";
        assert_eq!(invalid_key(check(ini)).1, "event_dates");
    }

    #[test]
    fn rejects_fast_not_below_slow() {
        let ini = "[allocator]\nfast_ma = 200\nslow_ma = 200\n";
        assert_eq!(invalid_key(check(ini)).1, "fast_ma");
    }

    #[test]
    fn rejects_live_broker() {
        assert_eq!(invalid_key(check("[broker]\ndry_run = false\n")).1, "dry_run");
    }

    #[test]
    fn rejects_zero_lot_size() {
        assert_eq!(invalid_key(check("[constraints]\nlot_size = 0\n")).1, "lot_size");
    }
}
