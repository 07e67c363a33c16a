//! Session calendar: options-expiry days, event blackouts and the
//! end-of-day execution window.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Trading is allowed once this many minutes or fewer remain.
    pub eod_window_minutes: i64,
    pub allow_early_override: bool,
    pub event_dates: Vec<NaiveDate>,
    /// Day offsets around each event, inclusive.
    pub event_window: (i64, i64),
    pub opex_caution: bool,
    pub opex_overrides: Vec<NaiveDate>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            eod_window_minutes: 30,
            allow_early_override: false,
            event_dates: Vec::new(),
            event_window: (-1, 1),
            opex_caution: true,
            opex_overrides: Vec::new(),
        }
    }
}

/// Calendar flags for one session. Neither flag blocks by itself; the risk
/// sizer decides what they mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CalendarFlags {
    pub event_blackout: bool,
    pub opex: bool,
}

/// Monthly options expiry: third Friday of the month.
pub fn is_third_friday(d: NaiveDate) -> bool {
    d.weekday() == Weekday::Fri && (15..=21).contains(&d.day())
}

pub fn is_opex(d: NaiveDate, overrides: &[NaiveDate]) -> bool {
    is_third_friday(d) || overrides.contains(&d)
}

/// True when `d` falls in `[event + window.0, event + window.1]` for any event.
pub fn is_event_blackout(d: NaiveDate, events: &[NaiveDate], window: (i64, i64)) -> bool {
    let (lo, hi) = window;
    events
        .iter()
        .any(|&e| e + Duration::days(lo) <= d && d <= e + Duration::days(hi))
}

pub fn calendar_flags(d: NaiveDate, cfg: &ScheduleConfig) -> CalendarFlags {
    CalendarFlags {
        event_blackout: is_event_blackout(d, &cfg.event_dates, cfg.event_window),
        opex: cfg.opex_caution && is_opex(d, &cfg.opex_overrides),
    }
}

/// Whether the cycle may act now, with a human-readable reason.
pub fn eod_ready(minutes_to_close: i64, cfg: &ScheduleConfig) -> (bool, String) {
    let window = cfg.eod_window_minutes;
    if cfg.allow_early_override {
        return (true, format!("override=true (window={}m)", window));
    }
    if minutes_to_close <= window {
        return (
            true,
            format!("within window ({}m ≤ {}m)", minutes_to_close, window),
        );
    }
    (
        false,
        format!("too early ({}m > {}m)", minutes_to_close, window),
    )
}
