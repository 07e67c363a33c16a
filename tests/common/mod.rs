#![allow(dead_code)]

use chrono::{DateTime, Duration, NaiveDate, Utc};
use eodtrader::domain::audit::{AuditKind, AuditRecord};
use eodtrader::domain::broker::{OrderPayload, OrderResult};
use eodtrader::domain::cycle::{CycleInputs, CyclePorts, EngineConfig};
use eodtrader::domain::decision::RunSummary;
use eodtrader::domain::error::EodTraderError;
use eodtrader::domain::execution::FillRecord;
pub use eodtrader::domain::ohlcv::OhlcvBar;
use eodtrader::domain::order::OrderIntent;
use eodtrader::domain::position::PositionBook;
use eodtrader::domain::units::Dollars;
use eodtrader::ports::audit_port::AuditPort;
use eodtrader::ports::broker_port::BrokerPort;
use eodtrader::ports::data_port::PriceDataPort;
use eodtrader::ports::fill_journal_port::FillJournalPort;
use eodtrader::ports::history_port::RunHistoryPort;
use eodtrader::ports::notify_port::NotifierPort;
use eodtrader::ports::position_port::PositionStorePort;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

pub struct MockPriceData {
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub errors: HashMap<String, String>,
}

impl MockPriceData {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl PriceDataPort for MockPriceData {
    fn get_bars(&self, symbol: &str) -> Result<Vec<OhlcvBar>, EodTraderError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(EodTraderError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: reason.clone(),
            });
        }
        self.data
            .get(symbol)
            .cloned()
            .ok_or_else(|| EodTraderError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: "not in mock".into(),
            })
    }
}

#[derive(Default)]
pub struct MemoryPositionStore {
    pub book: RefCell<PositionBook>,
    pub saved_at: RefCell<Option<DateTime<Utc>>>,
    pub loads: Cell<usize>,
    pub saves: Cell<usize>,
}

impl MemoryPositionStore {
    pub fn with_positions(book: PositionBook) -> Self {
        Self {
            book: RefCell::new(book),
            ..Self::default()
        }
    }

    pub fn current(&self) -> PositionBook {
        self.book.borrow().clone()
    }
}

impl PositionStorePort for MemoryPositionStore {
    fn load(&self) -> Result<PositionBook, EodTraderError> {
        self.loads.set(self.loads.get() + 1);
        Ok(self.book.borrow().clone())
    }

    fn save(&self, positions: &PositionBook) -> Result<(), EodTraderError> {
        self.saves.set(self.saves.get() + 1);
        *self.book.borrow_mut() = positions.clone();
        *self.saved_at.borrow_mut() = Some(Utc::now());
        Ok(())
    }

    fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        *self.saved_at.borrow()
    }
}

#[derive(Default)]
pub struct MemoryAudit {
    pub records: RefCell<Vec<AuditRecord>>,
}

impl MemoryAudit {
    pub fn kinds(&self) -> Vec<AuditKind> {
        self.records.borrow().iter().map(|r| r.kind).collect()
    }
}

impl AuditPort for MemoryAudit {
    fn log(&self, kind: AuditKind, data: Value) -> Result<AuditRecord, EodTraderError> {
        let record = AuditRecord::new(kind, data, Utc::now());
        self.records.borrow_mut().push(record.clone());
        Ok(record)
    }
}

/// Audit log that rejects one record kind and keeps the rest.
pub struct FailingAudit {
    pub fail_on: AuditKind,
    pub inner: MemoryAudit,
}

impl FailingAudit {
    pub fn on(kind: AuditKind) -> Self {
        Self {
            fail_on: kind,
            inner: MemoryAudit::default(),
        }
    }
}

impl AuditPort for FailingAudit {
    fn log(&self, kind: AuditKind, data: Value) -> Result<AuditRecord, EodTraderError> {
        if kind == self.fail_on {
            return Err(EodTraderError::Persistence {
                path: "audit/ledger.jsonl".into(),
                reason: "disk full".into(),
            });
        }
        self.inner.log(kind, data)
    }
}

#[derive(Default)]
pub struct MemoryJournal {
    pub records: RefCell<Vec<FillRecord>>,
}

impl MemoryJournal {
    pub fn with_records(records: Vec<FillRecord>) -> Self {
        Self {
            records: RefCell::new(records),
        }
    }
}

impl FillJournalPort for MemoryJournal {
    fn append(&self, record: &FillRecord) -> Result<(), EodTraderError> {
        self.records.borrow_mut().push(record.clone());
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<FillRecord>, EodTraderError> {
        Ok(self.records.borrow().clone())
    }
}

#[derive(Default)]
pub struct MemoryHistory {
    pub rows: RefCell<Vec<RunSummary>>,
}

impl RunHistoryPort for MemoryHistory {
    fn append(&self, summary: &RunSummary) -> Result<(), EodTraderError> {
        self.rows.borrow_mut().push(summary.clone());
        Ok(())
    }
}

/// Dry-run broker that records what it was asked to place.
#[derive(Default)]
pub struct RecordingBroker {
    pub placed: RefCell<Vec<OrderIntent>>,
}

impl BrokerPort for RecordingBroker {
    fn place_orders(&self, intents: &[OrderIntent]) -> Result<Vec<OrderResult>, EodTraderError> {
        self.placed.borrow_mut().extend_from_slice(intents);
        Ok(intents
            .iter()
            .map(|it| OrderResult::DryRun {
                payload: OrderPayload::from_intent(it),
            })
            .collect())
    }
}

pub struct FailingBroker;

impl BrokerPort for FailingBroker {
    fn place_orders(&self, _intents: &[OrderIntent]) -> Result<Vec<OrderResult>, EodTraderError> {
        Err(EodTraderError::Broker {
            reason: "connection refused".into(),
        })
    }
}

#[derive(Default)]
pub struct MemoryNotifier {
    pub messages: RefCell<Vec<String>>,
}

impl NotifierPort for MemoryNotifier {
    fn send(&self, text: &str) -> Result<(), EodTraderError> {
        self.messages.borrow_mut().push(text.to_string());
        Ok(())
    }
}

pub struct FailingNotifier;

impl NotifierPort for FailingNotifier {
    fn send(&self, _text: &str) -> Result<(), EodTraderError> {
        Err(EodTraderError::Notify {
            reason: "chat unreachable".into(),
        })
    }
}

/// Every collaborator a cycle needs, in memory.
#[derive(Default)]
pub struct Harness {
    pub positions: MemoryPositionStore,
    pub audit: MemoryAudit,
    pub journal: MemoryJournal,
    pub history: MemoryHistory,
    pub broker: RecordingBroker,
    pub notifier: MemoryNotifier,
}

impl Harness {
    pub fn ports<'a>(&'a self, prices: &'a dyn PriceDataPort) -> CyclePorts<'a> {
        CyclePorts {
            prices,
            positions: &self.positions,
            audit: &self.audit,
            journal: &self.journal,
            history: &self.history,
            broker: &self.broker,
            notifier: &self.notifier,
        }
    }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// Daily bars starting 2024-01-01 on a straight line with a small zig-zag and
/// a ±2 high/low range.
pub fn trending_bars(symbol: &str, n: usize, start: f64, step: f64) -> Vec<OhlcvBar> {
    let first = date("2024-01-01");
    (0..n)
        .map(|i| {
            let close = start + i as f64 * step + if i % 2 == 0 { 0.1 } else { -0.1 };
            OhlcvBar {
                symbol: symbol.to_string(),
                date: first + Duration::days(i as i64),
                open: close,
                high: close + 2.0,
                low: close - 2.0,
                close,
                volume: 1_000_000,
            }
        })
        .collect()
}

pub const BARS: usize = 260;

/// QQQ rising steadily, PSQ drifting down: a clean bull regime.
pub fn bull_market() -> MockPriceData {
    MockPriceData::new()
        .with_bars("QQQ", trending_bars("QQQ", BARS, 100.0, 0.5))
        .with_bars("PSQ", trending_bars("PSQ", BARS, 50.0, -0.05))
}

pub fn last_bar_date() -> NaiveDate {
    date("2024-01-01") + Duration::days(BARS as i64 - 1)
}

/// Turnover cap off so one cycle reaches the allocator's target.
pub fn uncapped_config() -> EngineConfig {
    let mut cfg = EngineConfig::default();
    cfg.turnover.max_turnover_frac = 0.0;
    cfg
}

pub fn inputs() -> CycleInputs {
    CycleInputs {
        as_of: last_bar_date(),
        now: Utc::now(),
        equity: Dollars(25_000.0),
        vix: None,
        minutes_to_close: 10,
        emergency_override: false,
        kill_switch_engaged: false,
        config_fingerprint: "0123456789abcdef".into(),
    }
}

pub fn write_csv(dir: &std::path::Path, bars: &[OhlcvBar]) {
    let mut out = String::from("date,open,high,low,close,volume\n");
    for b in bars {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            b.date, b.open, b.high, b.low, b.close, b.volume
        ));
    }
    let symbol = &bars[0].symbol;
    std::fs::write(dir.join(format!("{}.csv", symbol)), out).unwrap();
}
