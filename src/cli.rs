//! CLI definition and dispatch.

use chrono::{Local, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::dry_run_broker::DryRunBroker;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_position_store::JsonPositionStore;
use crate::adapters::jsonl_audit_ledger::JsonlAuditLedger;
use crate::adapters::jsonl_fill_journal::JsonlFillJournal;
use crate::adapters::jsonl_run_history::JsonlRunHistory;
use crate::adapters::kill_switch::KillSwitchFile;
use crate::adapters::log_notifier::LogNotifier;
use crate::domain::allocator::AllocatorConfig;
use crate::domain::cadence::CadenceConfig;
use crate::domain::calendar::ScheduleConfig;
use crate::domain::config_validation::{parse_date_list, validate_engine_config};
use crate::domain::cycle::{CycleInputs, CyclePorts, EngineConfig, run_daily_cycle};
use crate::domain::error::EodTraderError;
use crate::domain::guardrails::ExposureLimits;
use crate::domain::instrument::InstrumentConfig;
use crate::domain::order::{PlannerConfig, SizeConstraints};
use crate::domain::reconcile::effective_positions_before;
use crate::domain::risk::RiskConfig;
use crate::domain::turnover::{TurnoverConfig, TurnoverMode};
use crate::domain::units::Dollars;
use crate::ports::broker_port::BrokerPort;
use crate::ports::config_port::ConfigPort;
use crate::ports::fill_journal_port::FillJournalPort;
use crate::ports::position_port::PositionStorePort;

#[derive(Parser, Debug)]
#[command(name = "eodtrader", about = "End-of-day long/inverse exposure decision engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one daily decision cycle
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Account equity; overrides [run] equity
        #[arg(long)]
        equity: Option<f64>,
        /// Current VIX level; overrides [run] vix
        #[arg(long)]
        vix: Option<f64>,
        /// Minutes until the session close
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        minutes_to_close: i64,
        /// Session date, YYYY-MM-DD (default: today)
        #[arg(long)]
        as_of: Option<NaiveDate>,
        /// Use market instead of limit orders outside the MOC window
        #[arg(long)]
        emergency: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Print the effective stored positions
    Positions {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Engage, release or inspect the kill switch
    KillSwitch {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(value_enum)]
        action: SwitchAction,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwitchAction {
    On,
    Off,
    Status,
}

/// Price cache location and freshness.
#[derive(Debug, Clone, PartialEq)]
pub struct DataConfig {
    pub cache_dir: PathBuf,
    pub max_staleness_days: i64,
}

/// Where state and ledgers live.
#[derive(Debug, Clone, PartialEq)]
pub struct StateConfig {
    pub positions_path: PathBuf,
    pub audit_dir: PathBuf,
    pub fills_journal: PathBuf,
    pub run_history: PathBuf,
    pub kill_switch: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrokerConfig {
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub data: DataConfig,
    pub state: StateConfig,
    pub broker: BrokerConfig,
    pub equity: f64,
    pub vix: Option<f64>,
}

/// Install the fmt subscriber on stderr; `RUST_LOG` overrides the `info` default.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Run {
            config,
            equity,
            vix,
            minutes_to_close,
            as_of,
            emergency,
        } => run_cycle(&config, equity, vix, minutes_to_close, as_of, emergency),
        Command::Validate { config } => run_validate(&config),
        Command::Positions { config } => run_positions(&config),
        Command::KillSwitch { config, action } => run_kill_switch(&config, action),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|err| {
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn usize_of(adapter: &dyn ConfigPort, section: &str, key: &str, default: usize) -> usize {
    adapter.get_int(section, key, default as i64).max(0) as usize
}

fn path_of(adapter: &dyn ConfigPort, section: &str, key: &str, default: &str) -> PathBuf {
    PathBuf::from(
        adapter
            .get_string(section, key)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| default.to_string()),
    )
}

pub fn build_engine_config(adapter: &dyn ConfigPort) -> Result<EngineConfig, EodTraderError> {
    let instruments = InstrumentConfig {
        underlier: adapter
            .get_string("instruments", "underlier")
            .unwrap_or_else(|| "QQQ".into()),
        long: adapter
            .get_string("instruments", "long")
            .unwrap_or_else(|| "QQQ".into()),
        inverse: adapter
            .get_string("instruments", "short")
            .unwrap_or_else(|| "PSQ".into()),
    };

    let event_window = (
        adapter.get_int("schedule", "event_window_before", -1),
        adapter.get_int("schedule", "event_window_after", 1),
    );

    let risk = RiskConfig {
        risk_budget_pct: adapter.get_double("risk", "risk_budget_pct", 0.015),
        atr_len: usize_of(adapter, "risk", "atr_len", 14),
        max_position_pct: adapter.get_double("risk", "max_position_pct", 0.60),
        vix_soft: adapter.get_double("risk", "vix_soft", 25.0),
        vix_hard: adapter.get_double("risk", "vix_hard", 35.0),
        realized_vol_20d_max: adapter.get_double("risk", "realized_vol_20d_max", 0.40),
        realized_vol_soft: adapter.get_double("risk", "realized_vol_soft", 0.25),
        trend_vix_max: adapter.get_double("risk", "trend_vix_max", 30.0),
        trend_vol_50d_max: adapter.get_double("risk", "trend_vol_50d_max", 0.40),
        event_window,
    };

    let allocator = AllocatorConfig {
        fast_ma: usize_of(adapter, "allocator", "fast_ma", 20),
        slow_ma: usize_of(adapter, "allocator", "slow_ma", 200),
        extension_factor: adapter.get_double("allocator", "extension_factor", 2.0),
        bb_period: usize_of(adapter, "allocator", "bb_period", 20),
        bb_std: adapter.get_double("allocator", "bb_std", 2.0),
        base_risk: adapter.get_double("allocator", "base_risk", 0.85),
        max_exposure: adapter.get_double("allocator", "max_exposure", 1.0),
        min_exposure: adapter.get_double("allocator", "min_exposure", 0.0),
        momentum_boost: adapter.get_double("allocator", "momentum_boost", 1.30),
        momentum_requires_close_above_fast: adapter.get_bool(
            "allocator",
            "momentum_requires_close_above_fast",
            true,
        ),
        momentum_requires_slope_up: adapter.get_bool(
            "allocator",
            "momentum_requires_slope_up",
            true,
        ),
        vol_dampener: adapter.get_bool("allocator", "vol_dampener", true),
        vol_lookback: usize_of(adapter, "allocator", "vol_lookback", 20),
        vol_cap: adapter.get_double("allocator", "vol_cap", 0.25),
        vol_floor_scale: adapter.get_double("allocator", "vol_floor_scale", 0.60),
    };

    let limits = ExposureLimits {
        max_gross: adapter.get_double("limits", "max_gross", 1.0),
        max_long: adapter.get_double("limits", "max_long", 1.0),
        max_short: adapter.get_double("limits", "max_short", 1.0),
    };

    let mode = match adapter.get_string("turnover", "mode") {
        Some(m) => m
            .parse::<TurnoverMode>()
            .map_err(|reason| EodTraderError::ConfigInvalid {
                section: "turnover".into(),
                key: "mode".into(),
                reason,
            })?,
        None => TurnoverMode::Clamp,
    };
    let turnover = TurnoverConfig {
        max_turnover_frac: adapter.get_double("turnover", "max_turnover_frac", 0.15),
        mode,
    };

    let cadence = CadenceConfig {
        min_days_between_trades: adapter.get_int("cadence", "min_days_between_trades", 0),
        min_exposure_delta: adapter.get_double("cadence", "min_exposure_delta", 0.0),
    };

    let planner = PlannerConfig {
        min_trade_value: adapter.get_double("planner", "min_trade_value", 200.0),
        moc_window_minutes: adapter.get_int("planner", "moc_window_minutes", 30),
        limit_offset_pct: adapter.get_double("planner", "limit_offset_pct", 0.005),
        close_dust_shares: adapter.get_double("planner", "close_dust_shares", 1.0),
        min_open_notional: adapter.get_double("planner", "min_open_notional", 200.0),
        prefer_single_leg: adapter.get_bool("planner", "prefer_single_leg", true),
    };

    let constraints = SizeConstraints {
        lot_size: adapter.get_int("constraints", "lot_size", 1).max(1) as u32,
        min_qty: adapter.get_double("constraints", "min_qty", 1.0),
        qty_precision: adapter.get_int("constraints", "qty_precision", 0).clamp(0, 8) as u32,
        min_notional: adapter.get_double("constraints", "min_notional", 200.0),
    };

    let schedule = ScheduleConfig {
        eod_window_minutes: adapter.get_int("schedule", "eod_window_minutes", 30),
        allow_early_override: adapter.get_bool("schedule", "allow_early_override", false),
        event_dates: parse_date_list(adapter, "schedule", "event_dates")?,
        event_window,
        opex_caution: adapter.get_bool("schedule", "opex_caution", true),
        opex_overrides: parse_date_list(adapter, "schedule", "opex_overrides")?,
    };

    Ok(EngineConfig {
        instruments,
        risk,
        allocator,
        limits,
        turnover,
        cadence,
        planner,
        constraints,
        schedule,
        max_staleness_days: adapter.get_int("data", "max_staleness_days", 3),
    })
}

pub fn build_app_config(adapter: &dyn ConfigPort) -> Result<AppConfig, EodTraderError> {
    let engine = build_engine_config(adapter)?;
    Ok(AppConfig {
        data: DataConfig {
            cache_dir: path_of(adapter, "data", "cache_dir", "data/cache"),
            max_staleness_days: engine.max_staleness_days,
        },
        state: StateConfig {
            positions_path: path_of(adapter, "state", "positions_path", "data/state/positions.json"),
            audit_dir: path_of(adapter, "state", "audit_dir", "logs/audit"),
            fills_journal: path_of(
                adapter,
                "state",
                "fills_journal",
                "logs/trading/fills_state.jsonl",
            ),
            run_history: path_of(adapter, "state", "run_history", "logs/audit/run_history.jsonl"),
            kill_switch: path_of(adapter, "state", "kill_switch", "config/kill_switch.flag"),
        },
        broker: BrokerConfig {
            dry_run: adapter.get_bool("broker", "dry_run", true),
        },
        equity: adapter.get_double("run", "equity", 25_000.0),
        vix: adapter.get_optional_double("run", "vix"),
        engine,
    })
}

/// Load, validate and build in one step.
fn prepare(config_path: &PathBuf) -> Result<(FileConfigAdapter, AppConfig), ExitCode> {
    let adapter = load_config(config_path)?;
    let app = validate_engine_config(&adapter)
        .and_then(|()| build_app_config(&adapter))
        .map_err(|e| {
            eprintln!("error: {e}");
            ExitCode::from(&e)
        })?;
    Ok((adapter, app))
}

fn run_cycle(
    config_path: &PathBuf,
    equity: Option<f64>,
    vix: Option<f64>,
    minutes_to_close: i64,
    as_of: Option<NaiveDate>,
    emergency: bool,
) -> ExitCode {
    let (adapter, app) = match prepare(config_path) {
        Ok(v) => v,
        Err(code) => return code,
    };

    let equity = equity.unwrap_or(app.equity);
    if !equity.is_finite() || equity <= 0.0 {
        let err = EodTraderError::ConfigInvalid {
            section: "run".into(),
            key: "equity".into(),
            reason: "equity must be positive".into(),
        };
        eprintln!("error: {err}");
        return (&err).into();
    }

    let prices = CsvAdapter::new(app.data.cache_dir.clone());
    let positions = JsonPositionStore::new(app.state.positions_path.clone());
    let audit = JsonlAuditLedger::new(app.state.audit_dir.clone());
    let journal = JsonlFillJournal::new(app.state.fills_journal.clone());
    let history = JsonlRunHistory::new(app.state.run_history.clone());
    let broker = DryRunBroker::new();
    let notifier = LogNotifier;
    let kill_switch = KillSwitchFile::new(app.state.kill_switch.clone());

    let ports = CyclePorts {
        prices: &prices,
        positions: &positions,
        audit: &audit,
        journal: &journal,
        history: &history,
        broker: &broker,
        notifier: &notifier,
    };
    let inputs = CycleInputs {
        as_of: as_of.unwrap_or_else(|| Local::now().date_naive()),
        now: Utc::now(),
        equity: Dollars(equity),
        vix: vix.or(app.vix),
        minutes_to_close,
        emergency_override: emergency,
        kill_switch_engaged: kill_switch.is_engaged(),
        config_fingerprint: adapter.fingerprint().to_string(),
    };

    match run_daily_cycle(&ports, &app.engine, &inputs) {
        Ok(record) => match serde_json::to_string_pretty(&record) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                let err = EodTraderError::persistence("stdout", e);
                eprintln!("error: {err}");
                (&err).into()
            }
        },
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let (adapter, app) = match prepare(config_path) {
        Ok(v) => v,
        Err(code) => return code,
    };

    let instr = &app.engine.instruments;
    eprintln!("  fingerprint: {}", adapter.fingerprint());
    eprintln!(
        "  instruments: underlier={} long={} short={}",
        instr.underlier, instr.long, instr.inverse
    );
    eprintln!("  equity:      {:.2}", app.equity);
    eprintln!(
        "  turnover:    {} (cap {:.2})",
        app.engine.turnover.mode, app.engine.turnover.max_turnover_frac
    );
    eprintln!(
        "  schedule:    window {}m, {} event date(s)",
        app.engine.schedule.eod_window_minutes,
        app.engine.schedule.event_dates.len()
    );
    eprintln!("  cache_dir:   {}", app.data.cache_dir.display());
    eprintln!("  positions:   {}", app.state.positions_path.display());
    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

fn run_positions(config_path: &PathBuf) -> ExitCode {
    let (_adapter, app) = match prepare(config_path) {
        Ok(v) => v,
        Err(code) => return code,
    };

    let store = JsonPositionStore::new(app.state.positions_path.clone());
    let journal = JsonlFillJournal::new(app.state.fills_journal.clone());
    let broker = DryRunBroker::new();

    let loaded = store.load().and_then(|raw| Ok((raw, journal.read_all()?)));
    let (raw, fills) = match loaded {
        Ok(v) => v,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let snapshot = broker.positions_snapshot();
    let (effective, source) =
        effective_positions_before(&raw, snapshot.as_ref(), &fills, store.last_saved_at());

    eprintln!("Positions ({source}) from {}", app.state.positions_path.display());
    match serde_json::to_string_pretty(&effective) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            let err = EodTraderError::persistence("stdout", e);
            eprintln!("error: {err}");
            (&err).into()
        }
    }
}

fn run_kill_switch(config_path: &PathBuf, action: SwitchAction) -> ExitCode {
    let (_adapter, app) = match prepare(config_path) {
        Ok(v) => v,
        Err(code) => return code,
    };
    let switch = KillSwitchFile::new(app.state.kill_switch.clone());

    let result = match action {
        SwitchAction::On => switch.engage(),
        SwitchAction::Off => switch.release(),
        SwitchAction::Status => Ok(()),
    };
    if let Err(e) = result {
        eprintln!("error: {e}");
        return (&e).into();
    }

    let state = if switch.is_engaged() { "ENGAGED" } else { "off" };
    println!("kill switch: {} ({})", state, switch.path().display());
    ExitCode::SUCCESS
}
