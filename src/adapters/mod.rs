//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod dry_run_broker;
pub mod file_config_adapter;
pub mod json_position_store;
pub(crate) mod jsonl;
pub mod jsonl_audit_ledger;
pub mod jsonl_fill_journal;
pub mod jsonl_run_history;
pub mod kill_switch;
pub mod log_notifier;
