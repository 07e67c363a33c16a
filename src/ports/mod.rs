//! Port traits: the boundary between the decision engine and the outside world.

pub mod audit_port;
pub mod broker_port;
pub mod config_port;
pub mod data_port;
pub mod fill_journal_port;
pub mod history_port;
pub mod notify_port;
pub mod position_port;
