//! Core domain types and decision logic.

pub mod allocator;
pub mod audit;
pub mod broker;
pub mod cadence;
pub mod calendar;
pub mod coalesce;
pub mod config_validation;
pub mod cycle;
pub mod decision;
pub mod error;
pub mod execution;
pub mod guardrails;
pub mod indicator;
pub mod instrument;
pub mod ohlcv;
pub mod order;
pub mod position;
pub mod reconcile;
pub mod risk;
pub mod signal;
pub mod target;
pub mod turnover;
pub mod units;
