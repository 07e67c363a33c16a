//! eodtrader: end-of-day decision engine for a long/inverse instrument pair.
//!
//! Hexagonal architecture: decision logic in [`domain`], port traits in
//! [`ports`], file-backed implementations in [`adapters`], and the
//! command-line front end in [`cli`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
