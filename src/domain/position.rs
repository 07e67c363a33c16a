//! Signed per-instrument share positions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::instrument::{InstrumentConfig, Leg, PairShares, normalize_symbol};
use crate::domain::units::Shares;

/// Positions smaller than this are treated as closed and dropped.
pub const NEGLIGIBLE_SHARES: f64 = 1e-9;

/// Symbol → signed shares (positive = long). Keys are upper-case and no
/// near-zero entry is ever stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionBook {
    positions: BTreeMap<String, f64>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from raw pairs, normalising keys and dropping negligible entries.
    pub fn from_map<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        let mut book = Self::new();
        for (sym, qty) in entries {
            book.apply_delta(sym.as_ref(), qty);
        }
        book
    }

    pub fn get(&self, symbol: &str) -> Shares {
        Shares(
            self.positions
                .get(&normalize_symbol(symbol))
                .copied()
                .unwrap_or(0.0),
        )
    }

    /// Add a signed delta; removes the entry if the result is negligible.
    pub fn apply_delta(&mut self, symbol: &str, delta: f64) {
        if !delta.is_finite() {
            return;
        }
        let key = normalize_symbol(symbol);
        let next = self.positions.get(&key).copied().unwrap_or(0.0) + delta;
        if next.abs() < NEGLIGIBLE_SHARES {
            self.positions.remove(&key);
        } else {
            self.positions.insert(key, next);
        }
    }

    pub fn set(&mut self, symbol: &str, qty: f64) {
        let key = normalize_symbol(symbol);
        if !qty.is_finite() || qty.abs() < NEGLIGIBLE_SHARES {
            self.positions.remove(&key);
        } else {
            self.positions.insert(key, qty);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.positions.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn as_map(&self) -> &BTreeMap<String, f64> {
        &self.positions
    }

    /// Holdings in the two legs of the execution pair.
    pub fn pair_shares(&self, instruments: &InstrumentConfig) -> PairShares {
        PairShares {
            long: self.get(instruments.symbol(Leg::Long)),
            short: self.get(instruments.symbol(Leg::Inverse)),
        }
    }

    /// The single held instrument with the largest absolute position, if any.
    pub fn held_symbol(&self) -> Option<&str> {
        self.positions
            .iter()
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
            .map(|(k, _)| k.as_str())
    }
}
