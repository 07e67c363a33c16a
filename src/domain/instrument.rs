//! The traded instrument pair and per-side weights.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::units::{Shares, Weight};

/// Symbols are stored and compared upper-cased.
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_ascii_uppercase()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentConfig {
    /// Series that drives regime, signals and allocation.
    pub underlier: String,
    /// Long-biased instrument of the execution pair.
    pub long: String,
    /// Inverse instrument; held long to express a short bias, never shorted.
    pub inverse: String,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            underlier: "QQQ".into(),
            long: "QQQ".into(),
            inverse: "PSQ".into(),
        }
    }
}

impl InstrumentConfig {
    pub fn symbol(&self, leg: Leg) -> &str {
        match leg {
            Leg::Long => &self.long,
            Leg::Inverse => &self.inverse,
        }
    }

    pub fn leg_of(&self, symbol: &str) -> Option<Leg> {
        let sym = normalize_symbol(symbol);
        if sym == normalize_symbol(&self.long) {
            Some(Leg::Long)
        } else if sym == normalize_symbol(&self.inverse) {
            Some(Leg::Inverse)
        } else {
            None
        }
    }

    pub fn is_inverse(&self, symbol: &str) -> bool {
        self.leg_of(symbol) == Some(Leg::Inverse)
    }

    /// Distinct symbols whose price series the cycle needs.
    pub fn all_symbols(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::with_capacity(3);
        for s in [&self.underlier, &self.long, &self.inverse] {
            let s = normalize_symbol(s);
            if !out.contains(&s) {
                out.push(s);
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Leg {
    Long,
    Inverse,
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Leg::Long => write!(f, "long"),
            Leg::Inverse => write!(f, "inverse"),
        }
    }
}

/// Fractions of equity held in each leg of the pair.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PairWeights {
    pub long: Weight,
    pub short: Weight,
}

impl PairWeights {
    pub const FLAT: PairWeights = PairWeights {
        long: Weight::ZERO,
        short: Weight::ZERO,
    };

    pub fn new(long: f64, short: f64) -> Self {
        Self {
            long: Weight(long),
            short: Weight(short),
        }
    }

    pub fn get(&self, leg: Leg) -> Weight {
        match leg {
            Leg::Long => self.long,
            Leg::Inverse => self.short,
        }
    }

    pub fn gross(&self) -> Weight {
        Weight(self.long.0.abs() + self.short.0.abs())
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            long: self.long * factor,
            short: self.short * factor,
        }
    }

    /// Largest absolute component, used by the minimum-delta filter.
    pub fn max_abs(&self) -> Weight {
        Weight(self.long.0.abs().max(self.short.0.abs()))
    }
}

impl fmt::Display for PairWeights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "long={:.2} short={:.2}", self.long.0, self.short.0)
    }
}

/// Last price per leg. Missing prices are NaN and contribute nothing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairPrices {
    pub long: f64,
    pub short: f64,
}

impl PairPrices {
    pub fn get(&self, leg: Leg) -> f64 {
        match leg {
            Leg::Long => self.long,
            Leg::Inverse => self.short,
        }
    }
}

/// Shares currently held in each leg.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PairShares {
    pub long: Shares,
    pub short: Shares,
}

impl PairShares {
    pub fn get(&self, leg: Leg) -> Shares {
        match leg {
            Leg::Long => self.long,
            Leg::Inverse => self.short,
        }
    }
}
