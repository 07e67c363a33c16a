//! Distinct unit types for portfolio quantities.
//!
//! Weights (fraction of equity), dollars (notional) and shares never mix
//! implicitly; every conversion names the price or equity it depends on.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

/// Fraction of account equity (1.0 = 100%).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Weight(pub f64);

/// Dollar notional.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dollars(pub f64);

/// Share count; signed where it represents a position.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Shares(pub f64);

impl Weight {
    pub const ZERO: Weight = Weight(0.0);

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn to_dollars(self, equity: Dollars) -> Dollars {
        Dollars(self.0 * equity.0)
    }

    pub fn clamp(self, lo: f64, hi: f64) -> Weight {
        Weight(self.0.max(lo).min(hi))
    }
}

impl Dollars {
    pub const ZERO: Dollars = Dollars(0.0);

    pub fn value(self) -> f64 {
        self.0
    }

    /// Weight of this notional against `equity`; zero when equity is not positive.
    pub fn to_weight(self, equity: Dollars) -> Weight {
        if equity.0 > 0.0 {
            Weight(self.0 / equity.0)
        } else {
            Weight::ZERO
        }
    }

    /// Shares bought by this notional at `price`; zero for an unusable price.
    pub fn to_shares(self, price: f64) -> Shares {
        if price.is_finite() && price > 0.0 {
            Shares(self.0 / price)
        } else {
            Shares(0.0)
        }
    }

    pub fn abs(self) -> Dollars {
        Dollars(self.0.abs())
    }
}

impl Shares {
    pub const ZERO: Shares = Shares(0.0);

    pub fn value(self) -> f64 {
        self.0
    }

    /// Market value at `price`; a missing or non-finite price contributes nothing.
    pub fn market_value(self, price: f64) -> Dollars {
        if price.is_finite() {
            Dollars(self.0 * price)
        } else {
            Dollars::ZERO
        }
    }

    pub fn abs(self) -> Shares {
        Shares(self.0.abs())
    }
}

macro_rules! impl_arith {
    ($t:ident) => {
        impl Add for $t {
            type Output = $t;
            fn add(self, rhs: $t) -> $t {
                $t(self.0 + rhs.0)
            }
        }

        impl Sub for $t {
            type Output = $t;
            fn sub(self, rhs: $t) -> $t {
                $t(self.0 - rhs.0)
            }
        }

        impl Mul<f64> for $t {
            type Output = $t;
            fn mul(self, rhs: f64) -> $t {
                $t(self.0 * rhs)
            }
        }

        impl Neg for $t {
            type Output = $t;
            fn neg(self) -> $t {
                $t(-self.0)
            }
        }
    };
}

impl_arith!(Weight);
impl_arith!(Dollars);
impl_arith!(Shares);

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}", self.0)
    }
}

impl fmt::Display for Dollars {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.2}", self.0)
    }
}

impl fmt::Display for Shares {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn dollars_to_shares_at_price() {
        assert_eq!(Dollars(12_000.0).to_shares(400.0), Shares(30.0));
        assert_eq!(Dollars(12_000.0).to_shares(0.0), Shares(0.0));
        assert_eq!(Dollars(12_000.0).to_shares(f64::NAN), Shares(0.0));
    }

    #[test]
    fn weight_dollar_round_trip() {
        let equity = Dollars(25_000.0);
        let w = Dollars(5_000.0).to_weight(equity);
        assert_abs_diff_eq!(w.value(), 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(w.to_dollars(equity).value(), 5_000.0, epsilon = 1e-9);
    }

    #[test]
    fn zero_equity_weight_is_zero() {
        assert_eq!(Dollars(100.0).to_weight(Dollars(0.0)), Weight::ZERO);
    }

    #[test]
    fn market_value_ignores_bad_price() {
        assert_eq!(Shares(10.0).market_value(f64::NAN), Dollars::ZERO);
        assert_eq!(Shares(-10.0).market_value(5.0), Dollars(-50.0));
    }

    #[test]
    fn arithmetic_stays_in_unit() {
        let w = Weight(0.5) - Weight(0.2) + Weight(0.1);
        assert_abs_diff_eq!(w.value(), 0.4, epsilon = 1e-12);
        assert_eq!(-Shares(3.0), Shares(-3.0));
        assert_eq!(Dollars(10.0) * 0.5, Dollars(5.0));
    }
}
