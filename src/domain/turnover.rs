//! Turnover governor and exposure-delta helpers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::domain::instrument::{PairPrices, PairShares, PairWeights};
use crate::domain::units::Dollars;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnoverMode {
    /// Move partway toward the target.
    Clamp,
    /// Hold current exposure.
    Skip,
}

impl FromStr for TurnoverMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clamp" => Ok(TurnoverMode::Clamp),
            "skip" => Ok(TurnoverMode::Skip),
            other => Err(format!("unknown turnover mode '{}'", other)),
        }
    }
}

impl fmt::Display for TurnoverMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnoverMode::Clamp => write!(f, "clamp"),
            TurnoverMode::Skip => write!(f, "skip"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnoverConfig {
    /// Maximum turnover as a fraction of equity; <= 0 disables the cap.
    pub max_turnover_frac: f64,
    pub mode: TurnoverMode,
}

impl Default for TurnoverConfig {
    fn default() -> Self {
        Self {
            max_turnover_frac: 0.15,
            mode: TurnoverMode::Clamp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TurnoverAction {
    Unlimited,
    WithinCap,
    Skipped,
    Clamped { scale: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnoverOutcome {
    pub weights: PairWeights,
    pub desired_long_mv: Dollars,
    pub desired_short_mv: Dollars,
    pub turnover_frac: f64,
    pub action: TurnoverAction,
    pub note: String,
}

/// Current market value per leg; bad prices count as zero.
pub fn current_market_values(shares: &PairShares, prices: &PairPrices) -> (Dollars, Dollars) {
    (
        shares.long.market_value(prices.long),
        shares.short.market_value(prices.short),
    )
}

pub fn enforce_turnover_cap(
    desired: PairWeights,
    shares: &PairShares,
    prices: &PairPrices,
    equity: Dollars,
    cfg: &TurnoverConfig,
) -> TurnoverOutcome {
    let (cur_long, cur_short) = current_market_values(shares, prices);
    let des_long = desired.long.to_dollars(equity);
    let des_short = desired.short.to_dollars(equity);

    let turnover = (des_long - cur_long).abs().value() + (des_short - cur_short).abs().value();
    let turnover_frac = if equity.value() > 0.0 {
        turnover / equity.value()
    } else {
        0.0
    };
    let cap = cfg.max_turnover_frac;

    let pass = |action, note: &str| TurnoverOutcome {
        weights: desired,
        desired_long_mv: des_long,
        desired_short_mv: des_short,
        turnover_frac,
        action,
        note: note.to_string(),
    };

    if cap <= 0.0 {
        return pass(TurnoverAction::Unlimited, "cap=0 → no limit");
    }
    if turnover_frac <= cap {
        return pass(TurnoverAction::WithinCap, "OK");
    }

    match cfg.mode {
        TurnoverMode::Skip => {
            warn!("Turnover cap hit: {:.3}>{:.3} → SKIP", turnover_frac, cap);
            TurnoverOutcome {
                weights: PairWeights {
                    long: cur_long.to_weight(equity),
                    short: cur_short.to_weight(equity),
                },
                desired_long_mv: cur_long,
                desired_short_mv: cur_short,
                turnover_frac,
                action: TurnoverAction::Skipped,
                note: format!("turnover {:.3}>{:.3} -> skip", turnover_frac, cap),
            }
        }
        TurnoverMode::Clamp => {
            // turnover_frac > cap > 0 here, so scale < 1
            let scale = cap / turnover_frac;
            let new_long = cur_long + (des_long - cur_long) * scale;
            let new_short = cur_short + (des_short - cur_short) * scale;
            let note = format!("turnover {:.3}>{:.3} -> clamp×{:.3}", turnover_frac, cap, scale);
            warn!("Turnover cap applied: {}", note);
            TurnoverOutcome {
                weights: PairWeights {
                    long: new_long.to_weight(equity),
                    short: new_short.to_weight(equity),
                },
                desired_long_mv: new_long,
                desired_short_mv: new_short,
                turnover_frac,
                action: TurnoverAction::Clamped { scale },
                note,
            }
        }
    }
}

/// Weights implied by current holdings (shares × price / equity).
pub fn current_weights(shares: &PairShares, prices: &PairPrices, equity: Dollars) -> PairWeights {
    if equity.value() <= 0.0 {
        return PairWeights::FLAT;
    }
    let (long, short) = current_market_values(shares, prices);
    PairWeights {
        long: long.to_weight(equity),
        short: short.to_weight(equity),
    }
}

/// Per-side Δ = desired − previous.
pub fn exposure_delta(previous: &PairWeights, desired: &PairWeights) -> PairWeights {
    PairWeights {
        long: desired.long - previous.long,
        short: desired.short - previous.short,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{abs_diff_eq, assert_abs_diff_eq};
    use crate::domain::units::Shares;
    use proptest::prelude::*;

    fn prices() -> PairPrices {
        PairPrices {
            long: 400.0,
            short: 12.0,
        }
    }

    fn flat() -> PairShares {
        PairShares::default()
    }

    #[test]
    fn clamp_from_zero_to_full() {
        let cfg = TurnoverConfig {
            max_turnover_frac: 0.05,
            mode: TurnoverMode::Clamp,
        };
        let out = enforce_turnover_cap(
            PairWeights::new(1.0, 0.0),
            &flat(),
            &prices(),
            Dollars(25_000.0),
            &cfg,
        );
        let w = out.weights.long.value();
        assert!((0.049..=0.051).contains(&w), "weight {}", w);
        assert_abs_diff_eq!(out.turnover_frac, 1.0, epsilon = 1e-12);
        match out.action {
            TurnoverAction::Clamped { scale } => assert!(scale <= 1.0 && scale > 0.0),
            other => panic!("expected clamp, got {:?}", other),
        }
        assert_eq!(out.note, "turnover 1.000>0.050 -> clamp×0.050");
    }

    #[test]
    fn skip_holds_current() {
        let cfg = TurnoverConfig {
            max_turnover_frac: 0.05,
            mode: TurnoverMode::Skip,
        };
        let shares = PairShares {
            long: Shares(10.0),
            short: Shares::ZERO,
        };
        let out = enforce_turnover_cap(
            PairWeights::new(1.0, 0.0),
            &shares,
            &prices(),
            Dollars(25_000.0),
            &cfg,
        );
        assert_eq!(out.action, TurnoverAction::Skipped);
        assert_abs_diff_eq!(out.weights.long.value(), 0.16, epsilon = 1e-12);
        assert!(out.note.ends_with("-> skip"));
    }

    #[test]
    fn zero_cap_means_unlimited() {
        let cfg = TurnoverConfig {
            max_turnover_frac: 0.0,
            mode: TurnoverMode::Clamp,
        };
        let out = enforce_turnover_cap(
            PairWeights::new(1.0, 0.0),
            &flat(),
            &prices(),
            Dollars(25_000.0),
            &cfg,
        );
        assert_eq!(out.weights, PairWeights::new(1.0, 0.0));
        assert_eq!(out.note, "cap=0 → no limit");
    }

    #[test]
    fn nan_price_contributes_zero() {
        let shares = PairShares {
            long: Shares(10.0),
            short: Shares(100.0),
        };
        let p = PairPrices {
            long: 400.0,
            short: f64::NAN,
        };
        let out = enforce_turnover_cap(
            PairWeights::new(0.16, 0.0),
            &shares,
            &p,
            Dollars(25_000.0),
            &TurnoverConfig::default(),
        );
        assert!(out.turnover_frac.is_finite());
        assert_abs_diff_eq!(out.turnover_frac, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn mode_parsing() {
        assert_eq!("Clamp".parse::<TurnoverMode>(), Ok(TurnoverMode::Clamp));
        assert_eq!("skip".parse::<TurnoverMode>(), Ok(TurnoverMode::Skip));
        assert!("freeze".parse::<TurnoverMode>().is_err());
    }

    #[test]
    fn current_weights_and_delta() {
        let shares = PairShares {
            long: Shares(30.0),
            short: Shares::ZERO,
        };
        let cur = current_weights(&shares, &prices(), Dollars(25_000.0));
        assert_abs_diff_eq!(cur.long.value(), 0.48, epsilon = 1e-12);
        let d = exposure_delta(&cur, &PairWeights::new(0.0, 0.5));
        assert_abs_diff_eq!(d.long.value(), -0.48, epsilon = 1e-12);
        assert_abs_diff_eq!(d.short.value(), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(d.max_abs().value(), 0.5, epsilon = 1e-12);
        assert_eq!(current_weights(&shares, &prices(), Dollars(0.0)), PairWeights::FLAT);
    }

    proptest! {
        #[test]
        fn at_target_is_identity(
            long_sh in 0.0f64..100.0,
            short_sh in 0.0f64..1000.0,
            cap in 0.01f64..0.5,
        ) {
            let equity = Dollars(25_000.0);
            let shares = PairShares { long: Shares(long_sh), short: Shares(short_sh) };
            let desired = current_weights(&shares, &prices(), equity);
            let cfg = TurnoverConfig { max_turnover_frac: cap, mode: TurnoverMode::Clamp };
            let out = enforce_turnover_cap(desired, &shares, &prices(), equity, &cfg);
            prop_assert!(abs_diff_eq!(out.turnover_frac, 0.0, epsilon = 1e-9));
            prop_assert_eq!(out.weights, desired);
        }

        #[test]
        fn clamp_scale_never_exceeds_one(
            target in 0.0f64..1.0,
            cap in 0.001f64..0.5,
        ) {
            let cfg = TurnoverConfig { max_turnover_frac: cap, mode: TurnoverMode::Clamp };
            let out = enforce_turnover_cap(
                PairWeights::new(target, 0.0), &flat(), &prices(), Dollars(25_000.0), &cfg,
            );
            if let TurnoverAction::Clamped { scale } = out.action {
                prop_assert!(scale <= 1.0);
            }
            prop_assert!(out.weights.long.value() <= target + 1e-12);
        }
    }
}
