//! Per-side and gross exposure caps applied after allocation.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::instrument::PairWeights;

const CHANGE_EPS: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureLimits {
    pub max_gross: f64,
    pub max_long: f64,
    pub max_short: f64,
}

impl Default for ExposureLimits {
    fn default() -> Self {
        Self {
            max_gross: 1.0,
            max_long: 1.0,
            max_short: 1.0,
        }
    }
}

/// Clip negatives to zero, cap each side, then rescale both sides if their
/// sum exceeds the gross cap. Returns the capped weights and a note
/// (`"OK"` when nothing changed).
pub fn enforce_exposure_caps(
    weights: PairWeights,
    limits: &ExposureLimits,
    long_symbol: &str,
    short_symbol: &str,
) -> (PairWeights, String) {
    let mut long = weights.long.value().max(0.0);
    let mut short = weights.short.value().max(0.0);
    let (long0, short0) = (long, short);
    let mut notes: Vec<String> = Vec::new();

    if long > limits.max_long {
        long = limits.max_long;
        notes.push(format!("{} capped→{:.2}", long_symbol, limits.max_long));
    }
    if short > limits.max_short {
        short = limits.max_short;
        notes.push(format!("{} capped→{:.2}", short_symbol, limits.max_short));
    }

    let gross = long + short;
    if gross > limits.max_gross && gross > 0.0 {
        let scale = limits.max_gross / gross;
        long *= scale;
        short *= scale;
        notes.push(format!("gross scaled×{:.3}", scale));
    }

    let changed = (long - long0).abs() > CHANGE_EPS || (short - short0).abs() > CHANGE_EPS;
    let note = if changed {
        notes.join(" | ")
    } else {
        "OK".to_string()
    };
    if changed {
        info!("Exposure guardrails applied: {}", note);
    }

    (PairWeights::new(long, short), note)
}
