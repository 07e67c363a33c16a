//! Broker-facing order payloads and submission results.

use serde::{Deserialize, Serialize};

use crate::domain::order::{OrderIntent, OrderType, TimeInForce};

fn round6(x: f64) -> f64 {
    (x * 1e6).round() / 1e6
}

/// Wire shape of a single order request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPayload {
    pub symbol: String,
    pub qty: f64,
    /// "buy" | "sell"
    pub side: String,
    /// "day" | "cls"
    pub time_in_force: String,
    #[serde(rename = "type")]
    pub order_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<f64>,
}

impl OrderPayload {
    /// Market-on-close goes out as `type=market` with `time_in_force=cls`;
    /// limits carry their limit price.
    pub fn from_intent(intent: &OrderIntent) -> Self {
        let (order_type, time_in_force) = match intent.order_type {
            OrderType::MarketOnClose => ("market".to_string(), TimeInForce::Cls),
            other => (other.to_string(), intent.time_in_force),
        };
        let limit_price = match intent.order_type {
            OrderType::Limit => intent.limit_price,
            _ => None,
        };
        Self {
            symbol: intent.instrument.clone(),
            qty: round6(intent.quantity.value()),
            side: intent.side.as_lower().to_string(),
            time_in_force: time_in_force.to_string(),
            order_type,
            limit_price,
        }
    }
}

/// Outcome of submitting one intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OrderResult {
    /// Dry run: the payload that would have been sent.
    DryRun { payload: OrderPayload },
    Accepted {
        broker_id: String,
        payload: OrderPayload,
    },
    Rejected {
        payload: OrderPayload,
        reason: String,
    },
}

impl OrderResult {
    pub fn payload(&self) -> &OrderPayload {
        match self {
            OrderResult::DryRun { payload }
            | OrderResult::Accepted { payload, .. }
            | OrderResult::Rejected { payload, .. } => payload,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, OrderResult::Rejected { .. })
    }
}
