//! Broker that never submits: each intent comes back as the payload that
//! would have been sent.

use tracing::info;

use crate::domain::broker::{OrderPayload, OrderResult};
use crate::domain::error::EodTraderError;
use crate::domain::order::OrderIntent;
use crate::ports::broker_port::BrokerPort;

#[derive(Debug, Default)]
pub struct DryRunBroker;

impl DryRunBroker {
    pub fn new() -> Self {
        Self
    }
}

impl BrokerPort for DryRunBroker {
    fn place_orders(&self, intents: &[OrderIntent]) -> Result<Vec<OrderResult>, EodTraderError> {
        Ok(intents
            .iter()
            .map(|it| {
                let payload = OrderPayload::from_intent(it);
                info!(
                    "[DRY-RUN] {} {} {} type={} tif={} limit={:?}",
                    payload.side,
                    payload.qty,
                    payload.symbol,
                    payload.order_type,
                    payload.time_in_force,
                    payload.limit_price
                );
                OrderResult::DryRun { payload }
            })
            .collect())
    }
}
