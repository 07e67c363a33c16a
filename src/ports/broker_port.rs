//! Broker execution port trait.

use crate::domain::broker::OrderResult;
use crate::domain::error::EodTraderError;
use crate::domain::order::OrderIntent;
use crate::domain::position::PositionBook;

pub trait BrokerPort {
    /// One result per intent. A transport-level failure is an `Err`; the
    /// caller turns it into rejected results.
    fn place_orders(&self, intents: &[OrderIntent]) -> Result<Vec<OrderResult>, EodTraderError>;

    /// Broker-reported positions, when the broker can provide them.
    fn positions_snapshot(&self) -> Option<PositionBook> {
        None
    }
}
