//! Price data port trait.

use crate::domain::error::EodTraderError;
use crate::domain::ohlcv::OhlcvBar;

pub trait PriceDataPort {
    /// Date-ordered daily bars for `symbol`; `DataUnavailable` when there is
    /// no cached or fetched series.
    fn get_bars(&self, symbol: &str) -> Result<Vec<OhlcvBar>, EodTraderError>;
}
