//! Run history port trait.

use crate::domain::decision::RunSummary;
use crate::domain::error::EodTraderError;

pub trait RunHistoryPort {
    fn append(&self, summary: &RunSummary) -> Result<(), EodTraderError>;
}
