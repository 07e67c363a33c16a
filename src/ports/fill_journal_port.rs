//! Fill journal port trait.

use crate::domain::error::EodTraderError;
use crate::domain::execution::FillRecord;

pub trait FillJournalPort {
    fn append(&self, record: &FillRecord) -> Result<(), EodTraderError>;
    /// All readable records; malformed lines are skipped.
    fn read_all(&self) -> Result<Vec<FillRecord>, EodTraderError>;
}
