//! Position store port trait.

use chrono::{DateTime, Utc};

use crate::domain::error::EodTraderError;
use crate::domain::position::PositionBook;

/// Single-writer store for the position book. `save` replaces atomically.
pub trait PositionStorePort {
    /// An empty book when nothing has been saved yet.
    fn load(&self) -> Result<PositionBook, EodTraderError>;
    fn save(&self, positions: &PositionBook) -> Result<(), EodTraderError>;
    /// When the stored book was last written, if known.
    fn last_saved_at(&self) -> Option<DateTime<Utc>>;
}
