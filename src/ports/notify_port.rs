//! Notification port trait.

use crate::domain::error::EodTraderError;

pub trait NotifierPort {
    fn send(&self, text: &str) -> Result<(), EodTraderError>;
}
