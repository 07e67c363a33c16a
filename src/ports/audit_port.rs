//! Audit ledger port trait.

use serde_json::Value;

use crate::domain::audit::{AuditKind, AuditRecord};
use crate::domain::error::EodTraderError;

pub trait AuditPort {
    /// Stamp, hash and append one record.
    fn log(&self, kind: AuditKind, data: Value) -> Result<AuditRecord, EodTraderError>;
}
