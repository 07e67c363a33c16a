//! Daily JSONL audit ledger, one file per block: `ledger_{YYYYMMDD}.jsonl`.

use chrono::Utc;
use serde_json::Value;
use std::path::PathBuf;
use tracing::debug;

use crate::adapters::jsonl::{append_line, read_lines};
use crate::domain::audit::{AuditKind, AuditRecord};
use crate::domain::error::EodTraderError;
use crate::ports::audit_port::AuditPort;

pub struct JsonlAuditLedger {
    dir: PathBuf,
}

impl JsonlAuditLedger {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn ledger_path(&self, block: &str) -> PathBuf {
        self.dir.join(format!("ledger_{}.jsonl", block))
    }

    /// Records for one block, in append order.
    pub fn read_block(&self, block: &str) -> Result<Vec<AuditRecord>, EodTraderError> {
        read_lines(&self.ledger_path(block))
    }
}

impl AuditPort for JsonlAuditLedger {
    fn log(&self, kind: AuditKind, data: Value) -> Result<AuditRecord, EodTraderError> {
        let record = AuditRecord::new(kind, data, Utc::now());
        append_line(&self.ledger_path(&record.block), &record)?;
        debug!("Audit {} {}", record.kind, record.tx_hash);
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn log_appends_verifiable_records() {
        let dir = TempDir::new().unwrap();
        let ledger = JsonlAuditLedger::new(dir.path().join("audit"));

        let first = ledger.log(AuditKind::Cfg, json!({"config_hash16": "abcd"})).unwrap();
        ledger.log(AuditKind::Plan, json!({"symbol": "QQQ", "qty": 30.0})).unwrap();

        let records = ledger.read_block(&first.block).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], first);
        assert_eq!(records[1].kind, AuditKind::Plan);
        assert!(records.iter().all(AuditRecord::verify));
    }
}
