//! Append-only JSONL fill journal.

use std::path::PathBuf;

use crate::adapters::jsonl::{append_line, read_lines};
use crate::domain::error::EodTraderError;
use crate::domain::execution::FillRecord;
use crate::ports::fill_journal_port::FillJournalPort;

pub struct JsonlFillJournal {
    path: PathBuf,
}

impl JsonlFillJournal {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl FillJournalPort for JsonlFillJournal {
    fn append(&self, record: &FillRecord) -> Result<(), EodTraderError> {
        append_line(&self.path, record)
    }

    fn read_all(&self) -> Result<Vec<FillRecord>, EodTraderError> {
        read_lines(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::execution::FillStatus;
    use chrono::{DateTime, Utc};
    use std::fs::OpenOptions;
    use std::io::Write;
    use tempfile::TempDir;

    fn record(sym: &str, qty: f64) -> FillRecord {
        FillRecord {
            ts: DateTime::parse_from_rfc3339("2025-10-17T20:05:00Z")
                .unwrap()
                .with_timezone(&Utc),
            symbol: sym.into(),
            side: "buy".into(),
            qty,
            status: FillStatus::Filled,
            filled_qty: Some(qty),
            broker_id: Some("abc-1".into()),
            session: None,
        }
    }

    #[test]
    fn round_trips_and_skips_malformed_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trading/fills_state.jsonl");
        let journal = JsonlFillJournal::new(path.clone());

        journal.append(&record("QQQ", 10.0)).unwrap();
        writeln!(OpenOptions::new().append(true).open(&path).unwrap(), "{{\"ts\": 5}}").unwrap();
        journal.append(&record("PSQ", 4.0)).unwrap();

        let all = journal.read_all().unwrap();
        assert_eq!(all, vec![record("QQQ", 10.0), record("PSQ", 4.0)]);
    }
}
