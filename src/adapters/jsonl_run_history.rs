//! JSONL run history, one summary line per cycle.

use std::path::PathBuf;

use crate::adapters::jsonl::{append_line, read_lines};
use crate::domain::decision::RunSummary;
use crate::domain::error::EodTraderError;
use crate::ports::history_port::RunHistoryPort;

pub struct JsonlRunHistory {
    path: PathBuf,
}

impl JsonlRunHistory {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn read_all(&self) -> Result<Vec<RunSummary>, EodTraderError> {
        read_lines(&self.path)
    }
}

impl RunHistoryPort for JsonlRunHistory {
    fn append(&self, summary: &RunSummary) -> Result<(), EodTraderError> {
        append_line(&self.path, summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::decision::{Breadcrumbs, DecisionRecord, NoOpReason};
    use crate::domain::position::PositionBook;
    use crate::domain::target::TargetExposure;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    #[test]
    fn appends_one_line_per_run() {
        let dir = TempDir::new().unwrap();
        let history = JsonlRunHistory::new(dir.path().join("audit/run_history.jsonl"));
        let crumbs = Breadcrumbs {
            kill_switch: true,
            no_op: true,
            no_op_reason: Some(NoOpReason::KillSwitch),
            ..Breadcrumbs::default()
        };
        let record = DecisionRecord::early_exit(
            NaiveDate::from_ymd_opt(2025, 10, 17).unwrap(),
            TargetExposure::flat("NA", "KILL"),
            PositionBook::new(),
            crumbs,
        );

        history.append(&RunSummary::from(&record)).unwrap();
        history.append(&RunSummary::from(&record)).unwrap();

        let rows = history.read_all().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].no_op_reason, Some(NoOpReason::KillSwitch));
        assert!(rows[1].no_op);
    }
}
