//! Position book persisted as a pretty JSON object, `{"QQQ": 30.0}`.
//!
//! Writes go to a sibling `.tmp` file which is synced and renamed over the
//! target, so a reader never sees a half-written book.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;

use crate::adapters::jsonl::ensure_parent;
use crate::domain::error::EodTraderError;
use crate::domain::position::PositionBook;
use crate::ports::position_port::PositionStorePort;

pub struct JsonPositionStore {
    path: PathBuf,
}

impl JsonPositionStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl PositionStorePort for JsonPositionStore {
    fn load(&self) -> Result<PositionBook, EodTraderError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(PositionBook::new()),
            Err(e) => return Err(EodTraderError::persistence(self.path.display(), e)),
        };
        if content.trim().is_empty() {
            return Ok(PositionBook::new());
        }
        let raw: BTreeMap<String, f64> = serde_json::from_str(&content)
            .map_err(|e| EodTraderError::persistence(self.path.display(), e))?;
        Ok(PositionBook::from_map(raw))
    }

    fn save(&self, positions: &PositionBook) -> Result<(), EodTraderError> {
        let err = |e: &dyn std::fmt::Display| EodTraderError::persistence(self.path.display(), e);
        ensure_parent(&self.path)?;

        let json = serde_json::to_string_pretty(positions).map_err(|e| err(&e))?;
        let tmp = self.path.with_extension("tmp");
        let mut file = fs::File::create(&tmp).map_err(|e| err(&e))?;
        file.write_all(json.as_bytes()).map_err(|e| err(&e))?;
        file.sync_all().map_err(|e| err(&e))?;
        fs::rename(&tmp, &self.path).map_err(|e| err(&e))?;

        debug!("Saved {} position(s) to {}", positions.len(), self.path.display());
        Ok(())
    }

    fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_empty_book() {
        let dir = TempDir::new().unwrap();
        let store = JsonPositionStore::new(dir.path().join("positions.json"));
        assert!(store.load().unwrap().is_empty());
        assert!(store.last_saved_at().is_none());
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state/positions.json");
        let store = JsonPositionStore::new(path.clone());
        let book = PositionBook::from_map([("QQQ", 30.0), ("PSQ", 0.0)]);

        store.save(&book).unwrap();

        assert_eq!(store.load().unwrap(), book);
        assert!(store.last_saved_at().is_some());
        assert!(!path.with_extension("tmp").exists());
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"QQQ\""));
        assert!(!text.contains("PSQ"));
    }

    #[test]
    fn lower_case_keys_are_normalised() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("positions.json");
        fs::write(&path, r#"{"qqq": 12.5, "psq": 0.0}"#).unwrap();
        let book = JsonPositionStore::new(path).load().unwrap();
        assert_eq!(book.get("QQQ").value(), 12.5);
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn corrupt_file_is_persistence_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("positions.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            JsonPositionStore::new(path).load(),
            Err(EodTraderError::Persistence { .. })
        ));
    }
}
