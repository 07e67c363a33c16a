//! Line-delimited JSON helpers shared by the append-only stores.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use tracing::warn;

use crate::domain::error::EodTraderError;

pub(crate) fn ensure_parent(path: &Path) -> Result<(), EodTraderError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| EodTraderError::persistence(parent.display(), e))?;
    }
    Ok(())
}

/// Append one compact JSON line, creating the file and its directory as needed.
pub(crate) fn append_line<T: Serialize>(path: &Path, value: &T) -> Result<(), EodTraderError> {
    ensure_parent(path)?;
    let line = serde_json::to_string(value).map_err(|e| EodTraderError::persistence(path.display(), e))?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| EodTraderError::persistence(path.display(), e))?;
    writeln!(file, "{}", line).map_err(|e| EodTraderError::persistence(path.display(), e))?;
    Ok(())
}

/// Every line that parses as `T`. A missing file reads as empty; blank and
/// malformed lines are skipped.
pub(crate) fn read_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, EodTraderError> {
    let file = match fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(EodTraderError::persistence(path.display(), e)),
    };

    let mut out = Vec::new();
    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| EodTraderError::persistence(path.display(), e))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(v) => out.push(v),
            Err(e) => warn!("Skipping malformed line {} in {}: {}", n + 1, path.display(), e),
        }
    }
    Ok(out)
}
