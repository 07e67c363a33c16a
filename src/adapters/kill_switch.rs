//! Kill switch backed by the presence of a flag file.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::adapters::jsonl::ensure_parent;
use crate::domain::error::EodTraderError;

pub struct KillSwitchFile {
    path: PathBuf,
}

impl KillSwitchFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_engaged(&self) -> bool {
        self.path.exists()
    }

    pub fn engage(&self) -> Result<(), EodTraderError> {
        ensure_parent(&self.path)?;
        fs::write(&self.path, b"1").map_err(|e| EodTraderError::persistence(self.path.display(), e))?;
        warn!("Kill switch ENGAGED ({})", self.path.display());
        Ok(())
    }

    /// Removing a switch that is not set is not an error.
    pub fn release(&self) -> Result<(), EodTraderError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                warn!("Kill switch released ({})", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(EodTraderError::persistence(self.path.display(), e)),
        }
    }
}
