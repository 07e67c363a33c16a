//! INI file configuration adapter.

use crate::domain::audit::config_fingerprint;
use crate::domain::error::EodTraderError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::fs;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
    fingerprint: String,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, EodTraderError> {
        let path = path.as_ref();
        let parse_error = |reason: String| EodTraderError::ConfigParse {
            file: path.display().to_string(),
            reason,
        };
        let content = fs::read_to_string(path).map_err(|e| parse_error(e.to_string()))?;
        Self::from_string(&content).map_err(parse_error)
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Ini::new();
        config.read(content.to_string())?;
        Ok(Self {
            config,
            fingerprint: config_fingerprint(content.as_bytes()),
        })
    }

    /// First 16 hex chars of the SHA-256 of the raw file contents.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_ref()
            .and_then(|v| Self::parse_bool(v))
            .unwrap_or(default)
    }
}
