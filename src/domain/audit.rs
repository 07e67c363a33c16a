//! Append-only audit records with a short content hash.
//!
//! Each record hashes `{kind, block, timestamp, data}` serialized as compact
//! JSON with sorted keys. The hash is for tamper evidence, not security.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditKind {
    Cfg,
    Plan,
    Order,
    Fill,
}

impl fmt::Display for AuditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditKind::Cfg => write!(f, "CFG"),
            AuditKind::Plan => write!(f, "PLAN"),
            AuditKind::Order => write!(f, "ORDER"),
            AuditKind::Fill => write!(f, "FILL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub tx_hash: String,
    pub timestamp: String,
    /// Calendar-day bucket, `YYYYMMDD`.
    pub block: String,
    pub kind: AuditKind,
    pub data: Value,
}

impl AuditRecord {
    pub fn new(kind: AuditKind, data: Value, at: DateTime<Utc>) -> Self {
        let timestamp = at.to_rfc3339_opts(SecondsFormat::Secs, true);
        let block = block_for(at);
        let tx_hash = short_hash(&json!({
            "kind": kind.to_string(),
            "block": block,
            "timestamp": timestamp,
            "data": data,
        }));
        Self {
            tx_hash,
            timestamp,
            block,
            kind,
            data,
        }
    }

    /// Recompute the hash over the stored fields.
    pub fn verify(&self) -> bool {
        let expected = short_hash(&json!({
            "kind": self.kind.to_string(),
            "block": self.block,
            "timestamp": self.timestamp,
            "data": self.data,
        }));
        expected == self.tx_hash
    }
}

pub fn block_for(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d").to_string()
}

/// First 10 hex chars of SHA-256 over the value's canonical JSON.
///
/// `serde_json::Map` keeps keys ordered, so `to_string` is already sorted and
/// compact.
pub fn short_hash(value: &Value) -> String {
    let body = value.to_string();
    let digest = Sha256::digest(body.as_bytes());
    hex::encode(digest)[..10].to_string()
}

/// First 16 hex chars of SHA-256 over the raw config bytes.
pub fn config_fingerprint(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))[..16].to_string()
}
