//! Domain error types.

/// Top-level error type for eodtrader.
///
/// Only conditions that abort a cycle live here. Circuit-breaker blocks and
/// planning no-ops are ordinary decision values, not errors.
#[derive(Debug, thiserror::Error)]
pub enum EodTraderError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("no price data for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    #[error("invalid bar series for {symbol}: {reason}")]
    BarValidation { symbol: String, reason: String },

    #[error("insufficient data for {symbol}: have {bars} bars, need {minimum}")]
    InsufficientData {
        symbol: String,
        bars: usize,
        minimum: usize,
    },

    #[error("state persistence error at {path}: {reason}")]
    Persistence { path: String, reason: String },

    #[error("broker submission failed: {reason}")]
    Broker { reason: String },

    #[error("notification failed: {reason}")]
    Notify { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EodTraderError {
    pub fn persistence(path: impl std::fmt::Display, reason: impl std::fmt::Display) -> Self {
        EodTraderError::Persistence {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<&EodTraderError> for std::process::ExitCode {
    fn from(err: &EodTraderError) -> Self {
        let code: u8 = match err {
            EodTraderError::Io(_) | EodTraderError::Notify { .. } => 1,
            EodTraderError::ConfigParse { .. }
            | EodTraderError::ConfigMissing { .. }
            | EodTraderError::ConfigInvalid { .. } => 2,
            EodTraderError::Persistence { .. } => 3,
            EodTraderError::DataUnavailable { .. } | EodTraderError::InsufficientData { .. } => 5,
            EodTraderError::BarValidation { .. } => 6,
            EodTraderError::Broker { .. } => 7,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = EodTraderError::BarValidation {
            symbol: "QQQ".into(),
            reason: "duplicate date 2024-01-02".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid bar series for QQQ: duplicate date 2024-01-02"
        );
    }

    fn same_code(a: std::process::ExitCode, b: u8) -> bool {
        format!("{:?}", a) == format!("{:?}", std::process::ExitCode::from(b))
    }

    #[test]
    fn exit_codes_by_class() {
        use std::process::ExitCode;

        let cfg = EodTraderError::ConfigMissing {
            section: "run".into(),
            key: "equity".into(),
        };
        assert!(same_code(ExitCode::from(&cfg), 2));

        let data = EodTraderError::DataUnavailable {
            symbol: "PSQ".into(),
            reason: "missing".into(),
        };
        assert!(same_code(ExitCode::from(&data), 5));

        let state = EodTraderError::persistence("positions.json", "disk full");
        assert!(same_code(ExitCode::from(&state), 3));
        assert!(!same_code(ExitCode::from(&state), 5));
    }
}
