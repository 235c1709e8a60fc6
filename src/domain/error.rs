//! Domain error types.

/// Top-level error type for stratgate.
///
/// Strategy rejections are never errors: they travel as
/// [`ValidationVerdict`](crate::domain::verdict::ValidationVerdict) data.
#[derive(Debug, thiserror::Error)]
pub enum StratgateError {
    #[error("no price data for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    #[error("insufficient data for {symbol}: have {bars} bars, need {minimum}")]
    InsufficientData {
        symbol: String,
        bars: usize,
        minimum: usize,
    },

    #[error("verdict cache unavailable: {reason}")]
    CacheUnavailable { reason: String },

    #[error("{dimension} scorer unavailable for {symbol}: {reason}")]
    ScorerUnavailable {
        dimension: String,
        symbol: String,
        reason: String,
    },

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

    #[error("unknown strategy kind: {0}")]
    UnknownStrategy(String),

    #[error("serialization error: {reason}")]
    Serialization { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for StratgateError {
    fn from(err: serde_json::Error) -> Self {
        StratgateError::Serialization {
            reason: err.to_string(),
        }
    }
}

impl From<&StratgateError> for std::process::ExitCode {
    fn from(err: &StratgateError) -> Self {
        let code: u8 = match err {
            StratgateError::Io(_) | StratgateError::Serialization { .. } => 1,
            StratgateError::ConfigParse { .. }
            | StratgateError::ConfigMissing { .. }
            | StratgateError::ConfigInvalid { .. } => 2,
            StratgateError::CacheUnavailable { .. } => 3,
            StratgateError::UnknownStrategy(_) => 4,
            StratgateError::DataUnavailable { .. } | StratgateError::InsufficientData { .. } => 5,
            StratgateError::ScorerUnavailable { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let err = StratgateError::InsufficientData {
            symbol: "AAPL".into(),
            bars: 12,
            minimum: 51,
        };
        assert_eq!(
            err.to_string(),
            "insufficient data for AAPL: have 12 bars, need 51"
        );

        let err = StratgateError::UnknownStrategy("WEDGE".into());
        assert_eq!(err.to_string(), "unknown strategy kind: WEDGE");
    }

    #[test]
    fn serde_json_errors_convert() {
        let parse: Result<u32, _> = serde_json::from_str("not json");
        let err: StratgateError = parse.unwrap_err().into();
        assert!(matches!(err, StratgateError::Serialization { .. }));
    }
}
