//! Unified error type for dustcast.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Geospatial backend error: {0}")]
    Backend(String),

    #[error("Cache read failed for {key}: {reason}")]
    CacheRead { key: String, reason: String },

    #[error("Cache write failed for {key}: {reason}")]
    CacheWrite { key: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_count(raw: &str) -> crate::Result<u64> {
        Ok(serde_json::from_str(raw)?)
    }

    #[test]
    fn test_serde_errors_convert_with_question_mark() {
        assert_eq!(parse_count("12").unwrap(), 12);
        let err = parse_count("twelve").unwrap_err();
        assert!(matches!(err, Error::Json(_)));
        assert!(err.to_string().starts_with("JSON error:"));
    }

    #[test]
    fn test_other_displays_message_verbatim() {
        let err = Error::Other("days_back must be > 0, got -30".into());
        assert_eq!(err.to_string(), "days_back must be > 0, got -30");
    }
}
