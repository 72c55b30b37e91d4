//! Error types for the risk scorer.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScoreError>;

#[derive(Debug, Error)]
pub enum ScoreError {
    /// Input table could not be parsed. `line` is 1-based.
    #[error("Data format error at line {line}: {message}")]
    DataFormat { line: u64, message: String },

    /// Caller asked for something the weight table cannot answer.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScoreError {
    pub(crate) fn data_format(line: u64, message: impl Into<String>) -> Self {
        ScoreError::DataFormat { line, message: message.into() }
    }

    /// Row-level CSV failures (bad UTF-8, broken quoting) are data format
    /// errors; only I/O failures keep the raw CSV variant.
    pub(crate) fn from_csv(err: csv::Error) -> Self {
        if matches!(err.kind(), csv::ErrorKind::Io(_)) {
            return ScoreError::Csv(err);
        }
        let line = err.position().map(|p| p.line()).unwrap_or(0);
        ScoreError::data_format(line, err.to_string())
    }

    pub fn is_data_format(&self) -> bool {
        matches!(self, ScoreError::DataFormat { .. })
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, ScoreError::Configuration(_))
    }
}
