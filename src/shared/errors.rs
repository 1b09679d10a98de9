//! Error handling for the application

use thiserror::Error;

/// Price series errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SeriesError {
    #[error("Insufficient history: need at least {required} prices, got {actual}")]
    InsufficientHistory { required: usize, actual: usize },

    #[error("Timestamp at index {index} is earlier than the previous point")]
    OutOfOrder { index: usize },

    #[error("Non-finite close price at index {index}")]
    InvalidPrice { index: usize },

    #[error("Slice {start}..{end} is out of bounds for a series of {len}")]
    SliceOutOfBounds { start: usize, end: usize, len: usize },
}

/// CSV storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Malformed header: {0}")]
    BadHeader(String),

    #[error("Malformed row at line {line}: {detail}")]
    MalformedRow { line: u64, detail: String },

    #[error("Matrix has {rows} rows but the price slice has {prices} points")]
    MatrixShape { rows: usize, prices: usize },

    #[error(transparent)]
    Series(#[from] SeriesError),
}

/// Collector (exchange poller) errors
#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("Missing credential: environment variable {0} is not set")]
    MissingCredential(&'static str),

    #[error("Invalid HMAC key")]
    InvalidKey,

    #[error("Query encoding failed: {0}")]
    Encoding(#[from] serde_urlencoded::ser::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("API error {code}: {msg}")]
    Api { code: i64, msg: String },

    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Sink write failed: {0}")]
    Sink(#[from] std::io::Error),
}

/// General application error
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Series error: {0}")]
    Series(#[from] SeriesError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Collector error: {0}")]
    Collector(#[from] CollectorError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_history_message_names_both_counts() {
        let err = SeriesError::InsufficientHistory {
            required: 10080,
            actual: 42,
        };
        let msg = err.to_string();
        assert!(msg.contains("10080"));
        assert!(msg.contains("42"));
    }

    #[test]
    fn test_series_error_converts_into_app_error() {
        let err: AppError = SeriesError::OutOfOrder { index: 3 }.into();
        assert!(matches!(err, AppError::Series(SeriesError::OutOfOrder { index: 3 })));
    }
}
