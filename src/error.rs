//! Error taxonomy for the cover pipeline.
//!
//! Only [`ConfigError`] aborts a run. [`RecordError`] and [`EncodeError`]
//! are caught at the record boundary and turned into skipped outcomes.

use std::path::PathBuf;

use thiserror::Error;

/// Pre-flight failures. Raised before any network or filesystem effect.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("--since must be formatted YYYY-MM-DD (got '{0}')")]
    InvalidSince(String),

    #[error("CSV export not found: {}", .0.display())]
    SourceMissing(PathBuf),

    #[error("CSV export is missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("failed to read CSV export {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("invalid option: {0}")]
    InvalidOption(String),
}

/// Per-record failures. Logged with the identifier and skipped.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("remote returned HTTP {0}")]
    Status(u16),

    #[error("payload too small ({len} bytes < {min} bytes), likely a placeholder")]
    TooSmall { len: usize, min: u64 },

    #[error("could not decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("could not encode image: {0}")]
    Encode(#[from] EncodeError),

    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transform task aborted: {0}")]
    Task(String),
}

impl From<reqwest::Error> for RecordError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => RecordError::Status(status.as_u16()),
            None if err.is_timeout() => RecordError::Fetch("request timed out".to_string()),
            None => RecordError::Fetch(err.to_string()),
        }
    }
}

/// Encoder failures. `Unavailable` triggers the WebP fallback.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("{0} encoder is not available in this build")]
    Unavailable(&'static str),

    #[error("{format} encoding failed: {message}")]
    Failed {
        format: &'static str,
        message: String,
    },
}
