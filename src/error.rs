use thiserror::Error;

use crate::domain::CanonicalField;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("no column maps to required field '{field}'")]
    Schema { field: CanonicalField },

    #[error("cannot coerce {field} value {value:?}: {reason}")]
    TypeCoercion {
        field: CanonicalField,
        value: String,
        reason: String,
    },

    #[error("store connection failed: {message}")]
    Connection { message: String },

    #[error("row {row_index} rejected by store: {message}")]
    RowWrite { row_index: usize, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV decoding failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),
}

impl IngestError {
    /// Connection-level failures are worth retrying; everything else is deterministic.
    pub fn is_retryable(&self) -> bool {
        matches!(self, IngestError::Connection { .. })
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
