//! Error kinds surfaced by the sync pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    /// A container record that cannot be normalized; the record is skipped
    #[error("malformed container record '{name}': {reason}")]
    MalformedInput { name: String, reason: String },

    /// A port that is not a valid 16-bit number
    #[error("container '{name}' declares invalid port '{value}'")]
    InvalidPort { name: String, value: String },

    /// The resource store rejected or failed an operation
    #[error("store error: {0}")]
    Store(String),

    /// The inspection file could not be read at all
    #[error("cannot read input {}: {source}", path.display())]
    InputUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The inspection file is not a JSON array of records
    #[error("invalid input document: {0}")]
    InputFormat(String),

    /// A classification table could not be loaded
    #[error("invalid classification table: {0}")]
    Classification(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl SyncError {
    pub fn malformed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        SyncError::MalformedInput {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// True for errors caused by the content of a single input record
    pub fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            SyncError::MalformedInput { .. } | SyncError::InvalidPort { .. }
        )
    }
}

impl From<mongodb::error::Error> for SyncError {
    fn from(err: mongodb::error::Error) -> Self {
        SyncError::Store(err.to_string())
    }
}

impl From<bson::ser::Error> for SyncError {
    fn from(err: bson::ser::Error) -> Self {
        SyncError::Store(format!("failed to encode document: {}", err))
    }
}

impl From<bson::de::Error> for SyncError {
    fn from(err: bson::de::Error) -> Self {
        SyncError::Store(format!("failed to decode document: {}", err))
    }
}
