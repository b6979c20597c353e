//! Error types for the historian.

use thiserror::Error;

/// Result type alias for historian operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the historian.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    // Input errors (20-29)
    #[error("invalid timestamp: {0:?}")]
    InvalidTimestamp(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("invalid topic: {0}")]
    InvalidTopic(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    // Storage errors (40-49)
    #[error("storage unreachable: {0}")]
    Connectivity(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("corrupt stored row: {0}")]
    CorruptRow(String),

    #[error("historian not set up: {0}")]
    NotReady(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    /// Used for detailed error reporting in JSON output.
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidTimestamp(_) => 20,
            Error::InvalidQuery(_) => 21,
            Error::InvalidTopic(_) => 22,
            Error::InvalidRecord(_) => 23,
            Error::Connectivity(_) => 40,
            Error::Storage(_) => 41,
            Error::CorruptRow(_) => 42,
            Error::NotReady(_) => 43,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// Whether the storage connection was lost. Callers should drop any cached
    /// connection and retry the whole operation later.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Error::Connectivity(_))
    }
}
